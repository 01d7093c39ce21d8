//! Markdown slide deck rendering
//!
//! Six slides separated by `---` lines: title, executive summary, sales
//! analysis, market trends, recommendations and the action plan. Free-text
//! inputs are inserted verbatim.

use chrono::{DateTime, Utc};

/// Free-text inputs for a report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportInput {
    pub title: String,
    pub analysis_data: String,
    pub market_data: String,
    pub sales_data: String,
}

/// Slide separator
pub const SLIDE_SEPARATOR: &str = "\n---\n\n";

/// Render the deck
pub fn render_deck(input: &ReportInput, generated_at: DateTime<Utc>) -> String {
    let slides = [
        title_slide(&input.title, generated_at),
        executive_summary_slide(),
        sales_analysis_slide(&input.sales_data),
        market_trends_slide(&input.market_data),
        recommendations_slide(&input.analysis_data),
        action_plan_slide(),
    ];
    slides.join(SLIDE_SEPARATOR)
}

fn title_slide(title: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        "# {}\n\nGenerated on {}\n",
        title,
        generated_at.format("%Y-%m-%d")
    )
}

fn executive_summary_slide() -> String {
    bullets(
        "Executive Summary",
        &[
            "- Sales trend analysis",
            "- Key product performance",
            "- Market opportunities identified",
            "- Competitor comparison",
            "- Priority measures for profit improvement",
        ],
    )
}

fn sales_analysis_slide(sales_data: &str) -> String {
    bullets(
        "Sales Analysis",
        &[
            "📊 Sales performance",
            "",
            sales_data,
            "",
            "🎯 Improvement points",
            "- Review under-performing products",
            "- Optimize regional strategy",
            "- Exploit seasonal factors",
        ],
    )
}

fn market_trends_slide(market_data: &str) -> String {
    bullets(
        "Market Trends",
        &[
            "🌟 Market data",
            "",
            market_data,
            "",
            "💡 Opportunities",
            "- Identify new store locations",
            "- Limited-time menu potential",
            "- Sharpen differentiation",
        ],
    )
}

fn recommendations_slide(analysis_data: &str) -> String {
    bullets(
        "Recommendations",
        &[
            "📋 Findings and proposals",
            "",
            analysis_data,
            "",
            "📈 Schedule",
            "- Short term (1-3 months)",
            "- Mid term (3-6 months)",
            "- Long term (6+ months)",
        ],
    )
}

fn action_plan_slide() -> String {
    bullets(
        "Action Plan",
        &[
            "📅 Focus for the next 30 days",
            "",
            "Weekly review:",
            "- Check and analyze sales results",
            "- Run customer satisfaction surveys",
            "- Collect staff feedback",
            "",
            "Monthly improvement cycle:",
            "- Evaluate KPI attainment",
            "- Measure the effect of each measure",
            "- Draft next month's plan",
            "",
            "📊 Success metrics (KPI)",
            "- Monthly sales growth: +10% target",
            "- Customer repeat rate: up",
            "- New customers acquired: up",
        ],
    )
}

fn bullets(heading: &str, lines: &[&str]) -> String {
    let mut out = format!("## {}\n\n", heading);
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input() -> ReportInput {
        ReportInput {
            title: "Quarterly Review".to_string(),
            analysis_data: "Margins are thin".to_string(),
            market_data: "Demand is rising".to_string(),
            sales_data: "Q3: 1.2M".to_string(),
        }
    }

    #[test]
    fn test_deck_has_six_slides_in_order() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let deck = render_deck(&input(), at);
        let slides: Vec<&str> = deck.split(SLIDE_SEPARATOR).collect();

        assert_eq!(slides.len(), 6);
        assert!(slides[0].starts_with("# Quarterly Review"));
        assert!(slides[0].contains("2024-05-01"));
        assert!(slides[1].starts_with("## Executive Summary"));
        assert!(slides[2].contains("Q3: 1.2M"));
        assert!(slides[3].contains("Demand is rising"));
        assert!(slides[4].contains("Margins are thin"));
        assert!(slides[5].starts_with("## Action Plan"));
    }

    #[test]
    fn test_empty_inputs_still_render() {
        let deck = render_deck(&ReportInput::default(), Utc::now());
        assert_eq!(deck.split(SLIDE_SEPARATOR).count(), 6);
    }
}
