//! Report action group integration tests
//!
//! Drives the report generator with action-group events and checks the
//! response envelopes and uploads against the in-memory object store.

use a3s_agent_stream::report::{MemoryObjectStore, ReportConfig, ReportGenerator};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

fn event() -> Value {
    json!({
        "actionGroup": "reporting",
        "function": "create_report",
        "messageVersion": "1.0",
        "parameters": [
            {"name": "analysis_data", "type": "string", "value": "Margins fell 2 points"},
            {"name": "market_data", "type": "string", "value": "Competitors are expanding"},
            {"name": "sales_data", "type": "string", "value": "May: 12.4M"},
            {"name": "title", "type": "string", "value": "May Review"}
        ]
    })
}

fn body_of(reply: &Value) -> Value {
    let body = reply["response"]["functionResponse"]["responseBody"]["TEXT"]["body"]
        .as_str()
        .expect("body string");
    serde_json::from_str(body).unwrap()
}

// ─── Success Path ────────────────────────────────────────────────

#[tokio::test]
async fn test_report_is_uploaded_and_linked() {
    let store = MemoryObjectStore::new();
    let generator = ReportGenerator::new(
        ReportConfig::default().with_bucket("reports-bucket"),
        Arc::new(store.clone()),
    );
    let now = Utc.with_ymd_and_hms(2024, 5, 31, 18, 4, 5).unwrap();

    let reply = generator.handle_at(event(), now).await;

    assert_eq!(reply["messageVersion"], "1.0");
    assert_eq!(reply["response"]["actionGroup"], "reporting");
    assert_eq!(reply["response"]["function"], "create_report");

    let body = body_of(&reply);
    assert_eq!(body["filename"], "management_report_20240531_180405.md");
    assert_eq!(body["s3_key"], "presentations/management_report_20240531_180405.md");
    assert_eq!(
        body["download_url"],
        "memory://reports-bucket/presentations/management_report_20240531_180405.md?expires=86400"
    );
    assert!(body["message"].as_str().unwrap().contains("generated"));

    let objects = store.objects().await;
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].bucket, "reports-bucket");
    let deck = String::from_utf8(objects[0].body.to_vec()).unwrap();
    assert!(deck.starts_with("# May Review"));
    assert!(deck.contains("May: 12.4M"));
    assert!(deck.contains("Competitors are expanding"));
    assert!(deck.contains("Margins fell 2 points"));
}

#[tokio::test]
async fn test_message_version_defaults_to_one() {
    let generator = ReportGenerator::new(
        ReportConfig::default().with_bucket("b"),
        Arc::new(MemoryObjectStore::new()),
    );
    let reply = generator
        .handle(json!({"actionGroup": "g", "function": "f"}))
        .await;
    assert_eq!(reply["messageVersion"], 1);

    // Title falls back to the configured default
    let body = body_of(&reply);
    assert!(body["s3_key"].as_str().unwrap().starts_with("presentations/"));
}

#[tokio::test]
async fn test_presign_failure_falls_back_to_direct_url() {
    let generator = ReportGenerator::new(
        ReportConfig::default().with_bucket("reports-bucket"),
        Arc::new(MemoryObjectStore::failing_presign()),
    );
    let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    let body = body_of(&generator.handle_at(event(), now).await);
    assert_eq!(
        body["download_url"],
        "https://reports-bucket.s3.us-west-2.amazonaws.com/presentations/management_report_20240102_030405.md"
    );
}

// ─── Rejections ──────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_bucket_is_rejected_without_upload() {
    let store = MemoryObjectStore::new();
    let generator = ReportGenerator::new(ReportConfig::default(), Arc::new(store.clone()));

    let reply = generator.handle(event()).await;
    assert_eq!(reply["statusCode"], 400);
    assert!(reply["body"].as_str().unwrap().contains("S3_BUCKET_NAME"));
    assert!(store.objects().await.is_empty());

    let empty = ReportGenerator::new(
        ReportConfig::default().with_bucket(""),
        Arc::new(store.clone()),
    );
    assert_eq!(empty.handle(event()).await["statusCode"], 400);
    assert!(store.objects().await.is_empty());
}

#[tokio::test]
async fn test_missing_function_is_bad_request() {
    let generator = ReportGenerator::new(
        ReportConfig::default().with_bucket("b"),
        Arc::new(MemoryObjectStore::new()),
    );

    let reply = generator.handle(json!({"actionGroup": "g"})).await;
    assert_eq!(reply["statusCode"], 400);
    assert!(reply["body"].as_str().unwrap().contains("function"));

    let reply = generator.handle(json!({"function": "f"})).await;
    assert_eq!(reply["statusCode"], 400);
    assert!(reply["body"].as_str().unwrap().contains("actionGroup"));
}
