//! Report generation action group
//!
//! The function the remote agent calls to turn its analysis into a
//! downloadable slide deck. The handler takes the agent's action-group
//! event, renders the deck, uploads it and answers with the agent's
//! function-response envelope carrying a 24-hour retrieval link.
//!
//! Error replies use a `{statusCode, body}` shape: 400 for a malformed
//! event or missing bucket configuration, 500 for anything else.

pub mod deck;
pub mod store;

pub use deck::{render_deck, ReportInput};
pub use store::{MemoryObjectStore, ObjectStore, StoredObject};

use crate::error::{Result, StreamError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming the destination bucket
pub const ENV_BUCKET_NAME: &str = "S3_BUCKET_NAME";

const DECK_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Report generator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    /// Destination bucket; unset or empty is a configuration error
    pub bucket: Option<String>,
    pub region: String,
    /// Key prefix ("directory") for uploads
    pub key_prefix: String,
    /// File name prefix, followed by `_<YYYYMMDD_HHMMSS>.md`
    pub file_prefix: String,
    pub default_title: String,
    pub link_ttl: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: "us-west-2".to_string(),
            key_prefix: "presentations".to_string(),
            file_prefix: "management_report".to_string(),
            default_title: "Management Advisory Report".to_string(),
            link_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl ReportConfig {
    /// Defaults with the bucket taken from `S3_BUCKET_NAME`
    pub fn from_env() -> Self {
        Self {
            bucket: std::env::var(ENV_BUCKET_NAME).ok(),
            ..Default::default()
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref().filter(|b| !b.trim().is_empty())
    }
}

/// Action-group event as delivered by the agent runtime
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionGroupEvent {
    action_group: Option<String>,
    function: Option<String>,
    message_version: Option<Value>,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
struct Parameter {
    name: String,
    #[serde(default)]
    value: Value,
}

impl Parameter {
    fn text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Report generation handler
pub struct ReportGenerator {
    config: ReportConfig,
    store: Arc<dyn ObjectStore>,
}

impl ReportGenerator {
    pub fn new(config: ReportConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Handle one action-group event
    pub async fn handle(&self, event: Value) -> Value {
        self.handle_at(event, Utc::now()).await
    }

    /// Handle one action-group event as of `now`
    pub async fn handle_at(&self, event: Value, now: DateTime<Utc>) -> Value {
        tracing::info!(event = %event, "Report request received");

        let event: ActionGroupEvent = match serde_json::from_value(event) {
            Ok(event) => event,
            Err(e) => return bad_request(format!("malformed action group event: {}", e)),
        };
        let Some(action_group) = event.action_group.clone() else {
            return bad_request("missing required field 'actionGroup'");
        };
        let Some(function) = event.function.clone() else {
            return bad_request("missing required field 'function'");
        };
        let Some(bucket) = self.config.bucket() else {
            return bad_request(format!("{} is not set", ENV_BUCKET_NAME));
        };

        let input = self.input_from(&event.parameters);
        let body = match self.publish(bucket, &input, now).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Report generation failed");
                return json!({
                    "statusCode": 500,
                    "body": format!("report generation failed: {}", e),
                });
            }
        };

        json!({
            "response": {
                "actionGroup": action_group,
                "function": function,
                "functionResponse": {
                    "responseBody": {
                        "TEXT": { "body": body }
                    }
                }
            },
            "messageVersion": event.message_version.unwrap_or_else(|| json!(1)),
        })
    }

    fn input_from(&self, parameters: &[Parameter]) -> ReportInput {
        let mut input = ReportInput {
            title: self.config.default_title.clone(),
            ..Default::default()
        };
        for param in parameters {
            match param.name.as_str() {
                "analysis_data" => input.analysis_data = param.text(),
                "market_data" => input.market_data = param.text(),
                "sales_data" => input.sales_data = param.text(),
                "title" => input.title = param.text(),
                other => tracing::debug!(name = other, "Ignoring unknown report parameter"),
            }
        }
        input
    }

    /// Render, upload and link the deck; returns the response body string
    async fn publish(&self, bucket: &str, input: &ReportInput, now: DateTime<Utc>) -> Result<String> {
        let filename = format!(
            "{}_{}.md",
            self.config.file_prefix,
            now.format("%Y%m%d_%H%M%S")
        );
        let key = format!("{}/{}", self.config.key_prefix, filename);
        let deck = render_deck(input, now);

        self.store
            .put_object(bucket, &key, DECK_CONTENT_TYPE, Bytes::from(deck))
            .await?;

        let download_url = match self.store.presign_get(bucket, &key, self.config.link_ttl).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Presigning failed, using direct URL");
                format!(
                    "https://{}.s3.{}.amazonaws.com/{}",
                    bucket, self.config.region, key
                )
            }
        };

        tracing::info!(bucket, key = %key, "Report uploaded");

        serde_json::to_string(&json!({
            "message": "Report generated successfully",
            "download_url": download_url,
            "filename": filename,
            "s3_key": key,
        }))
        .map_err(StreamError::from)
    }
}

fn bad_request(reason: impl Into<String>) -> Value {
    let reason = reason.into();
    tracing::error!(reason = %reason, "Rejected report request");
    json!({
        "statusCode": 400,
        "body": format!("missing or invalid input: {}", reason),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ReportConfig::default();
        assert_eq!(config.key_prefix, "presentations");
        assert_eq!(config.link_ttl, Duration::from_secs(86_400));
        assert!(config.bucket().is_none());
        assert!(config.clone().with_bucket(" ").bucket().is_none());
        assert_eq!(config.with_bucket("b").bucket(), Some("b"));
    }

    #[test]
    fn test_parameters_fill_input() {
        let generator = ReportGenerator::new(
            ReportConfig::default(),
            Arc::new(MemoryObjectStore::new()),
        );
        let params: Vec<Parameter> = serde_json::from_value(json!([
            {"name": "sales_data", "type": "string", "value": "up 5%"},
            {"name": "market_data", "value": 42},
            {"name": "unknown", "value": "x"}
        ]))
        .unwrap();

        let input = generator.input_from(&params);
        assert_eq!(input.sales_data, "up 5%");
        assert_eq!(input.market_data, "42");
        assert_eq!(input.analysis_data, "");
        assert_eq!(input.title, "Management Advisory Report");
    }

    #[tokio::test]
    async fn test_malformed_parameters_are_bad_request() {
        let generator = ReportGenerator::new(
            ReportConfig::default().with_bucket("b"),
            Arc::new(MemoryObjectStore::new()),
        );
        let reply = generator
            .handle(json!({"actionGroup": "g", "function": "f", "parameters": "nope"}))
            .await;
        assert_eq!(reply["statusCode"], 400);
    }
}
