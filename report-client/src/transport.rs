use anyhow::Result;
use async_trait::async_trait;
use filter_core::{RequestPayload, UpstreamFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query for one page of distinct values of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValuesRequest {
    pub field_name: String,
    pub business: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub offset: u64,
    pub limit: u32,
    /// Conditions of the rows above the requesting one. `None` when there are none.
    #[serde(skip)]
    pub filters: Option<Vec<UpstreamFilter>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldValuesResponse {
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total_count: Option<u64>,
}

impl FieldValuesResponse {
    pub fn total_count(&self) -> u64 {
        self.total_count.unwrap_or(self.values.len() as u64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AvailableFieldsResponse {
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Body of a report response. Period reports carry an object with
/// `details`, `summary` and `comparison_details`; summaries carry a row array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportResponse {
    #[serde(default)]
    pub data: Value,
}

impl ReportResponse {
    pub fn rows(&self) -> Vec<Value> {
        match &self.data {
            Value::Array(rows) => rows.clone(),
            Value::Object(map) => ["details", "comparison_details"]
                .iter()
                .filter_map(|key| map.get(*key))
                .filter_map(Value::as_array)
                .flatten()
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn summary(&self) -> Option<&Value> {
        self.data.get("summary")
    }
}

#[async_trait]
pub trait FilterTransport: Send + Sync {
    async fn available_fields(&self, business: &str) -> Result<Vec<String>>;

    async fn field_values(&self, request: &FieldValuesRequest) -> Result<FieldValuesResponse>;
}

#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn fetch_report(&self, payload: &RequestPayload) -> Result<ReportResponse>;
}
