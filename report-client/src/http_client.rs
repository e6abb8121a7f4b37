use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use filter_core::RequestPayload;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::transport::{
    AvailableFieldsResponse, FieldValuesRequest, FieldValuesResponse, FilterTransport,
    ReportResponse, ReportTransport,
};

const AVAILABLE_FIELDS_PATH: &str = "/api/filter/available-fields";
const FIELD_VALUES_PATH: &str = "/api/filter/field-values";

/// reqwest-backed transport for the filter and report endpoints.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    endpoint: String,
}

impl HttpClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
        Q: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.endpoint, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", path))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            bail!("HTTP {} for GET {}: {}", status, path, body);
        }

        serde_json::from_str(&body).with_context(|| {
            format!(
                "Failed to deserialize response from GET {}: {}",
                path, body
            )
        })
    }

    async fn post<T, Q, B>(&self, path: &str, query: &Q, body: &B) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.endpoint, path);
        let response = self
            .client
            .post(&url)
            .query(query)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to POST {}", path))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            bail!("HTTP {} for POST {}: {}", status, path, response_body);
        }

        serde_json::from_str(&response_body).with_context(|| {
            format!(
                "Failed to deserialize response from POST {}: {}",
                path, response_body
            )
        })
    }
}

#[async_trait]
impl FilterTransport for HttpClient {
    async fn available_fields(&self, business: &str) -> Result<Vec<String>> {
        let response: AvailableFieldsResponse = self
            .get(AVAILABLE_FIELDS_PATH, &[("business", business)])
            .await?;
        Ok(response.fields)
    }

    async fn field_values(&self, request: &FieldValuesRequest) -> Result<FieldValuesResponse> {
        match &request.filters {
            Some(filters) if !filters.is_empty() => {
                tracing::debug!(
                    "POST field values for {} with {} upstream filters",
                    request.field_name,
                    filters.len()
                );
                self.post(FIELD_VALUES_PATH, request, &json!({ "filters": filters }))
                    .await
            }
            _ => self.get(FIELD_VALUES_PATH, request).await,
        }
    }
}

#[async_trait]
impl ReportTransport for HttpClient {
    async fn fetch_report(&self, payload: &RequestPayload) -> Result<ReportResponse> {
        self.get(payload.endpoint.path(), &payload.query()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_core::{
        serialize, Aggregation, ConditionValue, DateRange, FilterCondition, Operator,
        ReportQueryBuilder, UpstreamFilter,
    };
    use mockito::{Matcher, Server};

    fn test_config(server_url: &str) -> ApiConfig {
        ApiConfig {
            endpoint: format!("{}/", server_url),
            business: "B1".to_string(),
            timeout_seconds: 5,
        }
    }

    fn values_request(filters: Option<Vec<UpstreamFilter>>) -> FieldValuesRequest {
        FieldValuesRequest {
            field_name: "Color".to_string(),
            business: "B1".to_string(),
            search: None,
            offset: 0,
            limit: 50,
            filters,
        }
    }

    #[tokio::test]
    async fn test_available_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/filter/available-fields")
            .match_query(Matcher::UrlEncoded("business".into(), "B1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"fields":["Category","Sale_Price"]}"#)
            .create_async()
            .await;

        let client = HttpClient::new(&test_config(&server.url())).unwrap();
        let fields = client.available_fields("B1").await.unwrap();
        assert_eq!(fields, vec!["Category", "Sale_Price"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_field_values_without_filters_uses_get() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/filter/field-values")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("field_name".into(), "Color".into()),
                Matcher::UrlEncoded("business".into(), "B1".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"values":["Red","Blue"],"has_more":true,"total_count":80}"#)
            .create_async()
            .await;

        let client = HttpClient::new(&test_config(&server.url())).unwrap();
        let response = client.field_values(&values_request(None)).await.unwrap();
        assert_eq!(response.values, vec!["Red", "Blue"]);
        assert!(response.has_more);
        assert_eq!(response.total_count(), 80);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_field_values_with_filters_posts_them() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/filter/field-values")
            .match_query(Matcher::UrlEncoded("field_name".into(), "Color".into()))
            .match_body(Matcher::Json(serde_json::json!({
                "filters": [{"field_name": "Category", "operator": "IN", "value": ["Shoes"]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"values":["Black"],"has_more":false}"#)
            .create_async()
            .await;

        let upstream = vec![UpstreamFilter {
            field_name: "Category".to_string(),
            operator: Operator::In,
            value: ConditionValue::Set(vec!["Shoes".to_string()]),
        }];
        let client = HttpClient::new(&test_config(&server.url())).unwrap();
        let response = client
            .field_values(&values_request(Some(upstream)))
            .await
            .unwrap();
        assert_eq!(response.values, vec!["Black"]);
        assert_eq!(response.total_count(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/filter/field-values")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("database unavailable")
            .create_async()
            .await;

        let client = HttpClient::new(&test_config(&server.url())).unwrap();
        let err = client
            .field_values(&values_request(None))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("500"));
        assert!(err.contains("database unavailable"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/filter/available-fields")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = HttpClient::new(&test_config(&server.url())).unwrap();
        let err = client.available_fields("B1").await.unwrap_err();
        assert!(err.to_string().contains("Failed to deserialize"));
    }

    #[tokio::test]
    async fn test_fetch_report_sends_item_filter() {
        let mut server = Server::new_async().await;
        let item_filter = r#"{"Category":[{"operator":"IN","value":["Shoes"]}]}"#;
        let mock = server
            .mock("GET", "/api/Sale-report")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("business".into(), "B1".into()),
                Matcher::UrlEncoded("Start_Date".into(), "2024-01-01".into()),
                Matcher::UrlEncoded("End_Date".into(), "2024-01-31".into()),
                Matcher::UrlEncoded("aggregation".into(), "daily".into()),
                Matcher::UrlEncoded("item_filter".into(), item_filter.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"details":[{"date":"2024-01-01","sales":3}],"summary":{"sales":3}}}"#)
            .create_async()
            .await;

        let filters = serialize(&[FilterCondition::new(
            "Category",
            Operator::In,
            ConditionValue::Set(vec!["Shoes".to_string()]),
        )]);
        let payload = ReportQueryBuilder::new("B1", Aggregation::Daily)
            .date_range(DateRange::parse("2024-01-01", "2024-01-31").unwrap())
            .filters(filters)
            .build()
            .unwrap();

        let client = HttpClient::new(&test_config(&server.url())).unwrap();
        let report = client.fetch_report(&payload).await.unwrap();
        assert_eq!(report.rows().len(), 1);
        assert!(report.summary().is_some());
        mock.assert_async().await;
    }
}
