//! Assembles report request parameters.
//!
//! Optional parameters are omitted when absent, never sent empty: the backend
//! reads a missing `Start_Date` as "no date constraint" and a missing
//! `item_filter` as "no filters".

use crate::errors::FilterError;
use crate::serializer::AppliedFilterSet;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::{Display, EnumIter, EnumString};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Aggregation {
    Daily,
    Weekly,
    Monthly,
    Custom,
    Compare,
    /// Group-by summary over the selected columns.
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvalidDateRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, FilterError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map_err(|e| FilterError::InvalidDateRange(format!("{}: {}", s, e)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportEndpoint {
    SaleReport,
    GroupbySummary,
}

impl ReportEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            ReportEndpoint::SaleReport => "/api/Sale-report",
            ReportEndpoint::GroupbySummary => "/api/groupby-summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportParams {
    pub business: String,
    pub aggregation: Aggregation,
    pub date_range: Option<DateRange>,
    pub compare_with: Option<DateRange>,
    pub group_by: Vec<String>,
    pub columns: Vec<String>,
    pub filters: AppliedFilterSet,
}

/// Final request: which endpoint and its query parameters, in send order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestPayload {
    pub endpoint: ReportEndpoint,
    pub params: IndexMap<String, String>,
}

impl RequestPayload {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

pub fn build_request(params: &ReportParams) -> Result<RequestPayload, FilterError> {
    let business = params.business.trim();
    if business.is_empty() {
        return Err(FilterError::MissingParameter("business"));
    }

    let mut query = IndexMap::new();
    query.insert("business".to_string(), business.to_string());

    let endpoint = match params.aggregation {
        Aggregation::Summary => {
            query.insert("groupby".to_string(), json!(params.group_by).to_string());
            query.insert(
                "data_fields".to_string(),
                json!(data_fields(&params.group_by, &params.columns)).to_string(),
            );
            if let Some(range) = &params.date_range {
                insert_range(&mut query, range);
            }
            ReportEndpoint::GroupbySummary
        }
        aggregation => {
            let range = params
                .date_range
                .as_ref()
                .ok_or(FilterError::MissingParameter("date_range"))?;
            insert_range(&mut query, range);
            query.insert("aggregation".to_string(), aggregation.to_string());
            if aggregation == Aggregation::Compare {
                let compare = params
                    .compare_with
                    .as_ref()
                    .ok_or(FilterError::MissingParameter("compare_with"))?;
                query.insert(
                    "compare_with".to_string(),
                    json!({
                        "start_date": compare.start_str(),
                        "end_date": compare.end_str(),
                    })
                    .to_string(),
                );
            }
            ReportEndpoint::SaleReport
        }
    };

    if !params.filters.is_empty() {
        query.insert("item_filter".to_string(), params.filters.to_json());
    }

    Ok(RequestPayload {
        endpoint,
        params: query,
    })
}

fn insert_range(query: &mut IndexMap<String, String>, range: &DateRange) {
    query.insert("Start_Date".to_string(), range.start_str());
    query.insert("End_Date".to_string(), range.end_str());
}

/// Grouping fields followed by selected columns, first occurrence kept.
fn data_fields(group_by: &[String], columns: &[String]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::with_capacity(group_by.len() + columns.len());
    for field in group_by.iter().chain(columns) {
        if !fields.contains(field) {
            fields.push(field.clone());
        }
    }
    fields
}

/// Fluent construction of [`ReportParams`].
#[derive(Debug, Clone)]
pub struct ReportQueryBuilder {
    params: ReportParams,
}

impl ReportQueryBuilder {
    pub fn new(business: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            params: ReportParams {
                business: business.into(),
                aggregation,
                date_range: None,
                compare_with: None,
                group_by: Vec::new(),
                columns: Vec::new(),
                filters: AppliedFilterSet::default(),
            },
        }
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.params.date_range = Some(range);
        self
    }

    pub fn compare_with(mut self, range: DateRange) -> Self {
        self.params.compare_with = Some(range);
        self
    }

    pub fn group_by(mut self, fields: Vec<String>) -> Self {
        self.params.group_by = fields;
        self
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.params.columns = columns;
        self
    }

    pub fn filters(mut self, filters: AppliedFilterSet) -> Self {
        self.params.filters = filters;
        self
    }

    pub fn params(&self) -> &ReportParams {
        &self.params
    }

    pub fn build(&self) -> Result<RequestPayload, FilterError> {
        build_request(&self.params)
    }
}
