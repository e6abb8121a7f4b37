//! Remote side of the sales dashboard filters: field catalog, paginated value
//! suggestions and report requests over HTTP.

pub mod catalog;
pub mod config;
pub mod http_client;
pub mod provider;
pub mod session;
pub mod transport;

pub use catalog::FieldCatalog;
pub use config::{ApiConfig, Config, ValuesConfig};
pub use http_client::HttpClient;
pub use provider::{FetchOutcome, FieldValueProvider};
pub use session::{FilterSession, Suggestions, WarmRequest};
pub use transport::{
    FieldValuesRequest, FieldValuesResponse, FilterTransport, ReportResponse, ReportTransport,
};
