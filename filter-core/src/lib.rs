//! Filter configuration and query serialization for the sales dashboard.
//!
//! Holds the in-progress filter rows, the operator/value-shape policy per
//! field type, the value-page cache used by suggestion fetches, and the
//! assembly of report request parameters. Nothing here performs I/O.

pub mod cache;
pub mod condition;
pub mod errors;
pub mod fields;
pub mod generations;
pub mod operators;
pub mod report_query;
pub mod serializer;
pub mod store;

pub use cache::{CacheKey, FieldValueCache, UpstreamFingerprint, ValuePage};
pub use condition::{has_valid_filter_value, ConditionValue, FilterCondition, UpstreamFilter};
pub use errors::FilterError;
pub use fields::{FieldDescriptor, FieldRegistry, FieldType};
pub use generations::{FetchGenerations, FetchTicket};
pub use operators::{default_operator, legal_operators, value_shape_for, Operator, ValueShape};
pub use report_query::{
    build_request, Aggregation, DateRange, ReportEndpoint, ReportParams, ReportQueryBuilder,
    RequestPayload,
};
pub use serializer::{serialize, AppliedFilterSet, FilterEntry};
pub use store::{CacheInvalidation, ConditionUpdate, FilterConfigStore, RangeBound, StoreChange};
