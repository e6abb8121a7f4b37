//! One user's filter builder: the rows, their suggestion lists and the last
//! applied filter set, wired to the remote services.

use anyhow::Result;
use filter_core::{
    serialize, Aggregation, AppliedFilterSet, ConditionUpdate, FetchTicket, FieldDescriptor,
    FilterCondition, FilterConfigStore, FilterError, RangeBound, ReportQueryBuilder,
    RequestPayload, StoreChange, UpstreamFilter, UpstreamFingerprint,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::catalog::FieldCatalog;
use crate::config::Config;
use crate::provider::{FetchOutcome, FieldValueProvider};
use crate::transport::{FilterTransport, ReportResponse, ReportTransport};

pub const DEFAULT_MIN_SEARCH_CHARS: usize = 3;

/// Suggestion list shown under one filter row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestions {
    pub field: String,
    pub search: String,
    pub values: Vec<String>,
    pub has_more: bool,
    pub next_page: u32,
    pub total_count: u64,
    /// Earlier rows' conditions the first page was fetched under.
    pub upstream: UpstreamFingerprint,
    /// Last fetch failure, shown as "no suggestions available".
    pub error: Option<String>,
}

/// A suggestion fetch a mutation asked for. Run it with [`FilterSession::warm`].
#[derive(Debug, Clone, PartialEq)]
pub struct WarmRequest {
    pub ticket: FetchTicket,
    pub field: String,
    pub upstream: Vec<UpstreamFilter>,
}

/// What a fetched page was requested for.
struct Listing<'a> {
    field: &'a str,
    search: &'a str,
    upstream: &'a [UpstreamFilter],
}

pub struct FilterSession<T: FilterTransport + ReportTransport> {
    transport: Arc<T>,
    business: String,
    store: Mutex<FilterConfigStore>,
    provider: FieldValueProvider<T>,
    catalog: FieldCatalog<T>,
    suggestions: Mutex<BTreeMap<usize, Suggestions>>,
    applied: Mutex<AppliedFilterSet>,
    min_search_chars: usize,
}

impl<T: FilterTransport + ReportTransport> FilterSession<T> {
    pub fn new(transport: Arc<T>, business: impl Into<String>, store: FilterConfigStore) -> Self {
        let business = business.into();
        Self {
            provider: FieldValueProvider::new(transport.clone(), business.clone()),
            catalog: FieldCatalog::new(transport.clone(), store.registry().clone()),
            transport,
            business,
            store: Mutex::new(store),
            suggestions: Mutex::new(BTreeMap::new()),
            applied: Mutex::new(AppliedFilterSet::default()),
            min_search_chars: DEFAULT_MIN_SEARCH_CHARS,
        }
    }

    pub fn from_config(transport: Arc<T>, config: &Config) -> Self {
        let mut session = Self::new(
            transport.clone(),
            config.api.business.clone(),
            FilterConfigStore::new(config.registry()),
        );
        session.provider = FieldValueProvider::new(transport, config.api.business.clone())
            .with_page_size(config.values.page_size);
        session.min_search_chars = config.values.min_search_chars;
        session
    }

    pub fn business(&self) -> &str {
        &self.business
    }

    pub fn provider(&self) -> &FieldValueProvider<T> {
        &self.provider
    }

    pub async fn load_fields(&self) -> Vec<FieldDescriptor> {
        self.catalog.fields(&self.business).await
    }

    pub async fn refresh_fields(&self) -> Vec<FieldDescriptor> {
        self.catalog.refresh(&self.business).await
    }

    pub fn conditions(&self) -> Vec<FilterCondition> {
        self.store().snapshot()
    }

    pub fn valid_filter_count(&self) -> usize {
        self.store().valid_filter_count()
    }

    pub fn add_filter(&self) -> usize {
        self.store().add_filter()
    }

    /// Applies one edit and returns the suggestion fetch it calls for, if any.
    /// The returned request already supersedes earlier fetches for the row.
    pub fn update_filter(
        &self,
        index: usize,
        update: ConditionUpdate,
    ) -> Result<Option<WarmRequest>, FilterError> {
        let clears_suggestions = matches!(update, ConditionUpdate::Field(_));
        let mut store = self.store();
        let change = store.update_filter(index, update)?;
        if clears_suggestions {
            self.suggestions_lock().remove(&index);
        }
        Ok(self.settle(&store, change))
    }

    pub fn set_range_bound(
        &self,
        index: usize,
        bound: RangeBound,
        value: impl Into<String>,
    ) -> Result<(), FilterError> {
        let mut store = self.store();
        let change = store.set_range_bound(index, bound, value)?;
        self.settle(&store, change);
        Ok(())
    }

    pub fn remove_filter(&self, index: usize) -> Result<(), FilterError> {
        let mut store = self.store();
        let change = store.remove_filter(index)?;
        self.settle(&store, change);

        let mut suggestions = self.suggestions_lock();
        let shifted: BTreeMap<usize, Suggestions> = std::mem::take(&mut *suggestions)
            .into_iter()
            .filter(|(row, _)| *row != index)
            .map(|(row, list)| if row > index { (row - 1, list) } else { (row, list) })
            .collect();
        *suggestions = shifted;
        Ok(())
    }

    pub fn reset_filters(&self) {
        let mut store = self.store();
        let change = store.reset_filters();
        self.settle(&store, change);
        self.suggestions_lock().clear();
        *self.applied_lock() = AppliedFilterSet::default();
        tracing::info!("Filters reset");
    }

    /// Replaces every row, e.g. with a saved configuration.
    pub fn load_filters(&self, conditions: Vec<FilterCondition>) -> Result<(), FilterError> {
        let mut store = self.store();
        let change = store.load(conditions)?;
        self.settle(&store, change);
        self.suggestions_lock().clear();
        Ok(())
    }

    /// Runs a suggestion fetch. Returns false when a newer edit superseded it.
    pub async fn warm(&self, request: WarmRequest) -> bool {
        self.fetch_into(&request.ticket, &request.field, "", 1, &request.upstream, false)
            .await
    }

    /// Replaces the row's suggestions with the first page matching `search`.
    /// Terms shorter than the minimum fall back to the unfiltered list.
    pub async fn search_values(&self, index: usize, search: &str) -> Result<bool, FilterError> {
        let search = search.trim();
        let search = if search.chars().count() < self.min_search_chars {
            ""
        } else {
            search
        };
        let (field, upstream) = self.fetch_context(index)?;
        let ticket = self.provider.begin_fetch(index);
        Ok(self
            .fetch_into(&ticket, &field, search, 1, &upstream, false)
            .await)
    }

    /// Appends the next page to the row's suggestions. If an earlier row
    /// changed since the list was fetched, the list is reloaded from page 1
    /// under the current upstream instead.
    pub async fn load_more(&self, index: usize) -> Result<bool, FilterError> {
        let (field, upstream) = self.fetch_context(index)?;
        let Some(current) = self.suggestions(index).filter(|list| list.field == field) else {
            return Ok(false);
        };

        if current.upstream != UpstreamFingerprint::of(&upstream) {
            tracing::debug!("Upstream of row {} changed, reloading its suggestions", index);
            let ticket = self.provider.begin_fetch(index);
            return Ok(self
                .fetch_into(&ticket, &field, &current.search, 1, &upstream, false)
                .await);
        }
        if !current.has_more {
            return Ok(false);
        }
        let ticket = self.provider.current_ticket(index);
        Ok(self
            .fetch_into(&ticket, &field, &current.search, current.next_page, &upstream, true)
            .await)
    }

    pub fn suggestions(&self, index: usize) -> Option<Suggestions> {
        self.suggestions_lock().get(&index).cloned()
    }

    /// Serializes the valid rows and records them as the applied set.
    pub fn apply(&self) -> AppliedFilterSet {
        let applied = serialize(self.store().conditions());
        tracing::info!("Applied {} filtered fields", applied.len());
        *self.applied_lock() = applied.clone();
        applied
    }

    pub fn applied_filters(&self) -> AppliedFilterSet {
        self.applied_lock().clone()
    }

    /// Report query preloaded with this session's business and applied filters.
    pub fn report_query(&self, aggregation: Aggregation) -> ReportQueryBuilder {
        ReportQueryBuilder::new(self.business.clone(), aggregation).filters(self.applied_filters())
    }

    /// Sends a report request. A failure leaves the filter state as it was.
    pub async fn fetch_report(&self, payload: &RequestPayload) -> Result<ReportResponse> {
        match self.transport.fetch_report(payload).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Report request to {} failed: {:#}", payload.endpoint.path(), e);
                Err(e)
            }
        }
    }

    fn fetch_context(&self, index: usize) -> Result<(String, Vec<UpstreamFilter>), FilterError> {
        let store = self.store();
        let field = store
            .get(index)?
            .field
            .clone()
            .ok_or(FilterError::MissingField(index))?;
        Ok((field, store.upstream_for(index)))
    }

    /// Forwards a store change to the provider and prepares the warm fetch.
    fn settle(&self, store: &FilterConfigStore, change: StoreChange) -> Option<WarmRequest> {
        self.provider
            .apply(&change.invalidations, change.retire_from);
        let index = change.warm?;
        let field = store.get(index).ok()?.field.clone()?;
        Some(WarmRequest {
            ticket: self.provider.begin_fetch(index),
            field,
            upstream: store.upstream_for(index),
        })
    }

    /// Fetches one page for the row and shows it unless the ticket went stale.
    async fn fetch_into(
        &self,
        ticket: &FetchTicket,
        field: &str,
        search: &str,
        page: u32,
        upstream: &[UpstreamFilter],
        append: bool,
    ) -> bool {
        match self
            .provider
            .fetch_for_row(ticket, field, search, page, upstream)
            .await
        {
            Some(outcome) => {
                let list = Listing {
                    field,
                    search,
                    upstream,
                };
                self.show(ticket.index, list, outcome, append);
                true
            }
            None => false,
        }
    }

    fn show(&self, index: usize, list: Listing<'_>, outcome: FetchOutcome, append: bool) {
        let mut suggestions = self.suggestions_lock();
        let error = outcome.error.map(|e| format!("{:#}", e));
        match suggestions.get_mut(&index) {
            Some(current) if append => {
                current.values.extend(outcome.page.values);
                current.has_more = outcome.page.has_more;
                if error.is_none() {
                    current.next_page = outcome.page.next_page;
                }
                current.error = error;
            }
            _ => {
                suggestions.insert(
                    index,
                    Suggestions {
                        field: list.field.to_string(),
                        search: list.search.to_string(),
                        values: outcome.page.values,
                        has_more: outcome.page.has_more,
                        next_page: outcome.page.next_page,
                        total_count: outcome.page.total_count,
                        upstream: UpstreamFingerprint::of(list.upstream),
                        error,
                    },
                );
            }
        }
    }

    fn store(&self) -> MutexGuard<'_, FilterConfigStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn suggestions_lock(&self) -> MutexGuard<'_, BTreeMap<usize, Suggestions>> {
        self.suggestions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn applied_lock(&self) -> MutexGuard<'_, AppliedFilterSet> {
        self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FieldValuesRequest, FieldValuesResponse};
    use anyhow::bail;
    use async_trait::async_trait;
    use filter_core::{ConditionValue, DateRange, Operator};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers field-values requests after a per-field delay, echoing the
    /// upstream filter count so tests can tell responses apart.
    #[derive(Default)]
    struct FakeBackend {
        calls: AtomicUsize,
        fail_reports: AtomicBool,
        requests: Mutex<Vec<FieldValuesRequest>>,
    }

    #[async_trait]
    impl FilterTransport for FakeBackend {
        async fn available_fields(&self, _business: &str) -> Result<Vec<String>> {
            Ok(vec!["Category".into(), "Color".into(), "Sale_Price".into()])
        }

        async fn field_values(&self, request: &FieldValuesRequest) -> Result<FieldValuesResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let delay = if request.field_name == "Slow_Field" { 50 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let page = request.offset / u64::from(request.limit) + 1;
            Ok(FieldValuesResponse {
                values: vec![format!("{}#{}", request.field_name, page)],
                has_more: page < 2,
                total_count: Some(2),
            })
        }
    }

    #[async_trait]
    impl ReportTransport for FakeBackend {
        async fn fetch_report(&self, _payload: &RequestPayload) -> Result<ReportResponse> {
            if self.fail_reports.load(Ordering::SeqCst) {
                bail!("HTTP 503 for GET /api/Sale-report");
            }
            Ok(ReportResponse {
                data: serde_json::json!([{"Category": "Shoes", "Units_Sold": 7}]),
            })
        }
    }

    fn session() -> (Arc<FakeBackend>, FilterSession<FakeBackend>) {
        let backend = Arc::new(FakeBackend::default());
        let session = FilterSession::new(backend.clone(), "B1", FilterConfigStore::default());
        (backend, session)
    }

    fn choose(session: &FilterSession<FakeBackend>, index: usize, field: &str) -> WarmRequest {
        session
            .update_filter(index, ConditionUpdate::Field(Some(field.to_string())))
            .unwrap()
            .unwrap()
    }

    fn category_in(session: &FilterSession<FakeBackend>, index: usize, values: &[&str]) {
        choose(session, index, "Category");
        session
            .update_filter(index, ConditionUpdate::Operator(Some(Operator::In)))
            .unwrap();
        session
            .update_filter(index, ConditionUpdate::Value(set(values)))
            .unwrap();
    }

    fn set(values: &[&str]) -> ConditionValue {
        ConditionValue::Set(values.iter().map(|v| v.to_string()).collect())
    }

    #[tokio::test]
    async fn test_field_change_warms_suggestions() {
        let (backend, session) = session();
        let row = session.add_filter();
        let request = choose(&session, row, "Category");
        assert!(request.upstream.is_empty());

        assert!(session.warm(request).await);
        let list = session.suggestions(row).unwrap();
        assert_eq!(list.field, "Category");
        assert_eq!(list.values, vec!["Category#1"]);
        assert!(list.has_more);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_quick_double_field_change_keeps_newest() {
        let (_backend, session) = session();
        let row = session.add_filter();
        let slow = choose(&session, row, "Slow_Field");
        let fast = choose(&session, row, "Color");

        let (slow_applied, fast_applied) = tokio::join!(session.warm(slow), session.warm(fast));
        assert!(!slow_applied);
        assert!(fast_applied);
        assert_eq!(session.suggestions(row).unwrap().field, "Color");
        // The superseded response never reached the cache
        assert_eq!(session.provider().cache_len(), 1);
    }

    #[tokio::test]
    async fn test_clearing_field_drops_inflight_suggestions() {
        let (_backend, session) = session();
        let row = session.add_filter();
        let slow = choose(&session, row, "Slow_Field");

        let (applied, cleared) = tokio::join!(session.warm(slow), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.update_filter(row, ConditionUpdate::Field(None))
        });
        assert_eq!(cleared, Ok(None));
        assert!(!applied);
        assert_eq!(session.conditions()[row].field, None);
        assert!(session.suggestions(row).is_none());
        assert_eq!(session.provider().cache_len(), 0);
    }

    #[tokio::test]
    async fn test_later_rows_cascade_on_earlier_valid_rows() {
        let (backend, session) = session();
        let first = session.add_filter();
        category_in(&session, first, &["Shoes"]);

        let second = session.add_filter();
        let request = choose(&session, second, "Color");
        assert_eq!(request.upstream.len(), 1);
        assert_eq!(request.upstream[0].field_name, "Category");

        session.warm(request).await;
        let sent = backend.requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(sent.filters.map(|f| f.len()), Some(1));
    }

    #[tokio::test]
    async fn test_load_more_appends_next_page() {
        let (_backend, session) = session();
        let row = session.add_filter();
        session.warm(choose(&session, row, "Color")).await;

        assert!(session.load_more(row).await.unwrap());
        let list = session.suggestions(row).unwrap();
        assert_eq!(list.values, vec!["Color#1", "Color#2"]);
        assert!(!list.has_more);
        assert_eq!(list.next_page, 3);

        // Nothing left to load
        assert!(!session.load_more(row).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_more_after_upstream_edit_reloads_first_page() {
        let (backend, session) = session();
        let first = session.add_filter();
        category_in(&session, first, &["Shoes"]);
        let second = session.add_filter();
        session.warm(choose(&session, second, "Color")).await;

        session
            .update_filter(first, ConditionUpdate::Value(set(&["Bags"])))
            .unwrap();
        assert!(session.load_more(second).await.unwrap());

        let list = session.suggestions(second).unwrap();
        assert_eq!(list.values, vec!["Color#1"]);
        assert!(list.has_more);
        let sent = backend.requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(sent.offset, 0);
        assert_eq!(sent.filters.unwrap()[0].value, set(&["Bags"]));

        // Same upstream now, so the next call appends
        assert!(session.load_more(second).await.unwrap());
        let list = session.suggestions(second).unwrap();
        assert_eq!(list.values, vec!["Color#1", "Color#2"]);
        let sent = backend.requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(sent.filters.unwrap()[0].value, set(&["Bags"]));
    }

    #[tokio::test]
    async fn test_upstream_edit_drops_inflight_next_page() {
        let (_backend, session) = session();
        let first = session.add_filter();
        category_in(&session, first, &["Shoes"]);
        let second = session.add_filter();
        session.warm(choose(&session, second, "Slow_Field")).await;

        let (appended, _) = tokio::join!(session.load_more(second), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session
                .update_filter(first, ConditionUpdate::Value(set(&["Bags"])))
                .unwrap();
        });
        assert!(!appended.unwrap());
        assert_eq!(
            session.suggestions(second).unwrap().values,
            vec!["Slow_Field#1"]
        );
    }

    #[tokio::test]
    async fn test_short_search_falls_back_to_default_list() {
        let (backend, session) = session();
        let row = session.add_filter();
        session.warm(choose(&session, row, "Color")).await;

        session.search_values(row, "bl").await.unwrap();
        assert_eq!(session.suggestions(row).unwrap().search, "");
        // Default page came from the cache
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        session.search_values(row, "blu").await.unwrap();
        assert_eq!(session.suggestions(row).unwrap().search, "blu");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_requires_a_field() {
        let (_backend, session) = session();
        let row = session.add_filter();
        assert_eq!(
            session.search_values(row, "shoes").await.unwrap_err(),
            FilterError::MissingField(row)
        );
    }

    #[tokio::test]
    async fn test_remove_shifts_suggestions_and_retires_fetches() {
        let (_backend, session) = session();
        let first = session.add_filter();
        let second = session.add_filter();
        session.warm(choose(&session, first, "Category")).await;
        session.warm(choose(&session, second, "Color")).await;
        let pending = session
            .update_filter(second, ConditionUpdate::Operator(Some(Operator::NotIn)))
            .unwrap()
            .unwrap();

        session.remove_filter(first).unwrap();
        assert_eq!(session.suggestions(0).unwrap().field, "Color");
        assert!(session.suggestions(1).is_none());
        assert!(!session.warm(pending).await);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (_backend, session) = session();
        let row = session.add_filter();
        session.warm(choose(&session, row, "Color")).await;
        session.apply();

        session.reset_filters();
        assert!(session.conditions().is_empty());
        assert!(session.suggestions(row).is_none());
        assert!(session.applied_filters().is_empty());
        assert_eq!(session.provider().cache_len(), 0);
    }

    #[tokio::test]
    async fn test_removing_last_row_clears_cache() {
        let (_backend, session) = session();
        let row = session.add_filter();
        session.warm(choose(&session, row, "Color")).await;
        assert_eq!(session.provider().cache_len(), 1);

        session.remove_filter(row).unwrap();
        assert!(session.conditions().is_empty());
        assert!(session.suggestions(row).is_none());
        assert_eq!(session.provider().cache_len(), 0);
    }

    #[tokio::test]
    async fn test_apply_and_report_round() {
        let (backend, session) = session();
        session
            .load_filters(vec![
                FilterCondition::new(
                    "Category",
                    Operator::In,
                    ConditionValue::Set(vec!["Shoes".into()]),
                ),
                FilterCondition::new(
                    "Sale_Price",
                    Operator::Between,
                    ConditionValue::Range("100".into(), String::new()),
                ),
            ])
            .unwrap();
        assert_eq!(session.valid_filter_count(), 1);

        let applied = session.apply();
        assert_eq!(applied.len(), 1);
        assert_eq!(session.applied_filters(), applied);

        let payload = session
            .report_query(Aggregation::Summary)
            .group_by(vec!["Category".into()])
            .build()
            .unwrap();
        assert!(payload.get("item_filter").is_some());
        let report = session.fetch_report(&payload).await.unwrap();
        assert_eq!(report.rows().len(), 1);

        backend.fail_reports.store(true, Ordering::SeqCst);
        let before = session.conditions();
        let period = session
            .report_query(Aggregation::Daily)
            .date_range(DateRange::parse("2024-01-01", "2024-01-31").unwrap())
            .build()
            .unwrap();
        assert!(session.fetch_report(&period).await.is_err());
        assert_eq!(session.conditions(), before);
        assert_eq!(session.applied_filters(), applied);
    }

    #[tokio::test]
    async fn test_load_fields_types_them() {
        let (_backend, session) = session();
        let fields = session.load_fields().await;
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[2].field_type, filter_core::FieldType::Number);
    }
}
