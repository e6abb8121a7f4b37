//! Paginated distinct-value suggestions, cache-aware and cascading.
//!
//! Only the default page (page 1, no search term) is ever served from or
//! written to the cache, and only when it holds at least one value. Fetches issued for a filter row carry a
//! [`FetchTicket`]; a response whose ticket has been superseded is dropped
//! without touching the cache.

use filter_core::{
    CacheInvalidation, CacheKey, FetchGenerations, FetchTicket, FieldValueCache, UpstreamFilter,
    ValuePage,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::transport::{FieldValuesRequest, FilterTransport};

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Result of one fetch. Failures still yield an (empty) page; the error is
/// handed back for the caller to show or ignore.
#[derive(Debug)]
pub struct FetchOutcome {
    pub page: ValuePage,
    pub from_cache: bool,
    pub error: Option<anyhow::Error>,
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    cache: FieldValueCache,
    generations: FetchGenerations,
}

pub struct FieldValueProvider<T: FilterTransport> {
    transport: Arc<T>,
    business: String,
    page_size: u32,
    state: Mutex<ProviderState>,
}

impl<T: FilterTransport> FieldValueProvider<T> {
    pub fn new(transport: Arc<T>, business: impl Into<String>) -> Self {
        Self {
            transport,
            business: business.into(),
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(ProviderState::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn business(&self) -> &str {
        &self.business
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetches one page of values for `field`. `page` is 1-based.
    pub async fn fetch_values(
        &self,
        field: &str,
        search: &str,
        page: u32,
        upstream: &[UpstreamFilter],
    ) -> FetchOutcome {
        self.fetch(None, field, search, page, upstream).await
    }

    /// Starts a fetch for row `index`, superseding any earlier one.
    pub fn begin_fetch(&self, index: usize) -> FetchTicket {
        self.lock().generations.begin(index)
    }

    /// Ticket for the row's live generation, for follow-up pages that must
    /// not supersede the fetch that is already showing.
    pub fn current_ticket(&self, index: usize) -> FetchTicket {
        self.lock().generations.current(index)
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.lock().generations.is_current(ticket)
    }

    /// Like [`fetch_values`](Self::fetch_values), but returns `None` when the
    /// ticket went stale while the request was in flight.
    pub async fn fetch_for_row(
        &self,
        ticket: &FetchTicket,
        field: &str,
        search: &str,
        page: u32,
        upstream: &[UpstreamFilter],
    ) -> Option<FetchOutcome> {
        let outcome = self
            .fetch(Some(ticket), field, search, page, upstream)
            .await;
        if self.is_current(ticket) {
            Some(outcome)
        } else {
            tracing::debug!(
                "Discarding stale values for row {} (generation {})",
                ticket.index,
                ticket.generation
            );
            None
        }
    }

    async fn fetch(
        &self,
        ticket: Option<&FetchTicket>,
        field: &str,
        search: &str,
        page: u32,
        upstream: &[UpstreamFilter],
    ) -> FetchOutcome {
        let page = page.max(1);
        let key = CacheKey::new(field, &self.business, upstream, search, page);
        let cacheable = page == 1 && search.is_empty();

        if cacheable {
            let cached = self.lock().cache.get(&key).cloned();
            if let Some(cached) = cached {
                tracing::debug!("Cache hit for {} values", field);
                return FetchOutcome {
                    page: cached,
                    from_cache: true,
                    error: None,
                };
            }
        }

        let request = FieldValuesRequest {
            field_name: field.to_string(),
            business: self.business.clone(),
            search: (!search.is_empty()).then(|| search.to_string()),
            offset: u64::from(page - 1) * u64::from(self.page_size),
            limit: self.page_size,
            filters: (!upstream.is_empty()).then(|| upstream.to_vec()),
        };

        match self.transport.field_values(&request).await {
            Ok(response) => {
                let total_count = response.total_count();
                let value_page = ValuePage {
                    values: response.values,
                    has_more: response.has_more,
                    next_page: page + 1,
                    total_count,
                };
                if cacheable && !value_page.values.is_empty() {
                    let mut state = self.lock();
                    let live = ticket.map_or(true, |t| state.generations.is_current(t));
                    if live {
                        state.cache.insert(key, value_page.clone());
                    }
                }
                FetchOutcome {
                    page: value_page,
                    from_cache: false,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch values for {}: {:#}", field, e);
                FetchOutcome {
                    page: ValuePage::empty(page),
                    from_cache: false,
                    error: Some(e),
                }
            }
        }
    }

    pub fn invalidate_field(&self, field: &str) -> usize {
        self.lock().cache.invalidate_field(field)
    }

    pub fn clear_cache(&self) {
        self.lock().cache.clear();
    }

    pub fn retire_from(&self, index: usize) {
        self.lock().generations.retire_from(index);
    }

    /// Carries out the cache side of a store mutation.
    pub fn apply(&self, invalidations: &[CacheInvalidation], retire_from: Option<usize>) {
        let mut state = self.lock();
        for invalidation in invalidations {
            match invalidation {
                CacheInvalidation::Field(field) => {
                    let removed = state.cache.invalidate_field(field);
                    tracing::debug!("Invalidated {} cached pages for {}", removed, field);
                }
                CacheInvalidation::All => state.cache.clear(),
            }
        }
        if let Some(index) = retire_from {
            state.generations.retire_from(index);
        }
    }

    pub fn cache_len(&self) -> usize {
        self.lock().cache.len()
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
