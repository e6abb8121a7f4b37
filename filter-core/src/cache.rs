//! Keyed store of fetched value pages.
//!
//! Keys carry a fingerprint of the upstream (earlier, valid) conditions so two
//! cascading contexts never share an entry. The cache itself is plain data:
//! the provider decides what is cacheable and when to invalidate.

use crate::condition::UpstreamFilter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One page of distinct values for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePage {
    pub values: Vec<String>,
    pub has_more: bool,
    pub next_page: u32,
    /// Distinct values the backend reported for the whole list, not this page.
    #[serde(default)]
    pub total_count: u64,
}

impl ValuePage {
    pub fn empty(page: u32) -> Self {
        Self {
            values: Vec::new(),
            has_more: false,
            next_page: page,
            total_count: 0,
        }
    }
}

/// Stable serialization of the upstream conditions of a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UpstreamFingerprint {
    canonical: String,
    fields: BTreeSet<String>,
}

impl UpstreamFingerprint {
    pub fn of(upstream: &[UpstreamFilter]) -> Self {
        if upstream.is_empty() {
            return Self::default();
        }
        // Row order is part of the identity; JSON keeps distinct lists distinct.
        let canonical = serde_json::to_string(upstream).unwrap_or_else(|_| {
            upstream
                .iter()
                .map(|f| format!("{:?}", f))
                .collect::<Vec<_>>()
                .join("|")
        });
        Self {
            canonical,
            fields: upstream.iter().map(|f| f.field_name.clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub field: String,
    pub business: String,
    pub upstream: UpstreamFingerprint,
    pub search: String,
    pub page: u32,
}

impl CacheKey {
    pub fn new(
        field: &str,
        business: &str,
        upstream: &[UpstreamFilter],
        search: &str,
        page: u32,
    ) -> Self {
        Self {
            field: field.to_string(),
            business: business.to_string(),
            upstream: UpstreamFingerprint::of(upstream),
            search: search.to_string(),
            page,
        }
    }

    /// True when the entry was fetched for `field` or scoped by a condition on it.
    pub fn touches(&self, field: &str) -> bool {
        self.field == field || self.upstream.mentions(field)
    }
}

#[derive(Debug, Default)]
pub struct FieldValueCache {
    pages: HashMap<CacheKey, ValuePage>,
}

impl FieldValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&ValuePage> {
        self.pages.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, page: ValuePage) {
        self.pages.insert(key, page);
    }

    /// Drops every entry touching `field`; returns how many were removed.
    pub fn invalidate_field(&mut self, field: &str) -> usize {
        let before = self.pages.len();
        self.pages.retain(|key, _| !key.touches(field));
        before - self.pages.len()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.pages.keys().any(|key| key.touches(field))
    }
}
