//! Turns the builder's rows into the `item_filter` payload of the report service.

use crate::condition::{ConditionValue, FilterCondition};
use crate::operators::Operator;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct FilterEntry {
    pub operator: Operator,
    pub value: ConditionValue,
}

/// Field name to its `{operator, value}` entries, unique by operator.
///
/// An empty set means "no filters applied". Empty values are never emitted,
/// so it cannot be confused with a field filtered by nothing. Equality ignores
/// field order, entry order and the order of set members.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AppliedFilterSet {
    fields: IndexMap<String, Vec<FilterEntry>>,
}

impl AppliedFilterSet {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&[FilterEntry]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[FilterEntry])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// JSON text sent as `item_filter`.
    pub fn to_json(&self) -> String {
        // Only string keys and string values: serialization cannot fail.
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    fn add(&mut self, field: &str, operator: Operator, value: ConditionValue) {
        let entries = self.fields.entry(field.to_string()).or_default();
        let Some(existing) = entries.iter_mut().find(|e| e.operator == operator) else {
            entries.push(FilterEntry { operator, value });
            return;
        };
        match (&mut existing.value, value) {
            (ConditionValue::Set(merged), ConditionValue::Set(incoming)) => {
                for v in incoming {
                    if !merged.contains(&v) {
                        merged.push(v);
                    }
                }
            }
            (slot, incoming) => {
                warn!(
                    "Conflicting {} filters on {}: replacing {:?} with {:?}",
                    operator, field, slot, incoming
                );
                *slot = incoming;
            }
        }
    }
}

impl PartialEq for AppliedFilterSet {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().all(|(field, entries)| {
                other
                    .fields
                    .get(field)
                    .is_some_and(|theirs| same_entries(entries, theirs))
            })
    }
}

impl Eq for AppliedFilterSet {}

fn same_entries(ours: &[FilterEntry], theirs: &[FilterEntry]) -> bool {
    ours.len() == theirs.len()
        && ours.iter().all(|entry| {
            theirs
                .iter()
                .any(|t| t.operator == entry.operator && same_value(&entry.value, &t.value))
        })
}

fn same_value(a: &ConditionValue, b: &ConditionValue) -> bool {
    match (a, b) {
        (ConditionValue::Set(x), ConditionValue::Set(y)) => {
            x.iter().collect::<BTreeSet<_>>() == y.iter().collect::<BTreeSet<_>>()
        }
        _ => a == b,
    }
}

/// Keeps rows with a field, an operator and a valid value, then groups them
/// by field. Repeated set operators on a field union their values; any other
/// repeat is a conflict resolved in favour of the later row.
pub fn serialize(conditions: &[FilterCondition]) -> AppliedFilterSet {
    let mut applied = AppliedFilterSet::default();
    for condition in conditions.iter().filter(|c| c.is_valid()) {
        if let (Some(field), Some(operator)) = (&condition.field, condition.operator) {
            applied.add(field, operator, condition.value.clone());
        }
    }
    debug!(
        "Serialized {} of {} filter rows into {} fields",
        conditions.iter().filter(|c| c.is_valid()).count(),
        conditions.len(),
        applied.len()
    );
    applied
}
