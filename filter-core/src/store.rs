//! The filter builder's in-progress rows.
//!
//! Every mutation builds a replacement condition and installs it, so a
//! snapshot handed out earlier never changes underneath its holder. The store
//! never touches the value cache: each mutation reports the invalidations and
//! the row to warm, and the caller forwards them to the provider.

use crate::condition::{ConditionValue, FilterCondition, UpstreamFilter};
use crate::errors::FilterError;
use crate::fields::{FieldRegistry, FieldType};
use crate::operators::{default_operator, is_legal, Operator, ValueShape};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionUpdate {
    Field(Option<String>),
    Operator(Option<Operator>),
    Value(ConditionValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Lower,
    Upper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheInvalidation {
    Field(String),
    All,
}

/// Side effects a store mutation asks the caller to carry out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreChange {
    pub invalidations: Vec<CacheInvalidation>,
    /// Row whose suggestions should be (re)fetched.
    pub warm: Option<usize>,
    /// Outstanding fetches for rows at or after this index are stale.
    pub retire_from: Option<usize>,
}

/// Ordered filter rows. The empty state is zero rows.
#[derive(Debug, Clone, Default)]
pub struct FilterConfigStore {
    registry: FieldRegistry,
    conditions: Vec<FilterCondition>,
}

impl FilterConfigStore {
    pub fn new(registry: FieldRegistry) -> Self {
        Self {
            registry,
            conditions: Vec::new(),
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Owned copy of the current rows.
    pub fn snapshot(&self) -> Vec<FilterCondition> {
        self.conditions.clone()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&FilterCondition, FilterError> {
        self.conditions.get(index).ok_or(FilterError::InvalidIndex {
            index,
            len: self.conditions.len(),
        })
    }

    pub fn field_type_at(&self, index: usize) -> Option<FieldType> {
        let field = self.conditions.get(index)?.field.as_deref()?;
        Some(self.registry.field_type(field))
    }

    /// Appends an empty row and returns its index.
    pub fn add_filter(&mut self) -> usize {
        self.conditions.push(FilterCondition::empty());
        self.conditions.len() - 1
    }

    pub fn update_filter(
        &mut self,
        index: usize,
        update: ConditionUpdate,
    ) -> Result<StoreChange, FilterError> {
        let current = self.get(index)?;
        let (updated, change) = match update {
            ConditionUpdate::Field(field) => self.with_field(current, index, field),
            ConditionUpdate::Operator(operator) => {
                self.with_operator(current, index, operator)?
            }
            ConditionUpdate::Value(value) => {
                // Later rows cascade on this one; their fetches saw the old value
                let change = StoreChange {
                    retire_from: Some(index + 1),
                    ..StoreChange::default()
                };
                (self.with_value(current, value)?, change)
            }
        };
        debug!("Filter {} updated: {:?}", index, updated);
        self.conditions[index] = updated;
        Ok(change)
    }

    /// Edits one side of a range value.
    pub fn set_range_bound(
        &mut self,
        index: usize,
        bound: RangeBound,
        bound_value: impl Into<String>,
    ) -> Result<StoreChange, FilterError> {
        let current = self.get(index)?;
        let value = match (&current.value, bound) {
            (ConditionValue::Range(_, high), RangeBound::Lower) => {
                ConditionValue::Range(bound_value.into(), high.clone())
            }
            (ConditionValue::Range(low, _), RangeBound::Upper) => {
                ConditionValue::Range(low.clone(), bound_value.into())
            }
            (other, _) => {
                return Err(FilterError::ShapeMismatch {
                    expected: ValueShape::Range,
                    found: other.shape(),
                })
            }
        };
        self.update_filter(index, ConditionUpdate::Value(value))
    }

    pub fn remove_filter(&mut self, index: usize) -> Result<StoreChange, FilterError> {
        self.get(index)?;
        let mut remaining = self.conditions.clone();
        let removed = remaining.remove(index);
        self.conditions = remaining;

        let invalidations = if self.conditions.is_empty() {
            vec![CacheInvalidation::All]
        } else {
            removed
                .field
                .map(CacheInvalidation::Field)
                .into_iter()
                .collect()
        };
        Ok(StoreChange {
            invalidations,
            warm: None,
            retire_from: Some(index),
        })
    }

    pub fn reset_filters(&mut self) -> StoreChange {
        self.conditions = Vec::new();
        StoreChange {
            invalidations: vec![CacheInvalidation::All],
            warm: None,
            retire_from: Some(0),
        }
    }

    /// Replaces all rows after checking each against the operator policy.
    /// Rows without an operator get their value normalized to the empty form.
    pub fn load(&mut self, conditions: Vec<FilterCondition>) -> Result<StoreChange, FilterError> {
        let mut checked = Vec::with_capacity(conditions.len());
        for (index, condition) in conditions.into_iter().enumerate() {
            checked.push(self.checked(index, condition)?);
        }
        self.conditions = checked;
        Ok(StoreChange {
            invalidations: vec![CacheInvalidation::All],
            warm: None,
            retire_from: Some(0),
        })
    }

    /// Valid rows strictly before `index`, in row order.
    pub fn upstream_for(&self, index: usize) -> Vec<UpstreamFilter> {
        self.conditions
            .iter()
            .take(index)
            .filter_map(FilterCondition::to_upstream)
            .collect()
    }

    pub fn is_filter_valid(&self, index: usize) -> bool {
        self.conditions
            .get(index)
            .map(FilterCondition::is_valid)
            .unwrap_or(false)
    }

    pub fn valid_filter_count(&self) -> usize {
        self.conditions.iter().filter(|c| c.is_valid()).count()
    }

    fn with_field(
        &self,
        current: &FilterCondition,
        index: usize,
        field: Option<String>,
    ) -> (FilterCondition, StoreChange) {
        let field = field.filter(|f| !f.is_empty());
        let value = ConditionValue::empty(self.seed_shape(field.as_deref()));

        let mut invalidations = Vec::new();
        if let Some(old) = &current.field {
            if field.as_ref() != Some(old) {
                invalidations.push(CacheInvalidation::Field(old.clone()));
            }
        }
        if let Some(new) = &field {
            invalidations.push(CacheInvalidation::Field(new.clone()));
        }

        let warm = field.as_ref().map(|_| index);
        let updated = FilterCondition {
            field,
            operator: None,
            value,
        };
        (
            updated,
            StoreChange {
                invalidations,
                warm,
                retire_from: Some(index),
            },
        )
    }

    fn with_operator(
        &self,
        current: &FilterCondition,
        index: usize,
        operator: Option<Operator>,
    ) -> Result<(FilterCondition, StoreChange), FilterError> {
        let Some(operator) = operator else {
            let cleared = FilterCondition {
                operator: None,
                ..current.clone()
            };
            let change = StoreChange {
                retire_from: Some(index + 1),
                ..StoreChange::default()
            };
            return Ok((cleared, change));
        };
        let field = current
            .field
            .clone()
            .ok_or(FilterError::MissingField(index))?;
        if !is_legal(self.registry.field_type(&field), operator) {
            return Err(FilterError::IllegalOperator { field, operator });
        }

        let value = if current.value.shape() == operator.shape() {
            current.value.clone()
        } else {
            ConditionValue::empty(operator.shape())
        };
        let change = StoreChange {
            invalidations: vec![CacheInvalidation::Field(field.clone())],
            warm: Some(index),
            retire_from: Some(index + 1),
        };
        Ok((
            FilterCondition {
                field: Some(field),
                operator: Some(operator),
                value,
            },
            change,
        ))
    }

    fn with_value(
        &self,
        current: &FilterCondition,
        value: ConditionValue,
    ) -> Result<FilterCondition, FilterError> {
        let expected = self.expected_shape(current);
        if value.shape() != expected {
            return Err(FilterError::ShapeMismatch {
                expected,
                found: value.shape(),
            });
        }
        Ok(FilterCondition {
            value: dedup_set(value),
            ..current.clone()
        })
    }

    fn checked(
        &self,
        index: usize,
        condition: FilterCondition,
    ) -> Result<FilterCondition, FilterError> {
        match (&condition.field, condition.operator) {
            (None, Some(_)) => Err(FilterError::MissingField(index)),
            (Some(field), Some(operator)) => {
                if !is_legal(self.registry.field_type(field), operator) {
                    return Err(FilterError::IllegalOperator {
                        field: field.clone(),
                        operator,
                    });
                }
                if condition.value.shape() != operator.shape() {
                    return Err(FilterError::ShapeMismatch {
                        expected: operator.shape(),
                        found: condition.value.shape(),
                    });
                }
                Ok(FilterCondition {
                    value: dedup_set(condition.value),
                    ..condition
                })
            }
            (field, None) => {
                let shape = self.seed_shape(field.as_deref());
                if condition.value.shape() == shape {
                    Ok(condition)
                } else {
                    Ok(FilterCondition {
                        value: ConditionValue::empty(shape),
                        ..condition
                    })
                }
            }
        }
    }

    /// Shape of a row whose field is chosen but whose operator is not.
    fn seed_shape(&self, field: Option<&str>) -> ValueShape {
        match field {
            Some(field) => default_operator(self.registry.field_type(field)).shape(),
            None => ValueShape::Set,
        }
    }

    fn expected_shape(&self, condition: &FilterCondition) -> ValueShape {
        match condition.operator {
            Some(operator) => operator.shape(),
            None => self.seed_shape(condition.field.as_deref()),
        }
    }
}

fn dedup_set(value: ConditionValue) -> ConditionValue {
    match value {
        ConditionValue::Set(values) => {
            let mut unique: Vec<String> = Vec::with_capacity(values.len());
            for v in values {
                if !unique.contains(&v) {
                    unique.push(v);
                }
            }
            ConditionValue::Set(unique)
        }
        other => other,
    }
}
