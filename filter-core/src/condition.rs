use crate::operators::{Operator, ValueShape};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Value held by a filter row. The variant always matches the operator's shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionValue {
    Scalar(String),
    /// Lower and upper bound. Either side may be empty while editing.
    Range(String, String),
    Set(Vec<String>),
}

impl ConditionValue {
    pub fn empty(shape: ValueShape) -> Self {
        match shape {
            ValueShape::Scalar => ConditionValue::Scalar(String::new()),
            ValueShape::Range => ConditionValue::Range(String::new(), String::new()),
            ValueShape::Set => ConditionValue::Set(Vec::new()),
        }
    }

    pub fn shape(&self) -> ValueShape {
        match self {
            ConditionValue::Scalar(_) => ValueShape::Scalar,
            ConditionValue::Range(_, _) => ValueShape::Range,
            ConditionValue::Set(_) => ValueShape::Set,
        }
    }

    /// Whether the value is complete enough to be sent as a filter.
    /// A one-sided range is incomplete, never an open range.
    pub fn is_filled(&self) -> bool {
        match self {
            ConditionValue::Scalar(s) => !s.is_empty(),
            ConditionValue::Range(low, high) => !low.is_empty() && !high.is_empty(),
            ConditionValue::Set(values) => !values.is_empty(),
        }
    }

    fn from_json(value: &JsonValue, shape: Option<ValueShape>) -> Result<Self, String> {
        match (shape, value) {
            (None, JsonValue::Null) => Ok(ConditionValue::Set(Vec::new())),
            (None, JsonValue::Array(items)) | (Some(ValueShape::Set), JsonValue::Array(items)) => {
                Ok(ConditionValue::Set(json_strings(items)?))
            }
            (Some(ValueShape::Set), JsonValue::Null) => Ok(ConditionValue::Set(Vec::new())),
            (Some(ValueShape::Range), JsonValue::Array(items)) => {
                let mut bounds = json_strings(items)?;
                if bounds.len() != 2 {
                    return Err(format!(
                        "Range value needs exactly 2 bounds, got {}",
                        bounds.len()
                    ));
                }
                let high = bounds.pop().unwrap_or_default();
                let low = bounds.pop().unwrap_or_default();
                Ok(ConditionValue::Range(low, high))
            }
            (Some(ValueShape::Range), JsonValue::Null) => {
                Ok(ConditionValue::empty(ValueShape::Range))
            }
            (Some(ValueShape::Scalar), JsonValue::Null) => {
                Ok(ConditionValue::empty(ValueShape::Scalar))
            }
            (None | Some(ValueShape::Scalar), other) => json_string(other)
                .map(ConditionValue::Scalar)
                .ok_or_else(|| format!("Expected a scalar value, got {}", other)),
            (Some(shape), other) => Err(format!("Expected a {} value, got {}", shape, other)),
        }
    }
}

fn json_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_strings(items: &[JsonValue]) -> Result<Vec<String>, String> {
    items
        .iter()
        .map(|item| json_string(item).ok_or_else(|| format!("Unsupported list item: {}", item)))
        .collect()
}

impl Serialize for ConditionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConditionValue::Scalar(s) => serializer.serialize_str(s),
            ConditionValue::Range(low, high) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(low)?;
                seq.serialize_element(high)?;
                seq.end()
            }
            ConditionValue::Set(values) => values.serialize(serializer),
        }
    }
}

/// One row of the filter builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition")]
pub struct FilterCondition {
    pub field: Option<String>,
    pub operator: Option<Operator>,
    pub value: ConditionValue,
}

#[derive(Deserialize)]
struct RawCondition {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    operator: Option<Operator>,
    #[serde(default)]
    value: JsonValue,
}

impl TryFrom<RawCondition> for FilterCondition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        let value = ConditionValue::from_json(&raw.value, raw.operator.map(|op| op.shape()))?;
        Ok(Self {
            field: raw.field.filter(|f| !f.is_empty()),
            operator: raw.operator,
            value,
        })
    }
}

impl Default for FilterCondition {
    fn default() -> Self {
        Self::empty()
    }
}

impl FilterCondition {
    /// A fresh row: no field, no operator, empty set.
    pub fn empty() -> Self {
        Self {
            field: None,
            operator: None,
            value: ConditionValue::Set(Vec::new()),
        }
    }

    pub fn new(field: impl Into<String>, operator: Operator, value: ConditionValue) -> Self {
        Self {
            field: Some(field.into()),
            operator: Some(operator),
            value,
        }
    }

    /// Field and operator set, value filled and shaped as the operator requires.
    pub fn is_valid(&self) -> bool {
        self.field.is_some() && has_valid_filter_value(self)
    }

    /// The row as sent upstream in cascading requests, if it is valid.
    pub fn to_upstream(&self) -> Option<UpstreamFilter> {
        if !self.is_valid() {
            return None;
        }
        Some(UpstreamFilter {
            field_name: self.field.clone()?,
            operator: self.operator?,
            value: self.value.clone(),
        })
    }
}

/// Checks the value against the operator's shape and fill rules.
/// A stored value whose shape disagrees with the operator is never valid.
pub fn has_valid_filter_value(condition: &FilterCondition) -> bool {
    match condition.operator {
        Some(operator) => {
            condition.value.shape() == operator.shape() && condition.value.is_filled()
        }
        None => false,
    }
}

/// A valid earlier condition as carried in a cascading field-values request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UpstreamFilter {
    pub field_name: String,
    pub operator: Operator,
    pub value: ConditionValue,
}
