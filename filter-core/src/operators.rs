//! Operator policy: which operators a field type admits and which value shape
//! each operator needs.

use crate::fields::FieldType;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "BETWEEN", alias = "Between")]
    Between,
    #[serde(rename = "GTE", alias = "Greater_Than_Or_Equal")]
    Gte,
    #[serde(rename = "LTE", alias = "Less_Than_Or_Equal")]
    Lte,
    #[serde(rename = "IN", alias = "In")]
    In,
    #[serde(rename = "NOT_IN", alias = "Not_In")]
    NotIn,
}

/// How a condition's value is held for a given operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    Scalar,
    Range,
    Set,
}

const RANGE_OPERATORS: &[Operator] = &[Operator::Between, Operator::Gte, Operator::Lte];
const SET_OPERATORS: &[Operator] = &[Operator::In, Operator::NotIn];

/// Operators offered for a field type, in menu order.
pub fn legal_operators(field_type: FieldType) -> &'static [Operator] {
    match field_type {
        FieldType::Text => SET_OPERATORS,
        FieldType::Date | FieldType::Number => RANGE_OPERATORS,
    }
}

pub fn value_shape_for(operator: Operator) -> ValueShape {
    match operator {
        Operator::Between => ValueShape::Range,
        Operator::Gte | Operator::Lte => ValueShape::Scalar,
        Operator::In | Operator::NotIn => ValueShape::Set,
    }
}

/// Operator whose shape seeds a condition right after its field is chosen.
pub fn default_operator(field_type: FieldType) -> Operator {
    match field_type {
        FieldType::Text => Operator::In,
        FieldType::Date | FieldType::Number => Operator::Gte,
    }
}

pub fn is_legal(field_type: FieldType, operator: Operator) -> bool {
    legal_operators(field_type).contains(&operator)
}

impl Operator {
    pub fn label(&self) -> &'static str {
        match self {
            Operator::Between => "Between",
            Operator::Gte => "Greater Than or Equal",
            Operator::Lte => "Less Than or Equal",
            Operator::In => "In",
            Operator::NotIn => "Not In",
        }
    }

    pub fn shape(&self) -> ValueShape {
        value_shape_for(*self)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Between => write!(f, "BETWEEN"),
            Operator::Gte => write!(f, "GTE"),
            Operator::Lte => write!(f, "LTE"),
            Operator::In => write!(f, "IN"),
            Operator::NotIn => write!(f, "NOT_IN"),
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BETWEEN" => Ok(Operator::Between),
            "GTE" | "GREATER_THAN_OR_EQUAL" => Ok(Operator::Gte),
            "LTE" | "LESS_THAN_OR_EQUAL" => Ok(Operator::Lte),
            "IN" => Ok(Operator::In),
            "NOT_IN" => Ok(Operator::NotIn),
            _ => Err(format!("Unknown operator: {}", s)),
        }
    }
}

impl std::fmt::Display for ValueShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueShape::Scalar => write!(f, "scalar"),
            ValueShape::Range => write!(f, "range"),
            ValueShape::Set => write!(f, "set"),
        }
    }
}
