use crate::operators::{Operator, ValueShape};

/// Misuse of the filter store or the report builder.
///
/// These are programming errors: the UI only offers legal choices, so reaching
/// one of them means a caller bypassed the store's own mutation methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    InvalidIndex { index: usize, len: usize },
    IllegalOperator { field: String, operator: Operator },
    MissingField(usize),
    ShapeMismatch { expected: ValueShape, found: ValueShape },
    InvalidDateRange(String),
    MissingParameter(&'static str),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::InvalidIndex { index, len } => {
                write!(f, "Invalid filter index {} (store holds {})", index, len)
            }
            FilterError::IllegalOperator { field, operator } => {
                write!(f, "Operator {} is not allowed for field {}", operator, field)
            }
            FilterError::MissingField(index) => {
                write!(f, "Filter {} has no field selected", index)
            }
            FilterError::ShapeMismatch { expected, found } => {
                write!(f, "Value shape mismatch: expected {}, got {}", expected, found)
            }
            FilterError::InvalidDateRange(msg) => write!(f, "Invalid date range: {}", msg),
            FilterError::MissingParameter(name) => write!(f, "Missing parameter: {}", name),
        }
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for String {
    fn from(error: FilterError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FilterError::InvalidIndex { index: 4, len: 2 };
        assert_eq!(err.to_string(), "Invalid filter index 4 (store holds 2)");

        let err = FilterError::IllegalOperator {
            field: "Category".to_string(),
            operator: Operator::Between,
        };
        assert_eq!(
            err.to_string(),
            "Operator BETWEEN is not allowed for field Category"
        );

        let err = FilterError::ShapeMismatch {
            expected: ValueShape::Range,
            found: ValueShape::Scalar,
        };
        assert_eq!(
            err.to_string(),
            "Value shape mismatch: expected range, got scalar"
        );

        let msg: String = FilterError::MissingParameter("business").into();
        assert_eq!(msg, "Missing parameter: business");
    }
}
