use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FieldType {
    #[default]
    Text,
    Date,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Built-in typed fields of the sales dataset. Anything else is text.
fn default_field_types() -> HashMap<String, FieldType> {
    let mut map = HashMap::new();
    // Dates
    map.insert("__Launch_Date".to_string(), FieldType::Date);
    map.insert("__Restock_Date".to_string(), FieldType::Date);
    map.insert("__Offer_Date".to_string(), FieldType::Date);

    // Numbers
    map.insert("Current_Stock".to_string(), FieldType::Number);
    map.insert("Sale_Price".to_string(), FieldType::Number);
    map.insert("Sale_Discount".to_string(), FieldType::Number);
    map
}

/// Explicit field name to type mapping. Types never come from the data.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRegistry {
    types: HashMap<String, FieldType>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self {
            types: default_field_types(),
        }
    }
}

impl FieldRegistry {
    /// Registry holding only the given entries, without the built-in ones.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Built-in registry with `overrides` added on top.
    pub fn with_overrides<I, S>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for (name, field_type) in overrides {
            registry.types.insert(name.into(), field_type);
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, field_type: FieldType) {
        self.types.insert(name.into(), field_type);
    }

    pub fn field_type(&self, name: &str) -> FieldType {
        self.types.get(name).copied().unwrap_or_default()
    }

    pub fn describe(&self, name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, self.field_type(name))
    }

    pub fn describe_all<S: AsRef<str>>(&self, names: &[S]) -> Vec<FieldDescriptor> {
        names.iter().map(|n| self.describe(n.as_ref())).collect()
    }
}
