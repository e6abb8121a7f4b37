use anyhow::{Context, Result};
use filter_core::{FieldDescriptor, FilterCondition};
use serde_json::Value;
use tabular::{Row, Table};
use tracing_subscriber::EnvFilter;

pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Reads filter rows from inline JSON or, with a leading `@`, from a file.
pub fn read_filters(arg: Option<&str>) -> Result<Vec<FilterCondition>> {
    let Some(arg) = arg else {
        return Ok(Vec::new());
    };
    let content = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filters file: {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&content).context("Filters must be a JSON array of filter rows")
}

pub fn fields_table(fields: &[FieldDescriptor]) -> Table {
    #[allow(clippy::literal_string_with_formatting_args)]
    let mut table =
        Table::new("{:<}  {:<}").with_row(Row::from_cells(["Field", "Type"].iter().cloned()));
    for field in fields {
        table.add_row(
            Row::new()
                .with_cell(&field.name)
                .with_cell(field.field_type),
        );
    }
    table
}

/// Renders report rows using the keys of the first row as columns.
pub fn rows_table(rows: &[Value]) -> Option<Table> {
    let columns: Vec<String> = rows.first()?.as_object()?.keys().cloned().collect();
    if columns.is_empty() {
        return None;
    }
    let row_format = vec!["{:<}"; columns.len()].join("  ");
    let mut table = Table::new(&row_format).with_row(Row::from_cells(columns.iter().cloned()));
    for row in rows {
        let table_row = columns
            .iter()
            .fold(Row::new(), |acc, column| acc.with_cell(cell_text(row.get(column))));
        table.add_row(table_row);
    }
    Some(table)
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_core::{ConditionValue, FieldType, Operator};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_inline_filters() {
        let filters = read_filters(Some(
            r#"[{"field":"Category","operator":"IN","value":["Shoes"]}]"#,
        ))
        .unwrap();
        assert_eq!(
            filters,
            vec![FilterCondition::new(
                "Category",
                Operator::In,
                ConditionValue::Set(vec!["Shoes".into()])
            )]
        );
    }

    #[test]
    fn test_read_filters_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("filters.json");
        fs::write(
            &path,
            r#"[{"field":"Sale_Price","operator":"Greater_Than_Or_Equal","value":"100"}]"#,
        )
        .unwrap();

        let arg = format!("@{}", path.display());
        let filters = read_filters(Some(&arg)).unwrap();
        assert_eq!(filters[0].operator, Some(Operator::Gte));
        assert_eq!(filters[0].value, ConditionValue::Scalar("100".into()));
    }

    #[test]
    fn test_missing_filters_is_empty() {
        assert!(read_filters(None).unwrap().is_empty());
        assert!(read_filters(Some("{not json")).is_err());
    }

    #[test]
    fn test_fields_table() {
        let table = fields_table(&[FieldDescriptor::new("Sale_Price", FieldType::Number)]);
        let rendered = table.to_string();
        assert!(rendered.contains("Sale_Price"));
        assert!(rendered.contains("number"));
    }

    #[test]
    fn test_rows_table_uses_first_row_keys() {
        let rows = vec![
            json!({"Category": "Shoes", "Units_Sold": 4}),
            json!({"Category": "Bags", "Units_Sold": null}),
        ];
        let rendered = rows_table(&rows).unwrap().to_string();
        assert!(rendered.contains("Units_Sold"));
        assert!(rendered.contains("Bags"));
        assert!(rows_table(&[]).is_none());
    }
}
