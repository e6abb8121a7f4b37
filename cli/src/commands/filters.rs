use crate::argparse::{FieldsArgs, FilterArgs, ValuesArgs};
use crate::commands::Session;
use crate::utils::{fields_table, read_filters};
use anyhow::{bail, Result};
use filter_core::ConditionUpdate;

pub async fn handle_fields_command(args: FieldsArgs, session: &Session) -> Result<()> {
    let fields = if args.refresh {
        session.refresh_fields().await
    } else {
        session.load_fields().await
    };
    if fields.is_empty() {
        bail!("No fields available for business {}", session.business());
    }
    print!("{}", fields_table(&fields));
    Ok(())
}

/// Lists values of `--field` as a new row placed after the given filters, so
/// the suggestions cascade on them.
pub async fn handle_values_command(args: ValuesArgs, session: &Session) -> Result<()> {
    session.load_filters(read_filters(args.filters.filters.as_deref())?)?;

    let row = session.add_filter();
    let warm = session.update_filter(row, ConditionUpdate::Field(Some(args.field.clone())))?;
    match (&args.search, warm) {
        (Some(search), _) => {
            session.search_values(row, search).await?;
        }
        (None, Some(request)) => {
            session.warm(request).await;
        }
        (None, None) => {}
    }
    for _ in 1..args.page {
        if !session.load_more(row).await? {
            break;
        }
    }

    let Some(suggestions) = session.suggestions(row) else {
        bail!("No values fetched for {}", args.field);
    };
    if let Some(error) = &suggestions.error {
        eprintln!("No suggestions available: {}", error);
    }
    for value in &suggestions.values {
        println!("{}", value);
    }
    if suggestions.has_more {
        eprintln!(
            "... more values available (next page {}, {} total)",
            suggestions.next_page, suggestions.total_count
        );
    }
    Ok(())
}

pub fn handle_apply_command(args: FilterArgs, session: &Session) -> Result<()> {
    let conditions = read_filters(args.filters.as_deref())?;
    let rows = conditions.len();
    session.load_filters(conditions)?;

    let applied = session.apply();
    let skipped = rows - session.valid_filter_count();
    if skipped > 0 {
        eprintln!("Skipped {} incomplete filter rows", skipped);
    }
    println!("{}", serde_json::to_string_pretty(&applied)?);
    Ok(())
}
