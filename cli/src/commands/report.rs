use crate::argparse::ReportArgs;
use crate::commands::Session;
use crate::utils::{read_filters, rows_table};
use anyhow::{Context, Result};
use filter_core::DateRange;

pub async fn handle_report_command(args: ReportArgs, session: &Session) -> Result<()> {
    session.load_filters(read_filters(args.filters.filters.as_deref())?)?;
    session.apply();

    let mut query = session
        .report_query(args.aggregation)
        .group_by(args.group_by)
        .columns(args.columns);
    if let (Some(start), Some(end)) = (&args.start, &args.end) {
        query = query.date_range(DateRange::parse(start, end)?);
    }
    if let (Some(start), Some(end)) = (&args.compare_start, &args.compare_end) {
        query = query.compare_with(DateRange::parse(start, end)?);
    }
    let payload = query.build()?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let report = session
        .fetch_report(&payload)
        .await
        .context("Report fetch failed, try again")?;

    let rows = report.rows();
    match rows_table(&rows) {
        Some(table) => print!("{}", table),
        None => println!("No rows returned"),
    }
    if let Some(summary) = report.summary() {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}
