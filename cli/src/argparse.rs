use clap::{Args, Parser, Subcommand};
use filter_core::Aggregation;
use strum::IntoEnumIterator;

#[derive(Parser)]
#[command(
    name = "salesdash",
    about = "Sales dashboard filter and report CLI",
    version,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "salesdash.toml")]
    pub config: String,

    /// Override the business identifier from the config
    #[arg(long, global = true)]
    pub business: Option<String>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the fields available for filtering, with their types
    Fields(FieldsArgs),
    /// Page through the distinct values of a field
    Values(ValuesArgs),
    /// Validate filter rows and print the applied filter set
    Apply(FilterArgs),
    /// Request a sales report or group-by summary
    Report(ReportArgs),
}

#[derive(Args)]
pub struct FieldsArgs {
    /// Bypass the cached field list
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Args)]
pub struct FilterArgs {
    /// Filter rows as a JSON array, or @path to a file holding one
    #[arg(long)]
    pub filters: Option<String>,
}

#[derive(Args)]
pub struct ValuesArgs {
    /// Field to list values for
    #[arg(long)]
    pub field: String,

    /// Only values containing this term
    #[arg(long)]
    pub search: Option<String>,

    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Aggregation mode: daily, weekly, monthly, custom, compare or summary
    #[arg(long, value_parser = parse_aggregation, default_value = "daily")]
    pub aggregation: Aggregation,

    /// Start date, YYYY-MM-DD
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// End date, YYYY-MM-DD
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Comparison period start, YYYY-MM-DD
    #[arg(long, requires = "compare_end")]
    pub compare_start: Option<String>,

    /// Comparison period end, YYYY-MM-DD
    #[arg(long, requires = "compare_start")]
    pub compare_end: Option<String>,

    /// Grouping fields for a summary, comma separated
    #[arg(long, value_delimiter = ',')]
    pub group_by: Vec<String>,

    /// Extra data columns for a summary, comma separated
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Print the request parameters instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_aggregation(s: &str) -> Result<Aggregation, String> {
    s.parse::<Aggregation>().map_err(|_| {
        let known: Vec<String> = Aggregation::iter().map(|a| a.to_string()).collect();
        format!("unknown aggregation '{}', expected one of: {}", s, known.join(", "))
    })
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
