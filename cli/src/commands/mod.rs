mod filters;
mod report;

use crate::argparse::{Cli, Commands};
use anyhow::Result;
pub use filters::{handle_apply_command, handle_fields_command, handle_values_command};
pub use report::handle_report_command;
use report_client::{Config, FilterSession, HttpClient};
use std::path::Path;
use std::sync::Arc;

pub type Session = FilterSession<HttpClient>;

pub async fn handle_command(cli: Cli) -> Result<()> {
    let mut config = load_config(Path::new(&cli.config))?;
    if let Some(business) = cli.business {
        config.api.business = business;
    }
    tracing::debug!(
        "Using endpoint {} for business {}",
        config.api.endpoint,
        config.api.business
    );

    let client = Arc::new(HttpClient::new(&config.api)?);
    let session = FilterSession::from_config(client, &config);

    match cli.command {
        Commands::Fields(args) => handle_fields_command(args, &session).await,
        Commands::Values(args) => handle_values_command(args, &session).await,
        Commands::Apply(args) => handle_apply_command(args, &session),
        Commands::Report(args) => handle_report_command(args, &session).await,
    }
}

/// The config file is optional; without one everything comes from the environment.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        tracing::debug!("No config file at {}, using environment", path.display());
        Config::from_env()
    }
}
