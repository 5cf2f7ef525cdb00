//! monitor-bulk-edit CLI
//!
//! Command-line interface for listing and bulk editing monitors.

use std::path::PathBuf;

use clap::Parser;
use monitor_bulk_edit::credentials::CredentialRequest;
use monitor_bulk_edit::monitor::MonitorType;
use monitor_bulk_edit::repository::MonitorFilter;
use monitor_bulk_edit::template::UpdateKind;
use monitor_bulk_edit::{load_config, run, Config, RunOptions};
use tracing::Level;

#[derive(Parser)]
#[command(name = "monitor-bulk-edit")]
#[command(about = "Bulk edit data-observability monitors")]
#[command(version)]
struct Args {
    /// Credentials profile to use (defaults to the `default` profile)
    #[arg(long)]
    profile: Option<String>,

    /// API key id (requires --mcd-token)
    #[arg(long)]
    mcd_id: Option<String>,

    /// API key token (requires --mcd-id)
    #[arg(long)]
    mcd_token: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of monitors to list
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    limit: u32,

    /// Only list monitors of this type
    #[arg(long = "type")]
    monitor_type: Option<MonitorType>,

    /// Comma separated monitor UUIDs to update (skips listing and selection)
    #[arg(long, value_delimiter = ',')]
    uuids: Option<Vec<String>>,

    /// Which template fields to apply
    #[arg(long, value_enum, default_value_t = UpdateKind::Interactive)]
    update_type: UpdateKind,

    /// JSON file with the update template
    #[arg(long)]
    template_file: Option<PathBuf>,

    /// Retrieve the GraphQL schema instead of updating monitors
    #[arg(long)]
    get_schema: bool,

    /// Directory to save the schema files into (with --get-schema)
    #[arg(long)]
    schema_out: Option<PathBuf>,

    /// Monitors updated at once (overrides config file)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, type={:?}, uuids={:?}, update_type={}, log_level={:?}",
        args.config,
        args.monitor_type,
        args.uuids,
        args.update_type,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(concurrency) = args.concurrency {
        config.bulk.concurrency = concurrency;
    }
    config.validate()?;

    let uuids = args.uuids.map(|uuids| {
        uuids
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect::<Vec<_>>()
    });

    let options = RunOptions {
        credentials: CredentialRequest {
            mcd_id: args.mcd_id,
            mcd_token: args.mcd_token,
            profile: args.profile,
        },
        filter: MonitorFilter {
            monitor_type: args.monitor_type,
            limit: Some(args.limit as usize),
            uuids,
        },
        update_kind: args.update_type,
        template_file: args.template_file,
        get_schema: args.get_schema,
        schema_out: args.schema_out,
    };

    run(config, options).await?;

    Ok(())
}
