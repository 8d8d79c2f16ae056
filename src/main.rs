//! dbkit - Command-line entry point.
//!
//! Connects to the configured database, reports server diagnostics, and
//! optionally inspects one table. Useful as a smoke check for a connection
//! string and as a minimal example of wiring the library up.

use clap::Parser;
use dbkit::config::{DbConfig, PoolSettings, redact_url};
use dbkit::db::Dao;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "dbkit", version, about = "Pooled relational data access")]
struct Cli {
    /// Database connection string (postgres://... or sqlite://...)
    #[arg(long, env = "DBKIT_DATABASE_URL")]
    database: String,

    /// Table to inspect after connecting
    #[arg(long)]
    table: Option<String>,

    /// Maximum pool connections
    #[arg(long)]
    max_connections: Option<u32>,

    /// Seconds to wait for a pooled connection
    #[arg(long)]
    acquire_timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DBKIT_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = DbConfig::from_url(cli.database.as_str())?.with_pool(PoolSettings {
        max_connections: cli.max_connections,
        acquire_timeout_secs: cli.acquire_timeout_secs,
        ..Default::default()
    });

    info!(url = %redact_url(&cli.database), "Connecting");
    let dao = Dao::connect(config).await?;

    let server = dao.ping().await?;
    println!("backend:  {}", dao.backend());
    println!("version:  {}", server.version);
    println!("time:     {}", server.now);

    if let Some(table) = &cli.table {
        if dao.table_exists(table).await? {
            let columns = dao.describe_table(table).await?;
            println!("table:    {} ({} columns)", table, columns.len());
            println!("{}", serde_json::to_string_pretty(&columns)?);
        } else {
            println!("table:    {} (not found)", table);
        }
    }

    dao.close().await;
    Ok(())
}
