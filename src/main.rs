//! # Main — CLI Entry Point
//!
//! Routes subcommands to the settlement core. `serve` runs the HTTP API;
//! the one-shot subcommands (`check-guarantees`, `select-winners`,
//! `process-payouts`) exist for cron-style scheduling and admin scripts and
//! print their JSON report to stdout.
//!
//! ## Global Options
//!
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection string.
//! - `--json-logs`: emit logs as JSON lines instead of human-readable text.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use validated::payout::HttpTransferProvider;
use validated::{api, db, guarantee, selection};

#[derive(Parser)]
#[command(
    name = "validated",
    about = "Validated by Users — settlement backend for prize-backed feedback rounds"
)]
struct Cli {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Emit logs as JSON lines (for log aggregation)
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 7100)]
        port: u16,
        /// Payment provider transfer endpoint
        #[arg(long, env = "TRANSFER_ENDPOINT")]
        transfer_endpoint: String,
        /// Per-transfer timeout in seconds
        #[arg(long, default_value_t = 30)]
        transfer_timeout_secs: u64,
    },
    /// Run one guarantee sweep over rounds nearing their deadline
    CheckGuarantees,
    /// Select winners for an expired round
    SelectWinners {
        #[arg(long)]
        round_id: i64,
    },
    /// Settle pending payouts for a round
    ProcessPayouts {
        #[arg(long)]
        round_id: i64,
        /// Payment provider transfer endpoint
        #[arg(long, env = "TRANSFER_ENDPOINT")]
        transfer_endpoint: String,
        /// Per-transfer timeout in seconds
        #[arg(long, default_value_t = 30)]
        transfer_timeout_secs: u64,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let db = db::Database::connect(&cli.database_url).await?;

    match cli.command {
        Commands::Serve {
            port,
            transfer_endpoint,
            transfer_timeout_secs,
        } => {
            let timeout = Duration::from_secs(transfer_timeout_secs);
            let provider = Arc::new(HttpTransferProvider::new(&transfer_endpoint, timeout)?);
            let state = api::AppState::new(db, provider, timeout);
            let router = api::build_router(state);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            info!(port, "settlement API listening");
            axum::serve(listener, router).await?;
        }
        Commands::CheckGuarantees => {
            let report = guarantee::run_sweep(&db).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::SelectWinners { round_id } => {
            let winners = selection::select_winners(&db, round_id).await?;
            println!("{}", serde_json::to_string_pretty(&winners)?);
        }
        Commands::ProcessPayouts {
            round_id,
            transfer_endpoint,
            transfer_timeout_secs,
        } => {
            let timeout = Duration::from_secs(transfer_timeout_secs);
            let provider = HttpTransferProvider::new(&transfer_endpoint, timeout)?;
            let report =
                validated::payout::settle_round(&db, &provider, timeout, round_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
