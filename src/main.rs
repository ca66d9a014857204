//! # Main — CLI Entry Point
//!
//! Routes subcommands either to the endpoint server (`serve`, `init`) or to a
//! [`lifeflow::client::DataClient`] talking to a running endpoint (every
//! other subcommand).
//!
//! ## Global Options
//!
//! - `--config` / `LIFEFLOW_CONFIG`: TOML settings file (default `lifeflow.toml`).
//! - `--endpoint` / `LIFEFLOW_ENDPOINT`: base URL of the endpoint, overrides `[client] endpoint`.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "lifeflow", about = "Blood-donation dashboard endpoint and client")]
struct Cli {
    /// Settings file
    #[arg(long, env = "LIFEFLOW_CONFIG", default_value = lifeflow::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Endpoint base URL (e.g. http://127.0.0.1:7070)
    #[arg(long, env = "LIFEFLOW_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the write endpoint and read API
    Serve {
        #[arg(long, env = "LIFEFLOW_PORT")]
        port: Option<u16>,
        /// Workbook file backing the sheets
        #[arg(long, env = "LIFEFLOW_WORKBOOK")]
        workbook: Option<PathBuf>,
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create a blank workbook (and a default settings file if none exists)
    Init {
        #[arg(long, env = "LIFEFLOW_WORKBOOK")]
        workbook: Option<PathBuf>,
    },
    /// Show one page of the donor table
    List {
        /// Free-text search over name, phone and channel
        #[arg(long, default_value = "")]
        search: String,
        /// all, queued, booked, completed or cancelled
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
        /// Sort by name, date or status
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
    },
    /// Show dashboard totals and inventory
    Summary,
    /// Register a donor
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "Website")]
        channel: String,
        #[arg(long, default_value = "Blood")]
        donation_type: String,
        /// Appointment date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "09:00")]
        time: String,
        #[arg(long, default_value = "Queued")]
        status: String,
    },
    /// Change a donor's status
    SetStatus {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        status: String,
    },
    /// Edit a donor's details; omitted fields keep their current values
    Edit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        new_name: Option<String>,
        #[arg(long)]
        new_phone: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        #[arg(long)]
        donation_type: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Remove a donor
    Delete {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    /// Set inventory levels; omitted products keep their current count
    Inventory {
        #[arg(long)]
        blood: Option<u32>,
        #[arg(long)]
        plasma: Option<u32>,
        #[arg(long)]
        platelets: Option<u32>,
    },
    /// Export donors to CSV
    Export {
        /// Only appointments within the last N days, or "all"
        #[arg(long, default_value = "all")]
        days: String,
        /// Output file (default donors_export_YYYY-MM-DD.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    let config = cli::load_config(&cli)?;

    match &cli.command {
        Commands::Serve {
            port,
            workbook,
            bind,
        } => cli::run_serve(config, *port, workbook.clone(), bind.clone()),
        Commands::Init { workbook } => cli::run_init(&cli, config, workbook.clone()),
        _ => cli::run_client_command(&cli, config),
    }
}
