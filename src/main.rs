//! dwdm-monitor - DWDM optical transport monitoring
//!
//! Evaluates NMS performance exports against reference thresholds,
//! reconciles optical power swings with alarms, classifies WASON restoration
//! calls and computes attenuation margins.
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP API
//! dwdm-monitor serve --addr 0.0.0.0:8080
//!
//! # One-shot evaluation of an export
//! dwdm-monitor check fan --input fan.csv --reference-dir data/reference
//! dwdm-monitor check osc --input osc.csv --alarms fm.csv --format csv
//! dwdm-monitor check wason --input wason.log --format text
//! ```
//!
//! # Environment Variables
//!
//! - `DWDM_CONFIG`: Path to the TOML configuration
//! - `DWDM_SERVER_ADDR`: Server bind address
//! - `DWDM_CORS_ORIGINS`: Comma-separated origins allowed cross-origin
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dwdm_monitor::analysis::export_csv;
use dwdm_monitor::api::{create_app, DashboardState};
use dwdm_monitor::config::{self, validation::validate_document, MonitorConfig};
use dwdm_monitor::ingest::write_csv;
use dwdm_monitor::reference::DirectoryReferenceStore;
use dwdm_monitor::session::{SessionContext, UploadSlot};
use dwdm_monitor::views::{run_view, View, ViewReport};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "dwdm-monitor")]
#[command(about = "DWDM optical transport monitoring")]
#[command(version)]
struct CliArgs {
    /// Configuration file (overrides DWDM_CONFIG and ./dwdm_config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Serve the HTTP API
    Serve {
        /// Override the server address (default: "0.0.0.0:8080")
        #[arg(short, long, env = "DWDM_SERVER_ADDR")]
        addr: Option<String>,

        /// Directory holding CPU.csv, FAN.csv, ... reference tables
        #[arg(long)]
        reference_dir: Option<PathBuf>,
    },

    /// Evaluate one view over files on disk and print the report
    Check {
        /// cpu, fan, msu, line, client, osc, loss-eol, loss-core or wason
        view: View,

        /// Primary input: measurement export, OSC export, EOL raw export or WASON log
        #[arg(long)]
        input: PathBuf,

        /// FM alarm export (osc only)
        #[arg(long)]
        alarms: Option<PathBuf>,

        /// Reference table: family threshold table or EOL reference
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Directory of family reference tables when --reference is absent
        #[arg(long)]
        reference_dir: Option<PathBuf>,

        /// Restrict attenuation views to links naming this managed element
        #[arg(long)]
        me: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Validate a configuration file without starting anything
    ValidateConfig {
        /// TOML file to check
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Text,
}

// ============================================================================
// Serve
// ============================================================================

async fn serve(config: MonitorConfig, addr: Option<String>, reference_dir: Option<PathBuf>) -> Result<()> {
    let server_addr = addr.unwrap_or_else(|| config.server.addr.clone());
    let reference_dir = reference_dir.unwrap_or_else(|| config.reference.dir.clone());
    let store = DirectoryReferenceStore::new(&reference_dir);
    if !store.dir().is_dir() {
        warn!(dir = %store.dir().display(), "Reference directory does not exist; family views will fail until it does");
    }

    let state = DashboardState::new(Arc::new(store), config);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {server_addr}"))?;
    info!(addr = %server_addr, reference_dir = %reference_dir.display(), "HTTP server listening");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

// ============================================================================
// Check
// ============================================================================

/// Slot receiving `--reference` for `view`, if it takes one.
fn reference_slot(view: View) -> Option<UploadSlot> {
    match view {
        View::LossEol | View::LossCore => Some(UploadSlot::EolReference),
        other => other.family().map(UploadSlot::Reference),
    }
}

fn load_into(session: &mut SessionContext, slot: UploadSlot, path: &Path) -> Result<()> {
    let body = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let summary = session
        .store_upload(slot, &body)
        .with_context(|| format!("Failed to load {} as {slot}", path.display()))?;
    info!(slot = %slot, rows = summary.rows, path = %path.display(), "Input loaded");
    Ok(())
}

struct CheckArgs {
    view: View,
    input: PathBuf,
    alarms: Option<PathBuf>,
    reference: Option<PathBuf>,
    reference_dir: Option<PathBuf>,
    me: Option<String>,
    format: OutputFormat,
}

fn check(config: &MonitorConfig, args: CheckArgs) -> Result<()> {
    let view = args.view;
    let mut session = SessionContext::new();

    let Some(&primary) = view.required_uploads().first() else {
        bail!("the {view} view takes no inputs");
    };
    load_into(&mut session, primary, &args.input)?;

    if let Some(alarms) = &args.alarms {
        if view != View::Osc {
            bail!("--alarms only applies to the osc view");
        }
        load_into(&mut session, UploadSlot::FmAlarms, alarms)?;
    }
    if let Some(reference) = &args.reference {
        let Some(slot) = reference_slot(view) else {
            bail!("--reference does not apply to the {view} view");
        };
        load_into(&mut session, slot, reference)?;
    }

    let dir = args.reference_dir.unwrap_or_else(|| config.reference.dir.clone());
    let store = DirectoryReferenceStore::new(dir);
    let mut report = run_view(view, &session, &store, config)?;
    if let Some(me) = &args.me {
        report = report.for_managed_element(me);
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Csv => match &report {
            ViewReport::Wason(wason) => print!("{}", export_csv(wason)),
            other => print!("{}", write_csv(&other.to_table())),
        },
        OutputFormat::Text => print_text(view, &report),
    }
    Ok(())
}

fn print_text(view: View, report: &ViewReport) {
    let table = report.to_table();
    let failing = table
        .iter_rows()
        .filter(|row| row.text("Status") != "ok")
        .count();
    println!("view:    {view}");
    println!("summary: {}", report.summary());
    println!("rows:    {} ({failing} not ok)", table.len());
    if let ViewReport::Family(family) = report {
        if let Some(message) = &family.message {
            println!("note:    {message}");
        }
    }
    println!();
    print!("{}", write_csv(&table));
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    if let SubCommand::ValidateConfig { path } = &args.command {
        let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let report = validate_document(&raw);
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.valid {
            bail!("{} is invalid ({} errors)", path.display(), report.errors.len());
        }
        return Ok(());
    }

    let monitor_config = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)?,
        None => MonitorConfig::load(),
    };
    info!(
        site = %monitor_config.site.name,
        fan_caps = monitor_config.thresholds.fan.caps.len(),
        swing_db = monitor_config.thresholds.flapping.swing_db,
        "Configuration loaded"
    );
    config::init(monitor_config);
    let monitor_config = config::get();

    match args.command {
        SubCommand::Serve { addr, reference_dir } => serve(monitor_config.clone(), addr, reference_dir).await,
        SubCommand::Check {
            view,
            input,
            alarms,
            reference,
            reference_dir,
            me,
            format,
        } => check(
            monitor_config,
            CheckArgs {
                view,
                input,
                alarms,
                reference,
                reference_dir,
                me,
                format,
            },
        ),
        SubCommand::ValidateConfig { .. } => Ok(()),
    }
}
