//! # Verification Client Entry Point
//!
//! Runs one liveness verification session against a verifier and renders
//! every state change as a status line.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin verify-client -- --config config/session.toml
//! ```
//!
//! Replaying recorded frames against a remote verifier, with metrics:
//! ```bash
//! cargo run --bin verify-client -- --host verifier.example.com --tls \
//!   --image-dir ./user-data/frames \
//!   --metrics-output ./metrics/session.json
//! ```
//!
//! While running, type a command and press Enter:
//! - `r`: restart verification from step 1
//! - `c`: retry the capture source after a camera error
//! - `q`: quit (Ctrl-C works too)

use anyhow::Context;
use clap::Parser;
use env_logger::Builder;
use log::{info, warn, LevelFilter};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use liveness_client::capture::{CaptureSource, DirectorySource, SyntheticSource};
use liveness_client::client::{spawn_session, SessionHandle, SessionView};
use liveness_client::common::config::{CaptureConfig, SessionConfig, SourceKind};
use liveness_client::common::connection::{endpoint_for_host, WebSocketConnector};

/// Command-line arguments for the verification client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the session configuration file (TOML format)
    ///
    /// Example: config/session.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Verifier WebSocket URL, overrides the configured endpoint
    #[arg(long, conflicts_with = "host")]
    endpoint: Option<String>,

    /// Verifier host (e.g., "localhost:5000"); the endpoint becomes ws://HOST/ws
    #[arg(long)]
    host: Option<String>,

    /// Use wss:// when building the endpoint from --host
    #[arg(long, requires = "host")]
    tls: bool,

    /// Replay still images from this directory instead of the synthetic source
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Path to write metrics JSON output (optional)
    #[arg(long)]
    metrics_output: Option<String>,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Logs are printed with INFO level by default; `RUST_LOG` overrides it.
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn build_config(args: &Args) -> anyhow::Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => SessionConfig::default(),
    };

    if let Some(endpoint) = &args.endpoint {
        config.session.endpoint = endpoint.clone();
    } else if let Some(host) = &args.host {
        config.session.endpoint = endpoint_for_host(host, args.tls);
    }

    if let Some(dir) = &args.image_dir {
        config.capture.source = SourceKind::Directory;
        config.capture.path = Some(dir.clone());
    }

    Ok(config)
}

fn build_source(capture: &CaptureConfig) -> anyhow::Result<Box<dyn CaptureSource>> {
    match capture.source {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(
            capture.width,
            capture.height,
        ))),
        SourceKind::Directory => {
            let path = capture
                .path
                .clone()
                .context("capture.path is required for the directory source")?;
            Ok(Box::new(DirectorySource::new(
                path,
                capture.width,
                capture.height,
            )))
        }
    }
}

/// Forward stdin commands to the session from a plain thread, so a pending
/// read never holds up runtime shutdown.
fn spawn_stdin_commands(handle: SessionHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let delivered = match line.trim() {
                "r" => handle.restart(),
                "c" => handle.retry_capture(),
                "q" => {
                    handle.shutdown();
                    break;
                }
                "" => true,
                other => {
                    warn!("Unknown command '{}' (use r, c or q)", other);
                    true
                }
            };
            if !delivered {
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();
    let config = build_config(&args)?;
    let source = build_source(&config.capture)?;

    info!("Verifier endpoint: {}", config.session.endpoint);
    let connector = WebSocketConnector::new(config.session.connect_timeout());
    let (mut handle, task) = spawn_session(config, Box::new(connector), source);
    spawn_stdin_commands(handle.clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_line = String::new();
    loop {
        tokio::select! {
            changed = handle.changed() => {
                let Some(state) = changed else { break };
                let line = SessionView::from_state(&state).status_line();
                if line != last_line {
                    println!("{}", line);
                    last_line = line;
                }
            }
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, shutting down");
                handle.shutdown();
                break;
            }
        }
    }

    let metrics = task.await.context("session task failed")?;
    let stats = metrics.stats();
    info!(
        "📊 Frames sent: {}, skipped: {}, reconnects: {}, completions: {}",
        stats.frames_sent, stats.frames_skipped, stats.reconnect_attempts, stats.completions
    );

    if let Some(output_path) = args.metrics_output {
        metrics.export_to_json(&output_path)?;
        println!("Metrics exported to: {}", output_path);
    }

    Ok(())
}
