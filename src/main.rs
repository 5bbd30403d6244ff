//! HTTP Stub Server
//!
//! Answers requests with canned responses configured in a JSON document.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────┐
//!                          │                   STUB SERVER                    │
//!                          │                                                  │
//!     Client Request       │  ┌─────────┐    ┌─────────┐    ┌────────────┐    │
//!     ─────────────────────┼─▶│   net   │───▶│  http   │───▶│  routing   │    │
//!                          │  │listener │    │ server  │    │  matcher   │    │
//!                          │  └─────────┘    └─────────┘    └─────┬──────┘    │
//!                          │                                      │           │
//!                          │                                      ▼           │
//!     Client Response      │  ┌─────────┐    ┌──────────────┐ ┌──────────┐    │
//!     ◀────────────────────┼──│response │◀───│  dispatcher  │◀│RuleStore │◀───┼── config watcher
//!     (or closed socket)   │  └─────────┘    │persist/delay │ │ snapshot │    │   + reloader
//!                          │                 └──────────────┘ └──────────┘    │
//!                          └──────────────────────────────────────────────────┘
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use stub_server::config::load_config;
use stub_server::lifecycle;
use stub_server::observability::logging::{self, LogFormat};
use stub_server::ServerSettings;

#[derive(Parser, Debug)]
#[command(name = "stub-server")]
#[command(about = "HTTP stub server driven by a hot-reloaded JSON configuration", long_about = None)]
struct Args {
    /// Path of the JSON configuration document
    #[arg(short, long, default_value = "settings.json")]
    config: PathBuf,

    /// Interface to bind; the port comes from the configuration
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Maximum concurrent connections
    #[arg(long, default_value_t = 10_000)]
    max_connections: usize,

    /// Largest request body accepted for persistence
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    max_body_bytes: usize,

    /// Seconds to let in-flight requests finish on shutdown
    #[arg(long, default_value_t = 10)]
    shutdown_grace_secs: u64,

    /// Seed for choosing among duplicate rules
    #[arg(long)]
    seed: Option<u64>,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Log filter used when RUST_LOG is unset
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Log output format (pretty or json)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// Load the configuration, print a summary and exit
    #[arg(long)]
    validate: bool,
}

impl From<&Args> for ServerSettings {
    fn from(args: &Args) -> Self {
        Self {
            config_path: args.config.clone(),
            bind_ip: args.bind,
            max_connections: args.max_connections,
            max_body_bytes: args.max_body_bytes,
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
            seed: args.seed,
            metrics_address: args.metrics_address,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_format)?;

    if args.validate {
        return Ok(validate(&args.config));
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stub-server starting");
    lifecycle::run(ServerSettings::from(&args)).await?;
    Ok(ExitCode::SUCCESS)
}

fn validate(path: &std::path::Path) -> ExitCode {
    match load_config(path) {
        Ok(loaded) => {
            println!("{}: OK", path.display());
            println!("  port: {}", loaded.port);
            println!("  active rules: {}", loaded.table.len());
            for rule in loaded.table.iter() {
                let action = if rule.drops_connection() {
                    "drop".to_string()
                } else {
                    rule.response_code.to_string()
                };
                println!(
                    "  {} {} -> {} (delay {} ms)",
                    rule.method,
                    rule.path,
                    action,
                    rule.delay.as_millis()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}
