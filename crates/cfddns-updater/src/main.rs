// # cfddns-updater
//
// Keeps Cloudflare A/AAAA records pointed at this machine's public IP.
//
// This binary is a thin integration layer: it parses the command line,
// loads the configuration, sets up logging and the runtime, and hands
// control to `cfddns_core::Scheduler`. All reconciliation logic lives in
// the library crates.
//
// ## Usage
//
// ```bash
// cfddns-updater                      # ~/.cloudflare-ddns-config or /etc/cloudflare-ddns-config
// cfddns-updater /path/to/config.yml
// cfddns-updater -vv /path/to/config.yml
// ```
//
// `-v` enables info logging, `-vv` debug logging. `RUST_LOG` may refine
// the filter further.

use anyhow::Context;
use cfddns_core::config::{self, DdnsConfig};
use cfddns_core::{Error, Scheduler};
use cfddns_ip_http::HttpIpDiscovery;
use cfddns_provider_cloudflare::CloudflareFactory;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit codes for different termination scenarios
///
/// Shells see the configuration codes as -1 and -2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdaterExitCode {
    /// Clean shutdown on signal
    CleanShutdown = 0,
    /// No usable public IP source
    NoIpSource = 1,
    /// Runtime error (no targets, runtime failure, other)
    RuntimeError = 2,
    /// Configuration failed validation
    ConfigInvalid = 254,
    /// Configuration file not found
    ConfigNotFound = 255,
}

impl From<UpdaterExitCode> for ExitCode {
    fn from(code: UpdaterExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&Error> for UpdaterExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::ConfigNotFound(_) => UpdaterExitCode::ConfigNotFound,
            e if e.is_config() => UpdaterExitCode::ConfigInvalid,
            Error::DiscoveryExhausted { .. } => UpdaterExitCode::NoIpSource,
            _ => UpdaterExitCode::RuntimeError,
        }
    }
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Cloudflare dynamic DNS updater", long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(value_name = "CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Default filter directives for a verbosity count
fn log_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    format!("{level},hyper=warn,hyper_util=warn,reqwest=warn")
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directives(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")
}

fn load_config(explicit: Option<PathBuf>) -> cfddns_core::Result<DdnsConfig> {
    let path = config::locate_config(explicit.as_deref())?;
    info!("Using configuration file {}", path.display());
    config::load(&path)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("{:#}", e);
        return UpdaterExitCode::RuntimeError.into();
    }

    let config = match load_config(args.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return UpdaterExitCode::from(&e).into();
        }
    };

    info!("Configuration loaded: {} domain(s)", config.domains.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("{:#}", e);
            return UpdaterExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_updater(config).await {
            Ok(()) => UpdaterExitCode::CleanShutdown,
            Err(e) => {
                error!("{}", e);
                UpdaterExitCode::from(&e)
            }
        }
    });

    result.into()
}

/// Connect every configured domain and run until a shutdown signal
async fn run_updater(config: DdnsConfig) -> cfddns_core::Result<()> {
    let discovery = match &config.ip_sources {
        Some(sources) => HttpIpDiscovery::new(sources.clone()),
        None => HttpIpDiscovery::with_defaults(),
    }
    .for_record_type(config.record_type);
    info!(
        "Public IP sources for {} records: {}",
        config.record_type,
        discovery.sources().join(", ")
    );

    let factory = CloudflareFactory::new();
    let mut scheduler = Scheduler::connect(&config, Box::new(discovery), &factory).await?;

    scheduler.run().await
}
