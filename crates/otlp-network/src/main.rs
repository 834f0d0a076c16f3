//! otlp-network - network metrics exporter.
//!
//! Reads network counters from /proc on every scrape of `/metrics` and,
//! when an OTLP endpoint is configured, pushes the same metrics periodically.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config;
mod server;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use otlp_network_core::collector::RealFs;

use crate::config::{Config, Overrides};
use crate::server::MetricsServer;

/// Network metrics exporter for Prometheus and OTLP.
#[derive(Parser)]
#[command(
    name = "otlp-network",
    about = "Network metrics exporter for Prometheus and OTLP",
    version = otlp_network_core::LONG_VERSION
)]
struct Args {
    /// Path to the YAML config file. Defaults to the first of the standard locations that exists.
    #[arg(short, long, env = "OTLP_NETWORK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// `RUST_LOG` directives are applied first; flags set the level of our own crates.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["otlp_network", "otlp_network_core"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let (mut config, path) = Config::discover(args.config.as_deref())?;
    config.apply(&args.overrides);
    config.validate().context("invalid configuration")?;

    info!(
        version = otlp_network_core::VERSION,
        git_sha = otlp_network_core::GIT_SHA,
        config = ?path,
        "otlp-network starting"
    );

    let readers = telemetry::build_readers(RealFs::new(), &config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let grace = config.server.shutdown_grace;
    block_on_bounded(runtime, grace, async_main(config, readers))
}

/// Runs `future` to completion, then gives leftover blocking work at most
/// `grace` before the runtime is torn down.
fn block_on_bounded<F: Future>(
    runtime: tokio::runtime::Runtime,
    grace: Duration,
    future: F,
) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    output
}

async fn async_main(config: Config, readers: otlp_network_core::telemetry::Readers) -> Result<()> {
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;

    MetricsServer::new(readers, config.server.shutdown_grace)
        .run(listener, cancel)
        .await
        .context("metrics server")?;

    info!("otlp-network stopped");
    Ok(())
}

/// Cancels `cancel` on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = terminate => info!("received SIGTERM, shutting down"),
        }
        cancel.cancel();
    });
}
