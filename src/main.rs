//! rustlb - an HTTP reverse-proxy load balancer
//!
//! Usage:
//!     rustlb --config <path>
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::try_join_all;
use std::path::PathBuf;
use tracing::{error, info, warn};

use rustlb::AppContext;
use rustlb::config::{Config, load_config};
use rustlb::frontend::FrontendListener;
use rustlb::util::init_logging;

/// An HTTP reverse-proxy load balancer.
#[derive(Parser, Debug)]
#[command(name = "rustlb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from '{}'",
            cli.config.display()
        )
    })?;

    // CLI overrides config
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);

    init_logging(log_level, &config.log_format);

    // Backend URLs and weights are checked here as well, so a config that
    // passes --validate also starts.
    let ctx = AppContext::from_config(&config).context("invalid backend configuration")?;

    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Algorithm: {}", config.load_balancing_algorithm);
        println!("  Listen addresses: {}", config.addresses.join(", "));
        println!("  Backends: {}", config.backends.len());
        for backend in ctx.selector().backends() {
            println!("    - {}", backend);
        }
        return Ok(());
    }

    info!(
        config_path = %cli.config.display(),
        addresses = config.addresses.len(),
        backends = config.backends.len(),
        algorithm = %config.load_balancing_algorithm,
        backend_timeout_s = config.backend_timeout,
        read_timeout_s = config.read_timeout,
        write_timeout_s = config.write_timeout,
        "rustlb starting"
    );

    for backend in ctx.selector().backends() {
        info!(backend = %backend, "configured backend");
    }

    if config.use_service_registry {
        warn!("use_service_registry is set but service registries are not supported; using the static backend list");
    }

    run(config, ctx)
}

/// Run the load balancer with the given configuration.
fn run(config: Config, ctx: AppContext) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config, ctx).await })
}

/// Async entry point for the load balancer.
async fn run_async(config: Config, ctx: AppContext) -> Result<()> {
    // Bind every address before serving on any of them: one failed bind
    // stops the process instead of leaving it half started.
    let listeners = try_join_all(config.addresses.iter().map(|address| {
        let ctx = ctx.clone();
        async move {
            FrontendListener::bind(address, ctx)
                .await
                .with_context(|| format!("could not listen on {}", address))
        }
    }))
    .await?;

    let mut handles = Vec::new();
    for listener in listeners {
        let shutdown_rx = ctx.shutdown().subscribe();
        handles.push(tokio::spawn(listener.run(shutdown_rx)));
    }

    info!("rustlb is running");
    info!("press Ctrl+C to stop");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal");
        }
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    }

    ctx.trigger_shutdown();

    for handle in handles {
        let _ = handle.await;
    }

    info!("rustlb shut down complete");
    Ok(())
}
