//! frame-nudger
//!
//! Keeps the display compositor producing frames by driving a periodic tick
//! and restarting it when it stalls.
//!
//! Usage:
//!   frame-nudger [--config <path>] [--verbose]

use std::path::PathBuf;
use std::sync::Arc;

use frame_nudger::config::{ConfigStore, ConfigStoreConfig};
use frame_nudger::core::clock::TokioClock;
use frame_nudger::logging::{LoggingSystem, Logger};
use frame_nudger::supervisor::Supervisor;

/// Command line arguments
struct Args {
    /// Configuration file, defaults to the per-user config directory
    config: Option<PathBuf>,
    /// Enable verbose logging
    verbose: bool,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let mut config = None;
        let mut verbose = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().ok_or("--config requires a path")?;
                    config = Some(PathBuf::from(path));
                }
                "--verbose" | "-v" => {
                    verbose = true;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    return Err(format!("Unknown argument: {}", arg));
                }
            }
        }

        Ok(Self { config, verbose })
    }
}

fn print_help() {
    println!(
        r#"frame-nudger - Display liveness supervisor

USAGE:
    frame-nudger [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file (created with defaults if missing)
    -v, --verbose          Enable verbose logging
    -h, --help             Print this help message

DESCRIPTION:
    Drives a periodic refresh tick bound to the current display. A tick
    source that fails to start is retried on a backoff schedule. A
    periodic health check restarts the source when ticks stop arriving, up
    to a limited number of restarts per window. Intervals and limits come
    from the configuration file.

    Press Ctrl-C to stop.
"#
    );
}

async fn run(args: Args) -> frame_nudger::Result<()> {
    let store_config = match args.config {
        Some(path) => ConfigStoreConfig::at(path),
        None => ConfigStoreConfig::default(),
    };
    let store = ConfigStore::new(store_config).await?;
    let config = store.get().await;

    let mut logging_config = config.logging.clone();
    if args.verbose {
        logging_config = logging_config.verbose();
    }
    let _logging = LoggingSystem::init(logging_config)?;

    tracing::info!("Starting frame-nudger");
    tracing::info!("Configuration: {:?}", store.path());
    tracing::info!(
        "Health check every {}ms, stale after {}ms, at most {} restarts per {}ms",
        config.watchdog.check_interval_ms,
        config.watchdog.stale_threshold_ms,
        config.watchdog.max_restarts_per_window,
        config.watchdog.restart_window_ms
    );

    let supervisor =
        Supervisor::with_software_source(&config, Arc::new(TokioClock), Logger::tracing("nudger"));
    let handle = supervisor.handle();
    let mut status = supervisor.subscribe();

    tokio::spawn(async move {
        let mut last = String::new();
        while status.changed().await.is_ok() {
            let summary = status.borrow_and_update().summary();
            if summary != last {
                tracing::info!("Status: {}", summary);
                last = summary;
            }
        }
    });

    let mut running = std::pin::pin!(supervisor.run());
    tokio::select! {
        () = &mut running => {}
        signal = tokio::signal::ctrl_c() => {
            match &signal {
                Ok(()) => tracing::info!("Interrupted, shutting down"),
                Err(e) => tracing::error!("Failed to listen for Ctrl-C, shutting down: {}", e),
            }
            handle.shutdown();
            running.await;
            signal?;
        }
    }
    tracing::info!("frame-nudger stopped");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    run(args).await?;
    Ok(())
}
