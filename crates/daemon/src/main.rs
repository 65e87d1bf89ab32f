// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobd: the job supervisor daemon.
//!
//! Foreground process that owns the event loop and the children.
//!
//! Architecture:
//! - Waiter tasks: one per child, forward exit events to the loop
//! - Engine loop: main task processing events sequentially

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::time::Instant;

use jobd_daemon::{env, lifecycle, Config, LifecycleError, StartupResult};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("jobd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("jobd {}", env!("CARGO_PKG_VERSION"));
                println!("Host-local service manager daemon");
                println!();
                println!("USAGE:");
                println!("    jobd");
                println!();
                println!("Runs in the foreground: imports are done with `jobcfg`,");
                println!("status is read with `jobstat`. The catalog location comes");
                println!("from JOBD_DB_PATH, volatile state from JOBD_RUNTIME_DIR.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -V, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: jobd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    std::fs::create_dir_all(&config.runtime_dir)?;
    let _log_guard = setup_logging(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting jobd");

    let StartupResult {
        mut supervisor,
        mut event_rx,
        lock,
    } = match lifecycle::startup(&config) {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            // Another daemon holds the runtime dir; say so plainly
            // instead of dumping a raw error.
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("jobd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start: {e}");
            return Err(e.into());
        }
    };

    // Everything importable is now loaded; sequence the initial start.
    let report = supervisor.solve_and_start()?;
    info!(started = report.started, "initial solve complete");
    if !report.cycle.is_empty() {
        warn!(cycle = ?report.cycle, "cycle members marked error");
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // NOTE: must be created outside the loop - tokio::select! re-evaluates
    // branches on each iteration, so using sleep() inside would reset on
    // every event, and grace timers would never fire during activity.
    let mut timer_check = tokio::time::interval(env::timer_check_interval());

    info!("supervising {} live children", supervisor.live_children());

    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        if let Err(e) = supervisor.handle_event(event) {
                            // Unprocessable events must not take the loop
                            // down; the job table stays consistent.
                            error!("error processing event: {e}");
                        }
                    }
                    None => {
                        error!("event channel closed unexpectedly");
                        break;
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                supervisor.begin_shutdown();
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down");
                supervisor.begin_shutdown();
            }
            _ = timer_check.tick() => {
                if let Err(e) = supervisor.check_timers(Instant::now()) {
                    error!("timer error: {e}");
                }
            }
        }

        if supervisor.is_shutting_down() && supervisor.live_children() == 0 {
            break;
        }
    }

    info!("all children stopped, exiting");
    drop(lock);
    Ok(())
}

/// Log to stderr and to the runtime-dir log file. The returned guard
/// flushes the file writer on drop.
fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
