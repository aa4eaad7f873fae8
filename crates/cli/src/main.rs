mod cli;
mod config;
mod session;
mod terminal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};

use refresher_core::{LogSink, TracingLogSink};
use refresher_engine::{NoopObserver, RefreshCoordinator, RefreshEngine, RefreshObserver};
use refresher_scheduler::{parse_times, DailyScheduler, ScheduleConfig, ScheduleTime};

use crate::cli::{CliArgs, Command};
use crate::config::CliConfig;
use crate::session::LocalFileFactory;
use crate::terminal::{print_summary, ProgressPrinter};

/// How long the daemon waits for an in-flight batch after Ctrl+C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = CliConfig::resolve(&args);

    match &args.command {
        Command::Run { json } => run_once(&config, *json).await,
        Command::Daemon { times, force } => run_daemon(&config, times, *force).await,
        Command::Next { times } => show_next(&config, times),
        Command::CheckTimes { times } => check_times(times),
    }
}

fn coordinator(config: &CliConfig, progress: bool) -> RefreshCoordinator {
    let sink: Arc<dyn LogSink> = Arc::new(TracingLogSink::new("refresher"));
    let observer: Arc<dyn RefreshObserver> = if progress {
        Arc::new(ProgressPrinter::new())
    } else {
        Arc::new(NoopObserver)
    };
    let engine = RefreshEngine::new(Arc::new(LocalFileFactory), config.engine(), observer, sink.clone());
    RefreshCoordinator::new(engine, config.documents.clone(), sink)
}

async fn run_once(config: &CliConfig, json: bool) -> Result<()> {
    config.base.log_summary();
    let coordinator = coordinator(config, !json);
    let handle = coordinator
        .trigger_manual()
        .context("failed to start refresh")?;

    let mut join = tokio::task::spawn_blocking(move || handle.join());
    let joined = tokio::select! {
        joined = &mut join => joined,
        _ = shutdown_signal() => {
            warn!("interrupt received, stopping after the current step");
            coordinator.request_stop();
            join.await
        }
    };
    let result = joined.context("refresh worker task failed")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result)?;
    }
    if result.failed > 0 {
        bail!("{} document(s) failed to refresh", result.failed);
    }
    Ok(())
}

async fn run_daemon(config: &CliConfig, times: &[String], force: bool) -> Result<()> {
    config.ensure_auto_refresh(force)?;
    config.base.log_summary();

    let coordinator = coordinator(config, false);
    let trigger_coordinator = coordinator.clone();
    let trigger = Arc::new(move |slot: ScheduleTime| -> Result<()> {
        if trigger_coordinator.trigger_scheduled()? {
            info!(%slot, "scheduled refresh started");
        }
        Ok(())
    });

    let slots = config.schedule_times(times);
    let scheduler = Arc::new(DailyScheduler::new(
        slots.as_slice(),
        trigger,
        Arc::new(TracingLogSink::new("scheduler")),
        config.timing(),
    ));
    if !scheduler.start() {
        bail!("scheduler failed to start");
    }
    info!(
        times = %scheduler.scheduled_times().join(", "),
        next = ?scheduler.next_run_time(),
        "daemon running, press Ctrl+C to stop"
    );

    shutdown_signal().await;
    info!("shutting down");

    tokio::task::spawn_blocking(move || {
        scheduler.stop();
        if coordinator.request_stop() && !coordinator.wait_idle(SHUTDOWN_GRACE) {
            warn!("refresh still running after {}s, exiting anyway", SHUTDOWN_GRACE.as_secs());
        }
    })
    .await
    .context("shutdown task failed")?;

    info!("daemon exited cleanly");
    Ok(())
}

fn show_next(config: &CliConfig, times: &[String]) -> Result<()> {
    let slots = config.schedule_times(times);
    let parsed = parse_times(slots.as_slice());
    for bad in &parsed.invalid {
        warn!(time = %bad, "ignoring invalid schedule time");
    }
    let schedule = ScheduleConfig::new(parsed.accepted);
    let slots: Vec<String> = schedule.times().iter().map(ToString::to_string).collect();
    println!("Scheduled times: {}", slots.join(", "));
    match schedule.next_run_after(Local::now().naive_local()) {
        Some(next) => println!("Next run: {}", next.format("%Y-%m-%d %H:%M")),
        None => println!("Next run: none"),
    }
    Ok(())
}

fn check_times(times: &[String]) -> Result<()> {
    let parsed = parse_times(times);
    for slot in &parsed.accepted {
        println!("ok       {}", slot);
    }
    for bad in &parsed.invalid {
        println!("invalid  {}", bad);
    }
    for extra in &parsed.overflow {
        println!("dropped  {} (at most {} slots)", extra, refresher_scheduler::MAX_TIMES);
    }
    if parsed.accepted.is_empty() {
        bail!("no valid times");
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            warn!(error = %e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    }
}
