//! race-weather: keeps forecasts for scheduled races synchronized with the
//! OpenWeather provider.
//!
//! Single-binary Tokio application that:
//! 1. Opens the race/forecast store
//! 2. Runs a synchronization pass on a fixed cadence
//! 3. Reaps expired forecast rows on an independent cadence

mod config;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use openweather_client::{ForecastProvider, OpenWeatherClient};
use race_store::RaceStore;
use sync_engine::{ExpiryReaper, PassOutcome, SyncScheduler};

/// Race forecast synchronization service.
#[derive(Parser)]
#[command(name = "race-weather", about = "Race forecast synchronization service")]
struct Cli {
    /// Run a single synchronization pass and exit.
    #[arg(long)]
    sync_once: bool,

    /// Run a single expired-forecast cleanup and exit.
    #[arg(long)]
    reap_once: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "race_weather=info,sync_engine=info,openweather_client=info,race_store=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Race weather service starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Budget: {} calls per {}s window; sync every {}s, reap every {}s",
        cfg.limits.max_calls_per_window,
        cfg.limits.window_secs,
        cfg.timing.sync_interval_secs,
        cfg.timing.reap_interval_secs,
    );

    // Open storage and build the provider client.
    let store = match RaceStore::open(&cfg.db_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open storage at {}: {}", cfg.db_path, e);
            std::process::exit(1);
        }
    };

    let client = match OpenWeatherClient::new(
        &cfg.base_url,
        &cfg.api_key,
        &cfg.units,
        &cfg.lang,
        Duration::from_secs(cfg.limits.http_timeout_secs),
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build provider client: {}", e);
            std::process::exit(1);
        }
    };

    let scheduler = Arc::new(SyncScheduler::new(store.clone(), client, &cfg.limits));
    let reaper = Arc::new(ExpiryReaper::new(store));

    // ── One-shot modes ───────────────────────────────────────────────
    if cli.sync_once {
        run_sync_pass(&scheduler).await;
        return;
    }
    if cli.reap_once {
        run_reap(&reaper);
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────

    // Task 1: synchronization passes. The first tick fires immediately so a
    // fresh deployment has forecasts before the first full interval elapses.
    let sync_scheduler = Arc::clone(&scheduler);
    let sync_interval = cfg.timing.sync_interval_secs;
    let sync_handle = tokio::spawn(async move {
        let mut timer = interval(Duration::from_secs(sync_interval));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            run_sync_pass(&sync_scheduler).await;
        }
    });

    // Task 2: expired-forecast cleanup, on its own independent timer.
    let reap_reaper = Arc::clone(&reaper);
    let reap_interval = cfg.timing.reap_interval_secs;
    let reap_handle = tokio::spawn(async move {
        let mut timer = interval(Duration::from_secs(reap_interval));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            run_reap(&reap_reaper);
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("Race weather service is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = sync_handle => {
            error!("Sync task exited: {:?}", r);
        }
        r = reap_handle => {
            error!("Reaper task exited: {:?}", r);
        }
    }

    info!("Race weather service shut down.");
}

// ── Task implementations ────────────────────────────────────────────

/// Drive one timer fire. Pass failures end up in the log and nowhere else:
/// nothing external awaits a pass, and the next tick is the retry policy.
async fn run_sync_pass<P: ForecastProvider>(scheduler: &SyncScheduler<P>) {
    match scheduler.run_pass().await {
        Ok(PassOutcome::Completed(_)) | Ok(PassOutcome::Skipped) => {}
        Err(e) => {
            error!("Sync pass aborted: {}", e);
        }
    }
}

fn run_reap(reaper: &ExpiryReaper) {
    if let Err(e) = reaper.reap(Utc::now()) {
        error!("Forecast cleanup failed: {}", e);
    }
}
