use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use windwatch::{
    ChartDownloader, Clock, HysteresisEvaluator, LogNotifier, MeteoClient, MonitoringStateMachine,
    Notifier, ScheduleGate, SystemClock, TelegramNotifier, TickOutcome, config::AppConfig,
};

#[derive(Parser, Debug)]
#[command(name = "windwatch")]
#[command(about = "Night-time wind monitor with Telegram alerts")]
struct Args {
    /// Log notifications instead of sending them to Telegram
    #[arg(long)]
    dry_run: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("windwatch=debug");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    if args.dry_run {
        tracing::info!("Dry run: notifications are only logged");
        rt.block_on(run_monitor(&config, LogNotifier, args.once))
    } else {
        let notifier = TelegramNotifier::from_config(&config.telegram, &config.network)
            .context("Failed to configure Telegram")?;
        rt.block_on(run_monitor(&config, notifier, args.once))
    }
}

/// Poll loop: one state machine tick per interval until Ctrl-C.
async fn run_monitor<N: Notifier>(config: &AppConfig, notifier: N, once: bool) -> Result<()> {
    tracing::info!("Starting Windwatch");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let weather = MeteoClient::new(config.weather.data_url.clone(), &config.network)?;
    let charts = ChartDownloader::from_config(&config.weather, &config.network, clock.clone())?;
    tracing::info!("Weather clients initialized");

    let schedule = ScheduleGate::from_config(config);
    let evaluator = HysteresisEvaluator::from_config(&config.monitoring);
    tracing::info!(
        "Observer at {:.4}, {:.4} ({} m); threshold {:.1} m/s, debounce {} min, lead time {} min",
        config.observer.latitude,
        config.observer.longitude,
        config.observer.elevation,
        evaluator.threshold(),
        config.monitoring.debounce_minutes,
        config.monitoring.lead_time_minutes
    );

    let mut machine =
        MonitoringStateMachine::new(schedule, weather, charts, notifier, clock, evaluator);

    if once {
        log_outcome(&machine.tick().await);
        return Ok(());
    }

    let interval = config.monitoring.poll_interval();
    tracing::info!("Starting poll loop with interval: {} seconds", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                log_outcome(&machine.tick().await);
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}

fn log_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Idle => tracing::debug!("Outside the work window"),
        TickOutcome::WorkStarted(window) => {
            tracing::info!("Monitoring until {}", window.dawn.format("%H:%M"))
        }
        TickOutcome::WorkEnded => tracing::info!("Monitoring paused until next dusk"),
        TickOutcome::Notified { hazardous } => {
            tracing::debug!("Update delivered (hazardous: {})", hazardous)
        }
        TickOutcome::Suppressed { .. } => {}
        TickOutcome::Failed(e) => tracing::error!("Tick failed: {}", e),
    }
}
