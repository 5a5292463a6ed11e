//! The night monitoring state machine.
//!
//! One [`MonitoringStateMachine::tick`] per poll. Off/On follows the work
//! window; while On each tick pulls the latest observation and chart and runs
//! the hysteresis evaluator. A tick either completes or leaves the state
//! exactly as it found it, so the next tick simply retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    alert::{AlertDecision, AlertState, HysteresisEvaluator},
    error::TickError,
    model::TwilightWindow,
    traits::{ChartSource, Clock, Notifier, WeatherSource, WorkSchedule},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringState {
    Off,
    /// The alert state only exists while monitoring is on.
    On {
        window: TwilightWindow,
        alert: AlertState,
    },
}

impl MonitoringState {
    pub fn is_on(&self) -> bool {
        matches!(self, MonitoringState::On { .. })
    }

    pub fn alert(&self) -> Option<AlertState> {
        match self {
            MonitoringState::Off => None,
            MonitoringState::On { alert, .. } => Some(*alert),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Outside the work window, nothing to do.
    Idle,
    WorkStarted(TwilightWindow),
    WorkEnded,
    /// An update was delivered.
    Notified { hazardous: bool },
    /// Evaluated, but nothing needed sending.
    Suppressed { hazardous: bool },
    /// Abandoned without changing any state.
    Failed(TickError),
}

pub struct MonitoringStateMachine<S, W, C, N> {
    schedule: S,
    weather: W,
    charts: C,
    notifier: N,
    clock: Arc<dyn Clock>,
    evaluator: HysteresisEvaluator,
    state: MonitoringState,
}

impl<S, W, C, N> MonitoringStateMachine<S, W, C, N>
where
    S: WorkSchedule,
    W: WeatherSource,
    C: ChartSource,
    N: Notifier,
{
    pub fn new(
        schedule: S,
        weather: W,
        charts: C,
        notifier: N,
        clock: Arc<dyn Clock>,
        evaluator: HysteresisEvaluator,
    ) -> Self {
        Self {
            schedule,
            weather,
            charts,
            notifier,
            clock,
            evaluator,
            state: MonitoringState::Off,
        }
    }

    pub fn state(&self) -> MonitoringState {
        self.state
    }

    /// Run one poll cycle. Never fails; errors are logged and reported in the outcome.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now_utc();

        let status = match self.schedule.work_status(now) {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Schedule check failed, skipping tick: {}", e);
                return TickOutcome::Failed(e.into());
            }
        };

        match (self.state, status.is_work_time) {
            (MonitoringState::Off, false) => TickOutcome::Idle,
            (MonitoringState::Off, true) => self.start_work(status.window).await,
            (MonitoringState::On { .. }, false) => self.end_work().await,
            (MonitoringState::On { window, .. }, true) if window != status.window => {
                self.roll_over(status.window).await
            }
            (MonitoringState::On { window, alert }, true) => {
                self.check_weather(window, alert, now).await
            }
        }
    }

    async fn start_work(&mut self, window: TwilightWindow) -> TickOutcome {
        if let Err(e) = self.notifier.work_started(&window).await {
            tracing::warn!("Failed to announce work start, will retry: {}", e);
            return TickOutcome::Failed(e.into());
        }

        tracing::info!(
            "Work window started: dusk {}, dawn {}",
            window.dusk.format("%H:%M"),
            window.dawn.format("%H:%M")
        );
        self.state = MonitoringState::On {
            window,
            alert: AlertState::default(),
        };
        TickOutcome::WorkStarted(window)
    }

    async fn end_work(&mut self) -> TickOutcome {
        if let Err(e) = self.notifier.work_ended().await {
            tracing::warn!("Failed to announce work end, will retry: {}", e);
            return TickOutcome::Failed(e.into());
        }

        tracing::info!("Work window ended");
        self.state = MonitoringState::Off;
        TickOutcome::WorkEnded
    }

    /// Still on from a night whose dawn passed without a tick: close it,
    /// then open the new one with a fresh alert state.
    async fn roll_over(&mut self, window: TwilightWindow) -> TickOutcome {
        tracing::warn!(
            "Missed the end of the previous night, starting the night of {}",
            window.dusk.format("%Y-%m-%d")
        );
        match self.end_work().await {
            TickOutcome::WorkEnded => self.start_work(window).await,
            failed => failed,
        }
    }

    async fn check_weather(
        &mut self,
        window: TwilightWindow,
        alert: AlertState,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let observation = match self.weather.latest().await {
            Ok(observation) => observation,
            Err(e) => {
                tracing::warn!("Failed to get latest weather: {}", e);
                return TickOutcome::Failed(e.into());
            }
        };

        let chart = match self.charts.updated_chart().await {
            Ok(chart) => chart,
            Err(e) => {
                tracing::warn!("Failed to get updated chart: {}", e);
                return TickOutcome::Failed(e.into());
            }
        };

        let AlertDecision {
            next,
            must_notify,
            hazardous,
        } = self.evaluator.evaluate(&observation, alert, now);

        if must_notify {
            if let Err(e) = self.notifier.update(&chart, &observation, hazardous).await {
                tracing::warn!("Failed to deliver weather update, will retry: {}", e);
                return TickOutcome::Failed(e.into());
            }
        }

        match (alert.is_active(), next.is_active()) {
            (false, true) => tracing::info!(
                "Wind alert raised: {:.1} m/s (threshold {:.1})",
                observation.wind_speed,
                self.evaluator.threshold()
            ),
            (true, false) => tracing::info!(
                "Wind alert cleared: {:.1} m/s",
                observation.wind_speed
            ),
            (true, true) if observation.wind_speed < self.evaluator.threshold() => tracing::debug!(
                "Wind {:.1} m/s is below the threshold, but the alert is not yet due to clear",
                observation.wind_speed
            ),
            _ => tracing::debug!("Wind {:.1} m/s", observation.wind_speed),
        }

        self.state = MonitoringState::On {
            window,
            alert: next,
        };

        if must_notify {
            TickOutcome::Notified { hazardous }
        } else {
            TickOutcome::Suppressed { hazardous }
        }
    }
}
