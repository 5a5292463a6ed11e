//! Wind alert hysteresis.
//!
//! An alert is raised as soon as a sample reaches the threshold, but a single
//! calm sample is not enough to clear it: the wind has to stay below the
//! threshold until `debounce` has elapsed since the alert was raised.
//!
//! ```text
//!              wind >= threshold
//!   Inactive ────────────────────► Active
//!      ▲                              │
//!      │  wind < threshold and        │ wind >= threshold: stay, silent
//!      │  elapsed >= debounce         │ wind < threshold, elapsed < debounce:
//!      └──────────────────────────────┘   stay, silent (snoozed)
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::{config::MonitoringConfig, model::Observation};

/// Alert state with the instant of its last transition.
///
/// `Active::since` is always the rising edge; it is never refreshed by later
/// above-threshold samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertState {
    /// `since` is `None` until the first alert of the night has cleared.
    Inactive { since: Option<DateTime<Utc>> },
    Active { since: DateTime<Utc> },
}

impl AlertState {
    pub fn is_active(&self) -> bool {
        matches!(self, AlertState::Active { .. })
    }

    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        match self {
            AlertState::Inactive { since } => *since,
            AlertState::Active { since } => Some(*since),
        }
    }
}

impl Default for AlertState {
    fn default() -> Self {
        AlertState::Inactive { since: None }
    }
}

/// Outcome of evaluating one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub next: AlertState,
    pub must_notify: bool,
    pub hazardous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisEvaluator {
    threshold: f64,
    debounce: Duration,
    routine_updates: bool,
}

impl HysteresisEvaluator {
    /// `routine_updates` controls whether every calm sample while no alert is
    /// active is delivered as a status update.
    pub fn new(threshold: f64, debounce: Duration, routine_updates: bool) -> Self {
        Self {
            threshold,
            debounce,
            routine_updates,
        }
    }

    pub fn from_config(config: &MonitoringConfig) -> Self {
        Self::new(config.wind_threshold, config.debounce(), config.routine_updates)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn evaluate(&self, sample: &Observation, prior: AlertState, now: DateTime<Utc>) -> AlertDecision {
        let windy = sample.wind_speed >= self.threshold;

        match (prior, windy) {
            (AlertState::Inactive { .. }, true) => AlertDecision {
                next: AlertState::Active { since: now },
                must_notify: true,
                hazardous: true,
            },
            (AlertState::Inactive { .. }, false) => AlertDecision {
                next: prior,
                must_notify: self.routine_updates,
                hazardous: false,
            },
            (AlertState::Active { .. }, true) => AlertDecision {
                next: prior,
                must_notify: false,
                hazardous: true,
            },
            (AlertState::Active { since }, false) => {
                if now - since >= self.debounce {
                    AlertDecision {
                        next: AlertState::Inactive { since: Some(now) },
                        must_notify: true,
                        hazardous: false,
                    }
                } else {
                    AlertDecision {
                        next: prior,
                        must_notify: false,
                        hazardous: true,
                    }
                }
            }
        }
    }
}
