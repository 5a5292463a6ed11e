//! Typed errors shared by the schedule, the collaborators and the config layer.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::twilight::TwilightEvent;

/// The twilight computation could not produce a usable work window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("Sun never crosses nautical {event} elevation on {date}")]
    NoCrossing { event: TwilightEvent, date: NaiveDate },
    #[error("Degenerate twilight window: dusk {dusk} is not before dawn {dawn}")]
    DegenerateWindow {
        dusk: DateTime<Utc>,
        dawn: DateTime<Utc>,
    },
}

/// An I/O failure in one of the weather, chart or notification collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl CollaboratorError {
    /// Wrap an `anyhow` chain as a fetch failure, keeping every context layer.
    pub fn fetch(err: anyhow::Error) -> Self {
        Self::Fetch(format!("{err:#}"))
    }

    pub fn parse(err: anyhow::Error) -> Self {
        Self::Parse(format!("{err:#}"))
    }

    pub fn delivery(err: anyhow::Error) -> Self {
        Self::Delivery(format!("{err:#}"))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Why a single monitoring tick was abandoned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("HEAD request failed");
        let wrapped = CollaboratorError::fetch(err);
        assert_eq!(
            wrapped,
            CollaboratorError::Fetch("HEAD request failed: connection refused".to_string())
        );
    }

    #[test]
    fn test_tick_error_is_transparent() {
        let err: TickError = CollaboratorError::Delivery("chat not found".to_string()).into();
        assert_eq!(err.to_string(), "Delivery error: chat not found");
    }

    #[test]
    fn test_no_crossing_message_names_event() {
        let err = ScheduleError::NoCrossing {
            event: TwilightEvent::Dusk,
            date: NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Sun never crosses nautical dusk elevation on 2024-06-21"
        );
    }
}
