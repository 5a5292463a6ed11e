use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single parsed record from the meteo feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Air temperature in °C.
    pub temperature: f64,
    pub observed_at: DateTime<Utc>,
}

/// A locally cached rendering of the current conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Nautical dusk and the following nautical dawn for one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TwilightWindow {
    pub dusk: DateTime<Utc>,
    pub dawn: DateTime<Utc>,
}

impl TwilightWindow {
    /// Length of the night between the two crossings.
    pub fn duration(&self) -> chrono::Duration {
        self.dawn - self.dusk
    }
}
