//! Windwatch Library
//!
//! Night-time wind monitor for the observatory: computes the nautical twilight
//! work window, polls the meteo feed while it is open and posts wind alerts to
//! a Telegram chat.

pub mod alert;
pub mod chart;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod schedule;
pub mod traits;
pub mod twilight;
pub mod weather;

// Re-export commonly used types
pub use alert::{AlertDecision, AlertState, HysteresisEvaluator};
pub use chart::ChartDownloader;
pub use config::AppConfig;
pub use error::{CollaboratorError, ConfigError, ScheduleError, TickError};
pub use model::{Chart, Observation, TwilightWindow};
pub use monitor::{MonitoringState, MonitoringStateMachine, TickOutcome};
pub use notify::{LogNotifier, TelegramNotifier};
pub use schedule::{ScheduleGate, WorkStatus};
pub use traits::{
    ChartSource, Clock, MockChartSource, MockClock, MockNotifier, MockSchedule,
    MockWeatherSource, Notifier, NotifierEvent, SystemClock, WeatherSource, WorkSchedule,
};
pub use twilight::{Observer, TwilightCalculator, TwilightEvent};
pub use weather::MeteoClient;
