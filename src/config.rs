use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{error::ConfigError, schedule::ScheduleGate, twilight::Observer};

/// Coarse bound; the per-night check in `ScheduleGate::check_lead_time` is stricter.
const MAX_LEAD_TIME_MINUTES: u64 = 6 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub weather: WeatherConfig,
    pub network: NetworkConfig,
    pub telegram: TelegramConfig,
    pub monitoring: MonitoringConfig,
    pub observer: Observer,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    /// Fixed-width meteo record, newest line last.
    pub data_url: String,
    pub chart_url: String,
    /// Where the downloaded chart image is kept between uploads.
    pub chart_path: PathBuf,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            data_url: "https://relay.sao.ru/tb/tcs/meteo/data/meteo.dat".to_string(),
            chart_url: "https://www.sao.ru/tb/tcs/meteo/meteo_today.cgi".to_string(),
            chart_path: PathBuf::from("chart.png"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            bot_token: None,
            chat_id: None,
        }
    }
}

impl TelegramConfig {
    /// Bot token and chat id, both required to deliver anything.
    pub fn credentials(&self) -> Result<(String, i64), ConfigError> {
        let token = self
            .bot_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("BOT_TOKEN must be set".to_string()))?;
        let chat_id = self
            .chat_id
            .ok_or_else(|| ConfigError::Invalid("TELEGRAM_CHAT_ID must be set".to_string()))?;
        Ok((token, chat_id))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitoringConfig {
    pub poll_interval_secs: u64,
    /// Wind speed in m/s at or above which an alert is raised.
    pub wind_threshold: f64,
    /// Minimum time since the alert was raised before calm wind may clear it.
    pub debounce_minutes: u64,
    /// How long before nautical dusk monitoring starts.
    pub lead_time_minutes: u64,
    /// Deliver a status update on every calm poll, not only on alert edges.
    pub routine_updates: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            wind_threshold: 14.5,
            debounce_minutes: 20,
            lead_time_minutes: 120,
            routine_updates: true,
        }
    }
}

impl MonitoringConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    pub fn debounce(&self) -> chrono::Duration {
        minutes(self.debounce_minutes)
    }

    pub fn lead_time(&self) -> chrono::Duration {
        minutes(self.lead_time_minutes)
    }
}

fn minutes(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .unwrap_or(chrono::Duration::MAX)
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        // Variable names from the earlier deployment sit in the defaults layer
        let legacy = LegacyEnv::from_env()?;

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("windwatch");

        let weather = WeatherConfig::default();
        let network = NetworkConfig::default();
        let telegram = TelegramConfig::default();
        let monitoring = MonitoringConfig::default();
        let observer = Observer::BTA;

        let builder = Config::builder()
            // 1. Load default values
            // Weather feed
            .set_default("weather.data_url", legacy.data_url.unwrap_or(weather.data_url))?
            .set_default("weather.chart_url", legacy.chart_url.unwrap_or(weather.chart_url))?
            .set_default("weather.chart_path", weather.chart_path.to_string_lossy().to_string())?
            // Network
            .set_default("network.request_timeout_secs", network.request_timeout_secs)?
            .set_default("network.connect_timeout_secs", network.connect_timeout_secs)?
            // Telegram
            .set_default("telegram.api_url", telegram.api_url)?
            .set_default("telegram.bot_token", legacy.bot_token)?
            .set_default("telegram.chat_id", legacy.chat_id)?
            // Monitoring
            .set_default(
                "monitoring.poll_interval_secs",
                legacy.poll_interval_secs.unwrap_or(monitoring.poll_interval_secs),
            )?
            .set_default(
                "monitoring.wind_threshold",
                legacy.wind_threshold.unwrap_or(monitoring.wind_threshold),
            )?
            .set_default(
                "monitoring.debounce_minutes",
                legacy.debounce_minutes.unwrap_or(monitoring.debounce_minutes),
            )?
            .set_default(
                "monitoring.lead_time_minutes",
                legacy.lead_time_minutes.unwrap_or(monitoring.lead_time_minutes),
            )?
            .set_default("monitoring.routine_updates", monitoring.routine_updates)?
            // Observer (BTA)
            .set_default("observer.latitude", observer.latitude)?
            .set_default("observer.longitude", observer.longitude)?
            .set_default("observer.elevation", observer.elevation)?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (WINDWATCH__MONITORING__WIND_THRESHOLD=...)
            .add_source(Environment::with_prefix("WINDWATCH").separator("__"));

        let s = builder.build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitoring.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.monitoring.lead_time_minutes >= MAX_LEAD_TIME_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "monitoring.lead_time_minutes must be below {} (the night rolls over at local noon)",
                MAX_LEAD_TIME_MINUTES
            )));
        }
        if !self.monitoring.wind_threshold.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "monitoring.wind_threshold {} is not a number",
                self.monitoring.wind_threshold
            )));
        }
        self.observer.validate()?;
        ScheduleGate::from_config(self).check_lead_time()
    }
}

/// Unprefixed variables read by the earlier deployment of this monitor.
/// Durations use Go syntax (`90s`, `20m`, `1h30m`).
#[derive(Debug, Default, Clone, PartialEq)]
struct LegacyEnv {
    data_url: Option<String>,
    chart_url: Option<String>,
    bot_token: Option<String>,
    chat_id: Option<i64>,
    wind_threshold: Option<f64>,
    poll_interval_secs: Option<u64>,
    debounce_minutes: Option<u64>,
    lead_time_minutes: Option<u64>,
}

impl LegacyEnv {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let parsed = |key: &str, parse: fn(&str) -> Result<u64, String>| {
            var(key)
                .map(|raw| {
                    parse(raw.trim()).map_err(|e| {
                        ConfigError::Invalid(format!("{} {:?} is invalid: {}", key, raw, e))
                    })
                })
                .transpose()
        };

        let chat_id = var("TELEGRAM_CHAT_ID")
            .map(|raw| {
                raw.trim().parse::<i64>().map_err(|e| {
                    ConfigError::Invalid(format!("TELEGRAM_CHAT_ID {:?} is not a chat id: {}", raw, e))
                })
            })
            .transpose()?;
        let wind_threshold = var("WIND_THRESHOLD")
            .map(|raw| {
                raw.trim().parse::<f64>().map_err(|e| {
                    ConfigError::Invalid(format!("WIND_THRESHOLD {:?} is not a number: {}", raw, e))
                })
            })
            .transpose()?;

        Ok(Self {
            data_url: var("WEATHER_URL"),
            chart_url: var("CHART_WEATHER_URL"),
            bot_token: var("BOT_TOKEN"),
            chat_id,
            wind_threshold,
            poll_interval_secs: parsed("POLL_INTERVAL", |s| {
                parse_go_duration(s).map(|d| d.as_secs())
            })?,
            debounce_minutes: parsed("DELAY_TIME_IN_MINUTES", |s| {
                parse_go_duration(s).map(|d| d.as_secs().div_ceil(60))
            })?,
            lead_time_minutes: parsed("RESERVE_TIME_BEFORE_DUSK_IN_MINUTES", |s| {
                parse_go_duration(s).map(|d| d.as_secs().div_ceil(60))
            })?,
        })
    }
}

/// Unit suffix to seconds (longer suffixes first so `ms` is not read as `m`).
const GO_DURATION_UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
];

/// Parse Go duration strings like "1m", "120m", "1h30m" or "0".
fn parse_go_duration(s: &str) -> Result<std::time::Duration, String> {
    if s == "0" {
        return Ok(std::time::Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut rest = s;
    let mut seconds = 0.0;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in {:?}", s))?;
        let (number, tail) = rest.split_at(split);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number {:?} in {:?}", number, s))?;
        let (unit, factor) = GO_DURATION_UNITS
            .iter()
            .find(|(unit, _)| tail.starts_with(unit))
            .ok_or_else(|| format!("unknown unit in {:?}", s))?;
        seconds += value * factor;
        rest = &tail[unit.len()..];
    }

    std::time::Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}
