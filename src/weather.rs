use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use reqwest::{StatusCode, header};

use crate::{
    config::NetworkConfig, error::CollaboratorError, http, model::Observation,
    traits::WeatherSource,
};

/// The newest record is always the last line of the file and fits in this many bytes.
const RECORD_TAIL_BYTES: u32 = 66;
const RECORD_TIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S";
const MIN_FIELDS: usize = 9;
const TEMPERATURE_FIELD: usize = 3;
const WIND_SPEED_FIELD: usize = 7;

/// Client for the observatory's fixed-width meteo record.
///
/// The file is only re-read when its `Last-Modified` header changes; in between
/// the last parsed observation is returned.
#[derive(Clone, Debug)]
pub struct MeteoClient {
    client: reqwest::Client,
    url: String,
    last_modified: Option<String>,
    current: Option<Observation>,
}

impl MeteoClient {
    /// Create a new meteo client with configurable timeouts.
    pub fn new(url: String, network_config: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(network_config)?,
            url,
            last_modified: None,
            current: None,
        })
    }

    async fn fetch_last_modified(&self) -> Result<Option<String>> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .context("HEAD request failed")?;

        let status = response.status();
        if status != StatusCode::OK {
            anyhow::bail!("Unexpected HEAD response: {}", status);
        }

        Ok(response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string))
    }

    async fn fetch_tail(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .header(header::RANGE, format!("bytes=-{}", RECORD_TAIL_BYTES))
            .send()
            .await
            .context("Failed to fetch weather data")?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT {
            anyhow::bail!("Unexpected HTTP response: {}", status);
        }

        response
            .text()
            .await
            .context("Failed to read weather data")
    }
}

impl WeatherSource for MeteoClient {
    async fn latest(&mut self) -> Result<Observation, CollaboratorError> {
        let modified = self
            .fetch_last_modified()
            .await
            .map_err(CollaboratorError::fetch)?;

        if let Some(current) = self.current {
            if modified.is_some() && modified == self.last_modified {
                tracing::debug!("Meteo record unchanged since {:?}", modified);
                return Ok(current);
            }
        }

        let tail = self.fetch_tail().await.map_err(CollaboratorError::fetch)?;
        let observation = parse_record(&tail).map_err(CollaboratorError::parse)?;

        // Only remember the marker once the record behind it parsed.
        self.last_modified = modified;
        self.current = Some(observation);
        Ok(observation)
    }
}

/// Parse the newest record from the tail of the meteo file.
///
/// A record looks like
/// `18-Oct-2024 21:15:00  754.3  -2.5  85  310  4.2  13.0  0.0`
/// with the temperature in field 3 and the wind speed in field 7.
pub fn parse_record(tail: &str) -> Result<Observation> {
    let line = tail
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .context("no data available")?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        anyhow::bail!("malformed last line: {:?}", line);
    }

    let wind_speed: f64 = fields[WIND_SPEED_FIELD]
        .parse()
        .with_context(|| format!("Error parsing wind speed {:?}", fields[WIND_SPEED_FIELD]))?;
    anyhow::ensure!(wind_speed.is_finite(), "wind speed {} is not a number", wind_speed);

    let temperature: f64 = fields[TEMPERATURE_FIELD]
        .parse()
        .with_context(|| format!("Error parsing temperature {:?}", fields[TEMPERATURE_FIELD]))?;
    anyhow::ensure!(temperature.is_finite(), "temperature {} is not a number", temperature);

    let timestamp = format!("{} {}", fields[0], fields[1]);
    let observed_at = NaiveDateTime::parse_from_str(&timestamp, RECORD_TIME_FORMAT)
        .with_context(|| format!("Error parsing date time {:?}", timestamp))?
        .and_utc();

    Ok(Observation {
        wind_speed,
        temperature,
        observed_at,
    })
}
