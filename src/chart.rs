use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;

use crate::{
    config::{NetworkConfig, WeatherConfig},
    error::CollaboratorError,
    http,
    model::Chart,
    traits::{ChartSource, Clock},
};

/// Downloads the observatory's weather chart to a local file.
#[derive(Clone)]
pub struct ChartDownloader {
    client: reqwest::Client,
    url: String,
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ChartDownloader {
    pub fn new(
        url: String,
        path: PathBuf,
        network_config: &NetworkConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(network_config)?,
            url,
            path,
            clock,
        })
    }

    pub fn from_config(
        weather: &WeatherConfig,
        network: &NetworkConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::new(
            weather.chart_url.clone(),
            weather.chart_path.clone(),
            network,
            clock,
        )
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to fetch chart")?;

        let status = response.status();
        if status != StatusCode::OK {
            anyhow::bail!("Unexpected HTTP response: {}", status);
        }

        let body = response.bytes().await.context("Failed to read chart")?;
        anyhow::ensure!(!body.is_empty(), "chart response is empty");
        Ok(body.to_vec())
    }
}

impl std::fmt::Debug for ChartDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartDownloader")
            .field("url", &self.url)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ChartSource for ChartDownloader {
    async fn updated_chart(&mut self) -> Result<Chart, CollaboratorError> {
        let bytes = self.download().await.map_err(CollaboratorError::fetch)?;

        tokio::fs::write(&self.path, &bytes)
            .await
            .with_context(|| format!("Failed to write chart to {}", self.path.display()))
            .map_err(CollaboratorError::fetch)?;

        tracing::debug!("Saved {} byte chart to {}", bytes.len(), self.path.display());
        Ok(Chart {
            path: self.path.clone(),
            created_at: self.clock.now_utc(),
        })
    }
}
