//! Notifier implementations: the Telegram bot used in production and a
//! log-only notifier for dry runs.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    config::{NetworkConfig, TelegramConfig},
    error::{CollaboratorError, ConfigError},
    http,
    model::{Chart, Observation, TwilightWindow},
    traits::Notifier,
};

const PARSE_MODE: &str = "Markdown";
const TIME_FORMAT: &str = "%H:%M:%S";
const CHART_MIME: &str = "image/png";

/// Returned by `editMessageMedia` when the caption and photo are unchanged.
const NOT_MODIFIED: &str = "message is not modified";

// ==================== Message Formatting ====================

pub fn format_update(observation: &Observation, hazardous: bool) -> String {
    let time = observation.observed_at.format(TIME_FORMAT);
    if hazardous {
        format!(
            "🚨 *Alert*\n\nWind Speed: *{:.1} m/s*\nTemperature: *{:.1}°C*\nUpdate At: {}\n",
            observation.wind_speed, observation.temperature, time
        )
    } else {
        format!(
            "ℹ️ *Update:*\n\nWind Speed: *{:.1} m/s*\n_Wind speed is below the threshold._\nTemperature: *{:.1}°C*\nUpdate At: {}\n",
            observation.wind_speed, observation.temperature, time
        )
    }
}

pub fn format_work_started(window: &TwilightWindow) -> String {
    format!(
        "🌙 *Monitoring started*\n\nNautical dusk: {} UTC\nNautical dawn: {} UTC\n",
        window.dusk.format("%H:%M"),
        window.dawn.format("%H:%M")
    )
}

pub fn format_work_ended() -> String {
    "☀️ *Monitoring ended*\n\nNautical dawn reached, see you tonight.".to_string()
}

// ==================== Telegram ====================

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
struct PostedUpdate {
    message_id: i64,
    hazardous: bool,
}

/// Posts weather updates to a Telegram chat.
///
/// Consecutive updates with the same hazard level edit the previous photo in
/// place; a change of level posts a new message so the chat sees it.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    chat_id: i64,
    last_update: Option<PostedUpdate>,
}

impl TelegramNotifier {
    pub fn new(
        api_url: &str,
        token: &str,
        chat_id: i64,
        network_config: &NetworkConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(network_config)?,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            chat_id,
            last_update: None,
        })
    }

    pub fn from_config(
        telegram: &TelegramConfig,
        network: &NetworkConfig,
    ) -> Result<Self, ConfigError> {
        let (token, chat_id) = telegram.credentials()?;
        Self::new(&telegram.api_url, &token, chat_id, network)
            .map_err(|e| ConfigError::Invalid(format!("{e:#}")))
    }

    async fn post_json(&self, method: &str, body: &Value) -> Result<ApiResponse> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;
        read_response(method, response).await
    }

    async fn post_form(&self, method: &str, form: Form) -> Result<ApiResponse> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;
        read_response(method, response).await
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": PARSE_MODE,
        });
        ensure_ok("sendMessage", self.post_json("sendMessage", &body).await?)?;
        Ok(())
    }

    async fn chart_part(chart: &Chart) -> Result<Part> {
        let bytes = tokio::fs::read(&chart.path)
            .await
            .with_context(|| format!("Failed to read chart {}", chart.path.display()))?;
        let file_name = chart
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.png".to_string());
        Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(CHART_MIME)
            .context("Invalid chart MIME type")
    }

    async fn send_photo(&self, chart: &Chart, caption: String) -> Result<Option<i64>> {
        let form = Form::new()
            .text("chat_id", self.chat_id.to_string())
            .text("caption", caption)
            .text("parse_mode", PARSE_MODE)
            .part("photo", Self::chart_part(chart).await?);

        let response = ensure_ok("sendPhoto", self.post_form("sendPhoto", form).await?)?;
        Ok(message_id(&response))
    }

    async fn edit_photo(&self, message_id: i64, chart: &Chart, caption: String) -> Result<()> {
        let media = json!({
            "type": "photo",
            "media": "attach://chart",
            "caption": caption,
            "parse_mode": PARSE_MODE,
        });
        let form = Form::new()
            .text("chat_id", self.chat_id.to_string())
            .text("message_id", message_id.to_string())
            .text("media", media.to_string())
            .part("chart", Self::chart_part(chart).await?);

        let response = self.post_form("editMessageMedia", form).await?;
        if !response.ok
            && response
                .description
                .as_deref()
                .is_some_and(|d| d.contains(NOT_MODIFIED))
        {
            tracing::debug!("Telegram message {} already up to date", message_id);
            return Ok(());
        }
        ensure_ok("editMessageMedia", response)?;
        Ok(())
    }
}

async fn read_response(method: &str, response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read {} response", method))?;

    match serde_json::from_str::<ApiResponse>(&body) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => {
            anyhow::bail!("{} returned HTTP {}", method, status)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to parse {} response", method)),
    }
}

fn ensure_ok(method: &str, response: ApiResponse) -> Result<ApiResponse> {
    if !response.ok {
        anyhow::bail!(
            "{} rejected: {}",
            method,
            response.description.as_deref().unwrap_or("no description")
        );
    }
    Ok(response)
}

fn message_id(response: &ApiResponse) -> Option<i64> {
    response
        .result
        .as_ref()
        .and_then(|result| result.get("message_id"))
        .and_then(Value::as_i64)
}

impl Notifier for TelegramNotifier {
    async fn work_started(&mut self, window: &TwilightWindow) -> Result<(), CollaboratorError> {
        self.send_text(format_work_started(window))
            .await
            .map_err(CollaboratorError::delivery)
    }

    async fn work_ended(&mut self) -> Result<(), CollaboratorError> {
        self.send_text(format_work_ended())
            .await
            .map_err(CollaboratorError::delivery)?;
        self.last_update = None;
        Ok(())
    }

    async fn update(
        &mut self,
        chart: &Chart,
        observation: &Observation,
        hazardous: bool,
    ) -> Result<(), CollaboratorError> {
        let caption = format_update(observation, hazardous);

        match self.last_update {
            Some(last) if last.hazardous == hazardous => {
                if let Err(e) = self.edit_photo(last.message_id, chart, caption).await {
                    // The next update posts a fresh message instead of editing a lost one.
                    self.last_update = None;
                    return Err(CollaboratorError::delivery(e));
                }
            }
            _ => {
                let message_id = self
                    .send_photo(chart, caption)
                    .await
                    .map_err(CollaboratorError::delivery)?;
                self.last_update = message_id.map(|message_id| PostedUpdate {
                    message_id,
                    hazardous,
                });
            }
        }
        Ok(())
    }
}

// ==================== Dry Run ====================

/// Notifier that only logs what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn work_started(&mut self, window: &TwilightWindow) -> Result<(), CollaboratorError> {
        tracing::info!("[dry-run] {}", format_work_started(window));
        Ok(())
    }

    async fn work_ended(&mut self) -> Result<(), CollaboratorError> {
        tracing::info!("[dry-run] {}", format_work_ended());
        Ok(())
    }

    async fn update(
        &mut self,
        chart: &Chart,
        observation: &Observation,
        hazardous: bool,
    ) -> Result<(), CollaboratorError> {
        tracing::info!(
            "[dry-run] {} (chart {})",
            format_update(observation, hazardous),
            chart.path.display()
        );
        Ok(())
    }
}
