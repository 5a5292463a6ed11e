use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::NetworkConfig;

/// HTTP client shared by the weather, chart and Telegram collaborators.
pub fn client(network_config: &NetworkConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(network_config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
        .user_agent(concat!("windwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = NetworkConfig {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        };
        assert!(client(&config).is_ok());
    }

    #[test]
    fn test_client_with_custom_timeouts() {
        let config = NetworkConfig {
            request_timeout_secs: 60,
            connect_timeout_secs: 20,
        };
        assert!(client(&config).is_ok());
    }
}
