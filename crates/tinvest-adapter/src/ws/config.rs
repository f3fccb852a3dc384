/*
[INPUT]:  Streaming endpoint and timing parameters
[OUTPUT]: StreamingConfig consumed by the connection manager
[POS]:    WebSocket layer - connection configuration
[UPDATE]: When adding connection options or changing defaults
*/

use std::time::Duration;

use url::Url;

use crate::http::{InvestError, Result};

const STREAMING_URL: &str = "wss://api-invest.tinkoff.ru/openapi/md/v1/md-openapi/ws";

/// Streaming connection configuration
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    pub url: String,
    /// Period between pings on an open connection
    pub ping_interval: Duration,
    /// How long an unanswered ping is trusted before the socket is dropped
    pub pong_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            url: STREAMING_URL.to_string(),
            ping_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}

impl StreamingConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(InvestError::Config(format!(
                "streaming url must use ws:// or wss://, got {}",
                self.url
            )));
        }
        if self.ping_interval.is_zero() || self.pong_timeout.is_zero() {
            return Err(InvestError::Config(
                "ping interval and pong timeout must be non-zero".to_string(),
            ));
        }
        if self.reconnect_initial_delay > self.reconnect_max_delay {
            return Err(InvestError::Config(
                "reconnect initial delay exceeds max delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay before the next connect attempt after `failures` consecutive failures
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.min(31);
        self.reconnect_initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.reconnect_max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_clamps_at_max() {
        let config = StreamingConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(4), Duration::from_secs(16));
        assert_eq!(config.backoff(5), Duration::from_secs(30));
        assert_eq!(config.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(StreamingConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_websocket_url() {
        let config = StreamingConfig::with_url("https://example.com/ws");
        assert!(matches!(config.validate(), Err(InvestError::Config(_))));
        let config = StreamingConfig::with_url("not a url");
        assert!(matches!(config.validate(), Err(InvestError::UrlParse(_))));
    }
}
