/*
[INPUT]:  HTTP configuration (base URL, timeouts, broker account) and access token
[OUTPUT]: Configured reqwest client ready for API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::auth::SecretToken;
use crate::http::{InvestError, Result};
use crate::types::{ApiErrorPayload, ApiResponse};

/// Base URLs for the Invest REST API
const PRODUCTION_BASE_URL: &str = "https://api-invest.tinkoff.ru/openapi/";
const SANDBOX_BASE_URL: &str = "https://api-invest.tinkoff.ru/openapi/sandbox/";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Appended as `brokerAccountId` to portfolio and order calls
    pub broker_account_id: Option<String>,
    /// Register the sandbox account before the first request
    pub sandbox: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            broker_account_id: None,
            sandbox: false,
        }
    }
}

impl ClientConfig {
    /// Configuration targeting the sandbox environment
    pub fn sandbox() -> Self {
        Self {
            base_url: SANDBOX_BASE_URL.to_string(),
            sandbox: true,
            ..Self::default()
        }
    }
}

/// REST client for the Invest OpenAPI
#[derive(Debug, Clone)]
pub struct OpenApiClient {
    http_client: Client,
    base_url: Url,
    token: SecretToken,
    broker_account_id: Option<String>,
    /// Set once the sandbox account exists; `None` outside the sandbox
    sandbox_ready: Option<Arc<OnceCell<()>>>,
}

impl OpenApiClient {
    /// Create a new client with default configuration
    pub fn new(token: SecretToken) -> Result<Self> {
        Self::with_config(token, ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(token: SecretToken, config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            http_client,
            base_url: Url::parse(&base_url)?,
            token,
            broker_account_id: config.broker_account_id,
            sandbox_ready: config.sandbox.then(|| Arc::new(OnceCell::new())),
        })
    }

    /// Broker account used for portfolio and order calls; `None` means the
    /// default account
    pub fn current_account_id(&self) -> Option<&str> {
        self.broker_account_id.as_deref()
    }

    pub fn set_current_account_id(&mut self, broker_account_id: Option<String>) {
        self.broker_account_id = broker_account_id;
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox_ready.is_some()
    }

    pub(crate) fn mark_sandbox_registered(&self) {
        if let Some(ready) = &self.sandbox_ready {
            let _ = ready.set(());
        }
    }

    /// Build an authenticated request builder for `endpoint`
    pub(crate) fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(endpoint)?;
        Ok(self
            .http_client
            .request(method, url)
            .bearer_auth(self.token.expose()))
    }

    /// Same as [`Self::request`] with `brokerAccountId` attached when configured
    pub(crate) fn account_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let builder = self.request(method, endpoint)?;
        Ok(match &self.broker_account_id {
            Some(account) => builder.query(&[("brokerAccountId", account.as_str())]),
            None => builder,
        })
    }

    /// Send the request and unwrap the response envelope. In the sandbox the
    /// account is registered first, once per client.
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        if let Some(ready) = &self.sandbox_ready {
            ready
                .get_or_try_init(|| async {
                    info!("registering sandbox account");
                    self.sandbox_register(Default::default()).await.map(|_| ())
                })
                .await?;
        }
        self.execute_json(builder).await
    }

    /// Send without the sandbox registration step
    pub(crate) async fn execute_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(InvestError::Unauthorized {
                    status: status.as_u16(),
                });
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(InvestError::RateLimit { retry_after: 60 });
            }
            _ => {}
        }

        if !status.is_success() {
            debug!(status = status.as_u16(), bytes = body.len(), "api error response");
            return Err(parse_error_body(status, &body));
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
        Ok(envelope.payload)
    }
}

fn parse_error_body(status: StatusCode, body: &str) -> InvestError {
    let Ok(envelope) = serde_json::from_str::<ApiResponse<ApiErrorPayload>>(body) else {
        return InvestError::api_error(status, body.trim().to_string());
    };

    let message = envelope
        .payload
        .message
        .unwrap_or_else(|| envelope.status.clone());
    match envelope.payload.code {
        Some(code) => InvestError::Api { code, message },
        None => InvestError::api_error(status, message),
    }
}
