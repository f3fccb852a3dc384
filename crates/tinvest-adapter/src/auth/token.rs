/*
[INPUT]:  API access token issued by the broker
[OUTPUT]: Bearer credential for REST requests and the streaming handshake
[POS]:    Auth layer - credential storage
[UPDATE]: When token handling or header format changes
*/

use std::fmt;
use std::sync::Arc;

use crate::http::{InvestError, Result};

const TOKEN_ENV_VAR: &str = "TINKOFF_INVEST_TOKEN";

/// Access token sent as `Authorization: Bearer <token>`
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken {
    token: Arc<str>,
}

impl SecretToken {
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            return Err(InvestError::Config("access token must not be empty".to_string()));
        }
        if token.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(InvestError::Config(
                "access token contains whitespace or control characters".to_string(),
            ));
        }
        Ok(Self {
            token: Arc::from(token),
        })
    }

    /// Read the token from `TINKOFF_INVEST_TOKEN`
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(TOKEN_ENV_VAR)
            .map_err(|_| InvestError::Config(format!("{TOKEN_ENV_VAR} is not set")))?;
        Self::new(raw)
    }

    /// Raw token value
    pub fn expose(&self) -> &str {
        &self.token
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_value() {
        let token = SecretToken::new("t.abc123").unwrap();
        assert_eq!(token.bearer(), "Bearer t.abc123");
        assert_eq!(token.expose(), "t.abc123");
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = SecretToken::new("t.very-secret").unwrap();
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn rejects_blank_and_malformed_tokens() {
        assert!(matches!(SecretToken::new("   "), Err(InvestError::Config(_))));
        assert!(matches!(SecretToken::new("a b"), Err(InvestError::Config(_))));
    }
}
