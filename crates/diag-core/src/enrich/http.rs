//! HTTP reasoning oracle client.
//!
//! Sends the [`OracleRequest`] as JSON to a configured endpoint and expects an
//! [`OracleReply`] back. Each attempt has its own request timeout; the overall
//! deadline is enforced by the caller.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::oracle::{OracleError, OracleReply, OracleRequest, ReasoningOracle};
use crate::config::OracleConfig;

/// JSON-over-HTTP oracle.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    endpoint: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl HttpOracle {
    /// Create a client for `endpoint` with a per-attempt timeout.
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        attempt_timeout: Duration,
    ) -> Result<Self, OracleError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("obd-diag/", env!("CARGO_PKG_VERSION")))
            .timeout(attempt_timeout)
            .connect_timeout(attempt_timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        Ok(HttpOracle {
            endpoint: endpoint.to_string(),
            token,
            http_client,
        })
    }

    /// Build from config; `NotConfigured` when no endpoint is set.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let endpoint = config.endpoint.as_deref().ok_or(OracleError::NotConfigured)?;
        Self::new(endpoint, config.token.clone(), config.attempt_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReasoningOracle for HttpOracle {
    async fn rank(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        let mut builder = self.http_client.post(&self.endpoint).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), "oracle responded");
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<OracleReply>()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}
