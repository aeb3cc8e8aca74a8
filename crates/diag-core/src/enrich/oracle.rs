//! Reasoning oracle seam.
//!
//! The oracle is an opaque remote service that re-ranks and rephrases the
//! causes and fixes it is given. Implementations only move bytes; timeout,
//! retry and grounding live in [`super::Enricher`].

use async_trait::async_trait;
use obd_catalog::{CodeDefinition, VehicleContext};
use serde::{Deserialize, Serialize};

use crate::symptoms::SymptomTag;

/// Wire request: the supplied facts and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub definition: CodeDefinition,
    pub vehicle_context: VehicleContext,
    #[serde(default)]
    pub symptoms: Vec<SymptomTag>,
}

/// Wire reply: causes most likely first, fixes in suggested order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReply {
    #[serde(default)]
    pub causes: Vec<String>,
    #[serde(default)]
    pub fixes: Vec<String>,
}

/// Errors produced by an oracle call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle request timed out")]
    Timeout,

    #[error("oracle returned HTTP {status}")]
    Status { status: u16 },

    #[error("oracle reply could not be decoded: {0}")]
    Decode(String),

    #[error("oracle is not configured")]
    NotConfigured,
}

impl OracleError {
    /// Transient failures are worth one fast retry; everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::NotConfigured => false,
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout
        } else if let Some(status) = err.status() {
            OracleError::Status {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            OracleError::Decode(err.to_string())
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

/// Remote ranking service.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Rank the supplied causes and fixes.
    async fn rank(&self, request: &OracleRequest) -> Result<OracleReply, OracleError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Oracle used when AI enrichment is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOracle;

#[async_trait]
impl ReasoningOracle for NoOracle {
    async fn rank(&self, _request: &OracleRequest) -> Result<OracleReply, OracleError> {
        Err(OracleError::NotConfigured)
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(OracleError::Timeout.is_transient());
        assert!(OracleError::Transport("reset".into()).is_transient());
        assert!(OracleError::Status { status: 503 }.is_transient());
        assert!(OracleError::Status { status: 429 }.is_transient());
        assert!(!OracleError::Status { status: 400 }.is_transient());
        assert!(!OracleError::Decode("bad".into()).is_transient());
        assert!(!OracleError::NotConfigured.is_transient());
    }

    #[test]
    fn test_reply_tolerates_missing_fields() {
        let reply: OracleReply = serde_json::from_str(r#"{"causes": ["Vacuum leak"]}"#).unwrap();
        assert_eq!(reply.causes, vec!["Vacuum leak"]);
        assert!(reply.fixes.is_empty());
    }
}
