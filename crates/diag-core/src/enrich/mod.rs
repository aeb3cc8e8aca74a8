//! AI enrichment with bounded latency and grounded output.
//!
//! [`Enricher`] wraps a [`ReasoningOracle`] with the policy the pipeline
//! depends on:
//!
//! - a hard timeout around the whole call, retry included
//! - at most one fast retry, and only for transient failures
//! - grounding of the reply against the supplied definition
//!
//! Any failure becomes [`EnrichOutcome::Unavailable`]; the orchestrator turns
//! that into generic fallback content. Nothing here returns an error.

pub mod grounding;
pub mod http;
pub mod oracle;

use std::sync::Arc;
use std::time::Duration;

use obd_catalog::{CodeDefinition, VehicleContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::result::{rank_causes, RankedCause};
use crate::symptoms::SymptomTag;

pub use grounding::{ground, GroundedRanking};
pub use http::HttpOracle;
pub use oracle::{NoOracle, OracleError, OracleReply, OracleRequest, ReasoningOracle};

/// Why enrichment produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum UnavailableReason {
    /// AI enrichment is switched off
    Disabled,
    /// The deadline passed before the oracle answered
    Timeout,
    /// The oracle call failed
    OracleFailed(String),
    /// The oracle answered, but with nothing traceable to the supplied facts
    Ungrounded,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Timeout => f.write_str("timeout"),
            Self::OracleFailed(detail) => write!(f, "oracle failed: {detail}"),
            Self::Ungrounded => f.write_str("ungrounded reply"),
        }
    }
}

/// Result of an enrichment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Enriched {
        causes: Vec<RankedCause>,
        fixes: Vec<String>,
    },
    Unavailable(UnavailableReason),
}

/// Timeout, retry and truncation settings.
#[derive(Debug, Clone)]
pub struct EnrichPolicy {
    /// Deadline for the whole call, retry included.
    pub timeout: Duration,
    /// Retry once on a transient failure.
    pub retry_transient: bool,
    /// Keep at most this many causes.
    pub max_causes: usize,
}

impl Default for EnrichPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_500),
            retry_transient: true,
            max_causes: 5,
        }
    }
}

/// Oracle adapter used by the pipeline.
#[derive(Clone)]
pub struct Enricher {
    oracle: Arc<dyn ReasoningOracle>,
    policy: EnrichPolicy,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("oracle", &self.oracle.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Enricher {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, policy: EnrichPolicy) -> Self {
        Self { oracle, policy }
    }

    /// Enricher that always reports [`UnavailableReason::Disabled`].
    pub fn disabled(policy: EnrichPolicy) -> Self {
        Self::new(Arc::new(NoOracle), policy)
    }

    /// Build from configuration. Falls back to a disabled enricher when the
    /// oracle is switched off, has no endpoint, or its client cannot be built.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let policy = config.enrich_policy();
        if !config.oracle.is_active() {
            info!(enabled = config.oracle.enabled, "AI enrichment disabled");
            return Self::disabled(policy);
        }
        match HttpOracle::from_config(&config.oracle) {
            Ok(oracle) => {
                info!(endpoint = oracle.endpoint(), "AI enrichment enabled");
                Self::new(Arc::new(oracle), policy)
            }
            Err(e) => {
                warn!(error = %e, "oracle client unavailable, enrichment disabled");
                Self::disabled(policy)
            }
        }
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn policy(&self) -> &EnrichPolicy {
        &self.policy
    }

    /// Ask the oracle to rank `definition` for `vehicle`.
    ///
    /// Dropping the returned future abandons the in-flight oracle call and
    /// releases its connection.
    #[instrument(skip_all, fields(code = %definition.code, oracle = self.oracle.name()))]
    pub async fn enrich(
        &self,
        definition: &CodeDefinition,
        vehicle: &VehicleContext,
        symptoms: &[SymptomTag],
    ) -> EnrichOutcome {
        let request = OracleRequest {
            definition: definition.clone(),
            vehicle_context: vehicle.clone(),
            symptoms: symptoms.to_vec(),
        };

        let reply = match tokio::time::timeout(self.policy.timeout, self.call(&request)).await {
            Err(_) => {
                warn!(timeout_ms = self.policy.timeout.as_millis() as u64, "oracle deadline exceeded");
                return EnrichOutcome::Unavailable(UnavailableReason::Timeout);
            }
            Ok(Err(OracleError::NotConfigured)) => {
                return EnrichOutcome::Unavailable(UnavailableReason::Disabled);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "oracle call failed");
                return EnrichOutcome::Unavailable(UnavailableReason::OracleFailed(e.to_string()));
            }
            Ok(Ok(reply)) => reply,
        };

        match ground(definition, &reply, self.policy.max_causes) {
            None => {
                warn!(returned = reply.causes.len(), "oracle reply had no grounded causes");
                EnrichOutcome::Unavailable(UnavailableReason::Ungrounded)
            }
            Some(grounded) => {
                if grounded.discarded > 0 {
                    warn!(discarded = grounded.discarded, "discarded ungrounded oracle items");
                }
                EnrichOutcome::Enriched {
                    causes: rank_causes(grounded.causes),
                    fixes: grounded.fixes,
                }
            }
        }
    }

    async fn call(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        match self.oracle.rank(request).await {
            Err(e) if e.is_transient() && self.policy.retry_transient => {
                debug!(error = %e, "retrying oracle once after transient failure");
                self.oracle.rank(request).await
            }
            other => other,
        }
    }
}
