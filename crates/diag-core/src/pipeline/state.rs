//! Request state machine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Why the user has to rephrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationReason {
    NoCode,
    Ambiguous,
}

/// User-facing failure classes. Each maps to exactly one reply template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum FailureKind {
    ClarificationNeeded(ClarificationReason),
    InvalidCode,
    UnknownCode,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClarificationNeeded(_) => "clarification_needed",
            Self::InvalidCode => "invalid_code",
            Self::UnknownCode => "unknown_code",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Parsed,
    Validated,
    CatalogResolved,
    Enriched,
    FallenBack,
    Formatted,
    Done,
    Failed(FailureKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Legal edges. Any non-terminal state may fail; terminal states absorb.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed(_)) {
            return true;
        }
        matches!(
            (self, next),
            (Received, Parsed)
                | (Parsed, Validated)
                | (Validated, CatalogResolved)
                | (CatalogResolved, Enriched)
                | (CatalogResolved, FallenBack)
                | (Enriched, Formatted)
                | (FallenBack, Formatted)
                | (Formatted, Done)
        )
    }
}

/// States a request passed through, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTrace {
    states: Vec<PipelineState>,
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTrace {
    /// Trace starting in `Received`.
    pub fn new() -> Self {
        Self {
            states: vec![PipelineState::Received],
        }
    }

    pub fn current(&self) -> PipelineState {
        // never empty: constructed with Received and only ever pushed to
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Received)
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    /// Move to `next`, rejecting illegal edges.
    pub fn advance(&mut self, next: PipelineState) -> PipelineResult<()> {
        let current = self.current();
        if !current.can_transition_to(&next) {
            return Err(PipelineError::Internal(format!(
                "illegal state transition {current:?} -> {next:?}"
            )));
        }
        debug!(from = ?current, to = ?next, "pipeline transition");
        self.states.push(next);
        Ok(())
    }

    /// Fail from wherever the trace stands; no-op once terminal.
    pub fn fail(&mut self, kind: FailureKind) {
        if !self.current().is_terminal() {
            debug!(from = ?self.current(), ?kind, "pipeline failed");
            self.states.push(PipelineState::Failed(kind));
        }
    }
}
