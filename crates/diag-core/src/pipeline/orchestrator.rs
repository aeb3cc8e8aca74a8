//! Pipeline orchestrator.
//!
//! Drives one request through parse, validate, catalog lookup, enrichment and
//! formatting, recording each step in a [`StateTrace`]. Every request gets a
//! reply: user-facing failures and internal errors alike end in a template.
//!
//! The orchestrator holds no per-request state, so one instance behind an
//! `Arc` serves any number of concurrent requests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use obd_catalog::CatalogHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use super::state::{ClarificationReason, FailureKind, PipelineState, StateTrace};
use crate::enrich::{EnrichOutcome, Enricher};
use crate::error::{PipelineError, PipelineResult};
use crate::formatter::{format, format_failure, StructuredText};
use crate::interaction_log::{InteractionLog, InteractionRecord};
use crate::obs::{
    emit_enrich_fallback, emit_log_sink_error, emit_request_completed, emit_request_failed,
    emit_request_received, RequestSpan,
};
use crate::request::{CodeCandidate, DiagnosticRequest, ParseOutcome};
use crate::result::{DiagnosticResult, Provenance};
use crate::validator::{validate, ValidationOutcome};

/// What kind of reply the requester got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReplyOutcome {
    Diagnosed { provenance: Provenance },
    ClarificationNeeded,
    InvalidCode,
    UnknownCode,
}

impl ReplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diagnosed { .. } => "diagnosed",
            Self::ClarificationNeeded => "clarification_needed",
            Self::InvalidCode => "invalid_code",
            Self::UnknownCode => "unknown_code",
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Self::Diagnosed { provenance } => Some(*provenance),
            _ => None,
        }
    }
}

impl From<FailureKind> for ReplyOutcome {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::ClarificationNeeded(_) => Self::ClarificationNeeded,
            FailureKind::InvalidCode => Self::InvalidCode,
            FailureKind::UnknownCode => Self::UnknownCode,
        }
    }
}

/// Reply to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReply {
    pub request_id: Uuid,
    pub outcome: ReplyOutcome,
    pub text: StructuredText,
    pub trace: StateTrace,
}

struct Rendered {
    outcome: ReplyOutcome,
    text: StructuredText,
    code: Option<String>,
}

impl Rendered {
    fn failure(kind: FailureKind, candidate: Option<CodeCandidate>) -> Self {
        Self {
            outcome: kind.into(),
            text: format_failure(kind, candidate.as_ref()),
            code: candidate.map(|c| c.as_str().to_string()),
        }
    }
}

/// Interaction log writes still in flight.
#[derive(Debug, Default)]
struct PendingLogs {
    count: AtomicUsize,
    idle: Notify,
}

/// Marks one log write finished when dropped, including on panic.
struct PendingGuard(Arc<PendingLogs>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

pub struct PipelineOrchestrator {
    catalog: Arc<CatalogHandle>,
    enricher: Enricher,
    log: Arc<dyn InteractionLog>,
    pending: Arc<PendingLogs>,
}

impl PipelineOrchestrator {
    pub fn new(
        catalog: Arc<CatalogHandle>,
        enricher: Enricher,
        log: Arc<dyn InteractionLog>,
    ) -> Self {
        Self {
            catalog,
            enricher,
            log,
            pending: Arc::default(),
        }
    }

    /// Handle used for catalog reloads.
    pub fn catalog(&self) -> &Arc<CatalogHandle> {
        &self.catalog
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Interaction records handed to the sink but not yet written.
    pub fn pending_logs(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Wait until every interaction record handed out so far has been
    /// written or has failed. Call before shutting the runtime down.
    pub async fn flush_logs(&self) {
        loop {
            let idle = self.pending.idle.notified();
            if self.pending_logs() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Run one message through the pipeline. Never fails.
    pub async fn handle(
        &self,
        raw_text: &str,
        requester_id: &str,
        received_at: DateTime<Utc>,
    ) -> DiagnosticReply {
        let request = DiagnosticRequest::new(raw_text, requester_id, received_at);
        let span = RequestSpan::new(&request.request_id, requester_id);
        span.scope(self.process(request)).await
    }

    /// Like [`handle`](Self::handle), but gives up when `cancel` completes
    /// first. The in-flight oracle call is dropped and nothing is logged.
    pub async fn handle_until<C>(
        &self,
        raw_text: &str,
        requester_id: &str,
        received_at: DateTime<Utc>,
        cancel: C,
    ) -> PipelineResult<DiagnosticReply>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            reply = self.handle(raw_text, requester_id, received_at) => Ok(reply),
            _ = cancel => {
                info!(requester_id = %requester_id, "request cancelled");
                Err(PipelineError::Cancelled)
            }
        }
    }

    async fn process(&self, request: DiagnosticRequest) -> DiagnosticReply {
        let started = Instant::now();
        emit_request_received(&request.request_id, request.raw_text.len());

        let mut trace = StateTrace::new();
        let rendered = match self.run(&request, &mut trace).await {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(request_id = %request.request_id, error = %e, "internal pipeline error");
                trace.fail(FailureKind::UnknownCode);
                Rendered::failure(FailureKind::UnknownCode, request.candidate().cloned())
            }
        };

        if !matches!(rendered.outcome, ReplyOutcome::Diagnosed { .. }) {
            emit_request_failed(&request.request_id, rendered.outcome.as_str());
        }
        emit_request_completed(
            &request.request_id,
            rendered.outcome.as_str(),
            started.elapsed().as_millis() as u64,
        );

        self.log_interaction(&request, &rendered);

        DiagnosticReply {
            request_id: request.request_id,
            outcome: rendered.outcome,
            text: rendered.text,
            trace,
        }
    }

    async fn run(
        &self,
        request: &DiagnosticRequest,
        trace: &mut StateTrace,
    ) -> PipelineResult<Rendered> {
        let (candidate, vehicle) = match &request.parse {
            ParseOutcome::Parsed(candidate, vehicle) => (candidate, vehicle),
            ParseOutcome::NoCodeFound => {
                let kind = FailureKind::ClarificationNeeded(ClarificationReason::NoCode);
                trace.fail(kind);
                return Ok(Rendered::failure(kind, None));
            }
            ParseOutcome::AmbiguousMultipleCodes(_) => {
                let kind = FailureKind::ClarificationNeeded(ClarificationReason::Ambiguous);
                trace.fail(kind);
                return Ok(Rendered::failure(kind, None));
            }
        };
        trace.advance(PipelineState::Parsed)?;

        let code = match validate(candidate) {
            ValidationOutcome::Valid(code) => code,
            ValidationOutcome::InvalidFormat | ValidationOutcome::UnknownCategory => {
                trace.fail(FailureKind::InvalidCode);
                return Ok(Rendered::failure(
                    FailureKind::InvalidCode,
                    Some(candidate.clone()),
                ));
            }
        };
        trace.advance(PipelineState::Validated)?;

        let catalog = self.catalog.snapshot()?;
        let resolved = match catalog.resolve(&code, vehicle) {
            Some(resolved) => resolved,
            None => {
                trace.fail(FailureKind::UnknownCode);
                return Ok(Rendered::failure(
                    FailureKind::UnknownCode,
                    Some(candidate.clone()),
                ));
            }
        };
        trace.advance(PipelineState::CatalogResolved)?;

        let max_causes = self.enricher.policy().max_causes;
        let result = match self
            .enricher
            .enrich(&resolved.definition, vehicle, &request.symptoms)
            .await
        {
            EnrichOutcome::Enriched { causes, fixes } => {
                trace.advance(PipelineState::Enriched)?;
                DiagnosticResult::ai_ranked(
                    resolved.definition,
                    causes,
                    fixes,
                    resolved.source,
                    vehicle,
                )
            }
            EnrichOutcome::Unavailable(reason) => {
                emit_enrich_fallback(&request.request_id, code.as_str(), &reason);
                trace.advance(PipelineState::FallenBack)?;
                DiagnosticResult::fallback(resolved.definition, resolved.source, max_causes)
            }
        };

        let text = format(&result, vehicle);
        trace.advance(PipelineState::Formatted)?;
        trace.advance(PipelineState::Done)?;

        Ok(Rendered {
            outcome: ReplyOutcome::Diagnosed {
                provenance: result.provenance,
            },
            text,
            code: Some(code.to_string()),
        })
    }

    fn log_interaction(&self, request: &DiagnosticRequest, rendered: &Rendered) {
        let record = InteractionRecord {
            request_id: request.request_id,
            requester_id: request.requester_id.clone(),
            raw_text: request.raw_text.clone(),
            code: rendered.code.clone(),
            symptoms: request.symptoms.clone(),
            structured_response: rendered.text.to_string(),
            outcome: rendered.outcome,
            provenance: rendered.outcome.provenance(),
            timestamp: request.received_at,
        };
        let log = Arc::clone(&self.log);
        self.pending.count.fetch_add(1, Ordering::SeqCst);
        let done = PendingGuard(Arc::clone(&self.pending));
        tokio::spawn(
            async move {
                let _done = done;
                if let Err(e) = log.record(&record).await {
                    emit_log_sink_error(&record.request_id, &e);
                }
            }
            .in_current_span(),
        );
    }
}
