//! Structured lifecycle events for diagnostic requests.
//!
//! - [`RequestSpan`] scopes a request's logs under its `request_id`
//! - `emit_*` functions log the key events: received, failed, enrichment
//!   fallback and completed
//!
//! Events are logged at `info!` except failures and fallbacks, which use
//! `warn!`.

use std::future::Future;

use tracing::instrument::Instrumented;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Request-scoped tracing span, attached to the request future with
/// [`RequestSpan::scope`] so it follows the future across awaits.
#[derive(Debug, Clone)]
pub struct RequestSpan {
    span: tracing::Span,
}

impl RequestSpan {
    pub fn new(request_id: &Uuid, requester_id: &str) -> Self {
        let span = tracing::info_span!(
            "obd.request",
            request_id = %request_id,
            requester_id = %requester_id,
        );
        Self { span }
    }

    /// Run `fut` inside the span.
    pub fn scope<F: Future>(&self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span.clone())
    }
}

/// Emit event: request received.
pub fn emit_request_received(request_id: &Uuid, text_len: usize) {
    info!(event = "request.received", request_id = %request_id, text_len = text_len);
}

/// Emit event: request ended in a user-facing failure.
pub fn emit_request_failed(request_id: &Uuid, kind: &str) {
    warn!(event = "request.failed", request_id = %request_id, kind = %kind);
}

/// Emit event: enrichment unavailable, default ordering used.
pub fn emit_enrich_fallback(request_id: &Uuid, code: &str, reason: &dyn std::fmt::Display) {
    warn!(
        event = "enrich.fallback",
        request_id = %request_id,
        code = %code,
        reason = %reason,
    );
}

/// Emit event: reply produced.
pub fn emit_request_completed(request_id: &Uuid, outcome: &str, duration_ms: u64) {
    info!(
        event = "request.completed",
        request_id = %request_id,
        outcome = %outcome,
        duration_ms = duration_ms,
    );
}

/// Emit event: interaction record could not be written.
pub fn emit_log_sink_error(request_id: &Uuid, error: &dyn std::fmt::Display) {
    warn!(event = "interaction_log.error", request_id = %request_id, error = %error);
}
