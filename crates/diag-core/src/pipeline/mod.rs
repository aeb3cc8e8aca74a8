//! Request pipeline: state machine and orchestrator.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{DiagnosticReply, PipelineOrchestrator, ReplyOutcome};
pub use state::{ClarificationReason, FailureKind, PipelineState, StateTrace};
