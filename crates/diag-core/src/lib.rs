//! Diagnostic Core Library
//!
//! Turns a free-text trouble-code message into a grounded, provenance-tagged
//! diagnosis. Parsing and validation are pure; catalog lookups read an
//! immutable snapshot; the reasoning oracle is the only effectful step and
//! always has a fallback.

pub mod config;
pub mod enrich;
pub mod error;
pub mod fakes;
pub mod formatter;
pub mod interaction_log;
pub mod obs;
pub mod parser;
pub mod pipeline;
pub mod request;
pub mod result;
pub mod symptoms;
pub mod telemetry;
pub mod validator;

pub use config::{LogConfig, OracleConfig, PipelineConfig};

pub use enrich::{
    EnrichOutcome, EnrichPolicy, Enricher, HttpOracle, NoOracle, OracleError, OracleReply,
    OracleRequest, ReasoningOracle, UnavailableReason,
};

pub use error::{ConfigError, LogSinkError, PipelineError, PipelineResult};

pub use formatter::{format, format_failure, Section, SectionStyle, StructuredText};

pub use interaction_log::{
    InteractionLog, InteractionRecord, JsonlInteractionLog, TracingInteractionLog,
};

pub use pipeline::{
    ClarificationReason, DiagnosticReply, FailureKind, PipelineOrchestrator, PipelineState,
    ReplyOutcome, StateTrace,
};

pub use request::{CodeCandidate, DiagnosticRequest, ParseOutcome};
pub use result::{DiagnosticResult, Provenance, RankedCause};
pub use symptoms::SymptomTag;
pub use validator::{validate, ValidationOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
