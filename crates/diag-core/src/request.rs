//! Per-request values produced before any lookup happens.

use chrono::{DateTime, Utc};
use obd_catalog::VehicleContext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parser;
use crate::symptoms::{symptom_tags, SymptomTag};

/// A code-shaped token found in free text, normalised (upper-case letter,
/// `O` read as `0`) but not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeCandidate(String);

impl CodeCandidate {
    pub fn new(token: impl Into<String>) -> Self {
        CodeCandidate(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CodeCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of scanning raw text for a trouble code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(CodeCandidate, VehicleContext),
    NoCodeFound,
    /// Two or more distinct code tokens; the parser never picks one.
    AmbiguousMultipleCodes(Vec<CodeCandidate>),
}

/// Immutable record of one inbound message.
#[derive(Debug, Clone)]
pub struct DiagnosticRequest {
    pub request_id: Uuid,
    pub requester_id: String,
    pub raw_text: String,
    pub parse: ParseOutcome,
    pub symptoms: Vec<SymptomTag>,
    pub received_at: DateTime<Utc>,
}

impl DiagnosticRequest {
    /// Parse `raw_text` and capture the request envelope.
    pub fn new(raw_text: &str, requester_id: &str, received_at: DateTime<Utc>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            requester_id: requester_id.to_string(),
            raw_text: raw_text.to_string(),
            parse: parser::parse(raw_text),
            symptoms: symptom_tags(raw_text),
            received_at,
        }
    }

    /// Vehicle context from a successful parse; empty otherwise.
    pub fn vehicle(&self) -> VehicleContext {
        match &self.parse {
            ParseOutcome::Parsed(_, ctx) => ctx.clone(),
            _ => VehicleContext::default(),
        }
    }

    pub fn candidate(&self) -> Option<&CodeCandidate> {
        match &self.parse {
            ParseOutcome::Parsed(c, _) => Some(c),
            _ => None,
        }
    }
}
