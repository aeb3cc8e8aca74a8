//! Lexical validation of code candidates.
//!
//! Pure: the catalog is never consulted here, so "malformed code" and
//! "well-formed but unknown code" stay distinct outcomes.

use obd_catalog::{CodeFormatError, TroubleCode};

use crate::request::CodeCandidate;

/// Result of checking a candidate against the trouble-code namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid(TroubleCode),
    InvalidFormat,
    UnknownCategory,
}

/// Turn a candidate into a [`TroubleCode`] or say why it cannot be one.
pub fn validate(candidate: &CodeCandidate) -> ValidationOutcome {
    match TroubleCode::try_from(candidate.as_str()) {
        Ok(code) => ValidationOutcome::Valid(code),
        Err(CodeFormatError::UnknownCategory(_)) => ValidationOutcome::UnknownCategory,
        Err(CodeFormatError::Malformed(_)) => ValidationOutcome::InvalidFormat,
    }
}
