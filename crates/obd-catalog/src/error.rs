//! Error types for obd-catalog

use thiserror::Error;

/// Why a string could not become a [`crate::TroubleCode`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeFormatError {
    /// First character is a letter outside the P/B/C/U namespace
    #[error("unknown code category '{0}'")]
    UnknownCategory(char),

    /// Wrong length, missing category letter or non-digit body
    #[error("malformed trouble code: {0:?}")]
    Malformed(String),
}

/// Errors that can occur while loading or reading the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Dataset JSON could not be parsed
    #[error("Dataset parse failed: {0}")]
    Parse(String),

    /// A dataset record carries a code that is not a valid trouble code
    #[error("Invalid code in dataset record {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: CodeFormatError,
    },

    /// The same code appears twice in the dataset
    #[error("Duplicate code in dataset: {0}")]
    DuplicateCode(String),

    /// A record has an empty description
    #[error("Empty description for code {0}")]
    EmptyDescription(String),

    /// Dataset file could not be read
    #[error("Dataset IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog snapshot could not be taken
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(err.to_string())
    }
}
