//! OBD-Catalog: Immutable Trouble Code Catalog
//!
//! This crate owns the reference data for the diagnostic pipeline: the
//! trouble-code namespace, canonical code definitions and vehicle-specific
//! overrides, loaded once from a versioned JSON dataset.
//!
//! ## Layer 0 - Reference Data
//!
//! Focus: Data integrity, read-only sharing and whole-catalog reloads.
//!
//! ## Key Components
//!
//! - `TroubleCode`: Validated code identifier (`P0171`, `U0100`, ...)
//! - `CodeCatalog`: Sanitised, indexed dataset with O(1) lookup
//! - `CatalogHandle`: Load-and-swap entry point shared by concurrent requests

mod catalog;
mod code;
mod definition;
mod error;
pub mod sanitize;
mod vehicle;

pub use catalog::{CatalogDigest, CatalogHandle, CatalogSource, CodeCatalog, ResolvedDefinition};
pub use code::{CodeCategory, TroubleCode};
pub use definition::{
    CodeDefinition, Dataset, DatasetRecord, VehicleOverride, GENERIC_CAUSES, GENERIC_FIXES,
};
pub use error::{CatalogError, CodeFormatError};
pub use vehicle::VehicleContext;

/// Result type for obd-catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
