//! Immutable code catalog and its load-and-swap handle.
//!
//! A [`CodeCatalog`] is built once from a dataset and never mutated. Requests
//! read it through an `Arc` snapshot taken from [`CatalogHandle`], so a reload
//! replaces the whole catalog for later requests without disturbing requests
//! already in flight.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::code::{CodeCategory, TroubleCode};
use crate::definition::{
    CodeDefinition, Dataset, VehicleOverride, GENERIC_CAUSES, GENERIC_FIXES,
};
use crate::error::CatalogError;
use crate::sanitize::{merge_front, normalize_whitespace, sanitize_items};
use crate::vehicle::VehicleContext;
use crate::Result;

const BUILTIN_DATASET: &str = include_str!("../data/obd_codes.json");

/// SHA-256 hex digest of the dataset bytes a catalog was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogDigest(String);

impl CatalogDigest {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        CatalogDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for CatalogDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which part of the dataset supplied a resolved definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Base,
    VehicleOverride,
}

/// A definition as seen by one request: the base record, or a new record with
/// vehicle-specific items merged ahead of the base items.
#[derive(Debug, Clone)]
pub struct ResolvedDefinition {
    pub definition: Arc<CodeDefinition>,
    pub source: CatalogSource,
}

/// Read-only map from trouble code to canonical definition.
#[derive(Debug)]
pub struct CodeCatalog {
    version: String,
    digest: CatalogDigest,
    definitions: HashMap<TroubleCode, Arc<CodeDefinition>>,
    overrides: HashMap<TroubleCode, Vec<VehicleOverride>>,
}

fn or_generic(items: Vec<String>, generic: &[&str]) -> Vec<String> {
    if items.is_empty() {
        generic.iter().map(|s| s.to_string()).collect()
    } else {
        items
    }
}

impl CodeCatalog {
    /// Catalog built from the dataset shipped with this crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DATASET.as_bytes())
    }

    /// Load a dataset file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let catalog = Self::from_json(&bytes)?;
        info!(
            path = %path.display(),
            version = %catalog.version,
            codes = catalog.len(),
            "Loaded code catalog"
        );
        Ok(catalog)
    }

    /// Parse and validate dataset JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let dataset: Dataset = serde_json::from_slice(bytes)?;
        Self::from_dataset(dataset, CatalogDigest::from_bytes(bytes))
    }

    /// Validate, sanitise and index a dataset.
    ///
    /// Rejects invalid codes, duplicate codes and empty descriptions. Records
    /// without causes or fixes receive the generic lists.
    pub fn from_dataset(dataset: Dataset, digest: CatalogDigest) -> Result<Self> {
        let mut definitions = HashMap::with_capacity(dataset.codes.len());

        for (index, record) in dataset.codes.into_iter().enumerate() {
            let code = TroubleCode::try_from(record.code.as_str())
                .map_err(|source| CatalogError::InvalidRecord { index, source })?;

            let description = normalize_whitespace(&record.description);
            if description.is_empty() {
                return Err(CatalogError::EmptyDescription(code.to_string()));
            }

            let definition = CodeDefinition {
                code: code.clone(),
                description,
                symptoms: sanitize_items(&record.symptoms),
                causes: or_generic(sanitize_items(&record.causes), GENERIC_CAUSES),
                fixes: or_generic(sanitize_items(&record.fixes), GENERIC_FIXES),
            };

            if definitions.insert(code.clone(), Arc::new(definition)).is_some() {
                return Err(CatalogError::DuplicateCode(code.to_string()));
            }
        }

        let mut overrides: HashMap<TroubleCode, Vec<VehicleOverride>> = HashMap::new();
        for mut ov in dataset.overrides {
            if !definitions.contains_key(&ov.code) {
                debug!(code = %ov.code, "Skipping override for code absent from dataset");
                continue;
            }
            ov.known_issues = sanitize_items(&ov.known_issues);
            ov.priority_checks = sanitize_items(&ov.priority_checks);
            overrides.entry(ov.code.clone()).or_default().push(ov);
        }

        Ok(Self {
            version: dataset.version,
            digest,
            definitions,
            overrides,
        })
    }

    /// O(1) lookup of the base definition.
    pub fn lookup(&self, code: &TroubleCode) -> Option<Arc<CodeDefinition>> {
        self.definitions.get(code).cloned()
    }

    /// Look up a code and apply the most specific matching vehicle override.
    pub fn resolve(&self, code: &TroubleCode, ctx: &VehicleContext) -> Option<ResolvedDefinition> {
        let base = self.lookup(code)?;

        let best = self
            .overrides
            .get(code)
            .into_iter()
            .flatten()
            .filter(|ov| ov.matches(ctx))
            .max_by_key(|ov| ov.specificity());

        let Some(ov) = best else {
            return Some(ResolvedDefinition {
                definition: base,
                source: CatalogSource::Base,
            });
        };

        let merged = CodeDefinition {
            code: base.code.clone(),
            description: base.description.clone(),
            symptoms: base.symptoms.clone(),
            causes: merge_front(&ov.known_issues, &base.causes),
            fixes: merge_front(&ov.priority_checks, &base.fixes),
        };
        Some(ResolvedDefinition {
            definition: Arc::new(merged),
            source: CatalogSource::VehicleOverride,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn digest(&self) -> &CatalogDigest {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// All codes in sorted order.
    pub fn codes(&self) -> Vec<&TroubleCode> {
        let mut codes: Vec<_> = self.definitions.keys().collect();
        codes.sort();
        codes
    }

    /// Code count per category.
    pub fn category_counts(&self) -> BTreeMap<CodeCategory, usize> {
        let mut counts = BTreeMap::new();
        for code in self.definitions.keys() {
            *counts.entry(code.category()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of override records across all codes.
    pub fn override_count(&self) -> usize {
        self.overrides.values().map(Vec::len).sum()
    }
}

/// Shared entry point to the current catalog.
///
/// Readers take an `Arc` snapshot; [`CatalogHandle::swap`] installs a new
/// catalog for subsequent snapshots.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<CodeCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: CodeCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// The catalog in effect right now.
    pub fn snapshot(&self) -> Result<Arc<CodeCatalog>> {
        self.current
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|e| CatalogError::Unavailable(e.to_string()))
    }

    /// Replace the catalog, returning the previous one.
    pub fn swap(&self, next: CodeCatalog) -> Result<Arc<CodeCatalog>> {
        let next = Arc::new(next);
        let mut guard = self
            .current
            .write()
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;
        info!(
            from = %guard.digest().short(),
            to = %next.digest().short(),
            version = %next.version(),
            "Swapped code catalog"
        );
        Ok(std::mem::replace(&mut *guard, next))
    }
}
