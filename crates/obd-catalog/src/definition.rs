//! Canonical code definitions and the on-disk dataset schema.

use serde::{Deserialize, Serialize};

use crate::code::TroubleCode;
use crate::vehicle::VehicleContext;

/// Causes used when a dataset record lists none, so a resolved definition
/// always has something to rank.
pub const GENERIC_CAUSES: &[&str] = &[
    "Faulty sensor",
    "Wiring or connector issue",
    "ECM software fault",
];

/// Checks used when a dataset record lists none.
pub const GENERIC_FIXES: &[&str] = &[
    "Inspect wiring",
    "Check connectors",
    "Clear code and retest",
];

/// Canonical, read-only record for one trouble code.
///
/// `causes` is ordered by generic prevalence; it is never empty once the
/// definition has been loaded into a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDefinition {
    pub code: TroubleCode,
    pub description: String,
    pub symptoms: Vec<String>,
    pub causes: Vec<String>,
    pub fixes: Vec<String>,
}

/// Top-level dataset document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Free-form dataset version, e.g. `2024.06`
    pub version: String,
    pub codes: Vec<DatasetRecord>,
    #[serde(default)]
    pub overrides: Vec<VehicleOverride>,
}

/// One `{code, description, symptoms, causes[], fixes[]}` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub causes: Vec<String>,
    #[serde(default)]
    pub fixes: Vec<String>,
}

/// Vehicle-specific known issues for a code.
///
/// `make` is required; `model`, `year` and `engine` narrow the match when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleOverride {
    pub code: TroubleCode,
    pub make: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub known_issues: Vec<String>,
    #[serde(default)]
    pub priority_checks: Vec<String>,
}

fn same_text(a: &str, b: Option<&str>) -> bool {
    b.is_some_and(|b| a.eq_ignore_ascii_case(b.trim()))
}

impl VehicleOverride {
    /// Whether this override applies to `ctx`. Unset override fields match anything.
    pub fn matches(&self, ctx: &VehicleContext) -> bool {
        if !same_text(&self.make, ctx.make.as_deref()) {
            return false;
        }
        if let Some(model) = &self.model {
            if !same_text(model, ctx.model.as_deref()) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if ctx.year != Some(year) {
                return false;
            }
        }
        if let Some(engine) = &self.engine {
            if !same_text(engine, ctx.engine.as_deref()) {
                return false;
            }
        }
        true
    }

    /// Number of narrowing fields; the most specific match wins.
    pub fn specificity(&self) -> usize {
        1 + usize::from(self.model.is_some())
            + usize::from(self.year.is_some())
            + usize::from(self.engine.is_some())
    }
}
