//! Structured diagnostic result handed to the formatter.

use std::sync::Arc;

use obd_catalog::{CatalogSource, CodeDefinition, VehicleContext};
use serde::{Deserialize, Serialize};

/// Where the cause ordering came from.
///
/// Every result carries one, so fallback content can never pass as AI-ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Ranked by the reasoning oracle and grounded against the definition.
    AiRanked,
    /// Default dataset order; enrichment was unavailable or disabled.
    GenericFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiRanked => "ai_ranked",
            Self::GenericFallback => "generic_fallback",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cause at a 1-based likelihood position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCause {
    pub rank: usize,
    pub text: String,
}

/// Number an ordered cause list from 1.
pub fn rank_causes(causes: impl IntoIterator<Item = String>) -> Vec<RankedCause> {
    causes
        .into_iter()
        .enumerate()
        .map(|(i, text)| RankedCause { rank: i + 1, text })
        .collect()
}

/// Immutable outcome of a successful diagnosis.
#[derive(Debug, Clone)]
pub struct DiagnosticResult {
    pub definition: Arc<CodeDefinition>,
    pub causes: Vec<RankedCause>,
    pub fixes: Vec<String>,
    /// Whether the reply needs caveats: fallback ordering or no vehicle.
    pub disclaimer: bool,
    pub provenance: Provenance,
    pub catalog_source: CatalogSource,
}

impl DiagnosticResult {
    /// Result ordered by the oracle. Caveated only when the vehicle is unknown.
    pub fn ai_ranked(
        definition: Arc<CodeDefinition>,
        causes: Vec<RankedCause>,
        fixes: Vec<String>,
        catalog_source: CatalogSource,
        vehicle: &VehicleContext,
    ) -> Self {
        Self {
            definition,
            causes,
            fixes,
            disclaimer: vehicle.is_empty(),
            provenance: Provenance::AiRanked,
            catalog_source,
        }
    }

    /// Result in dataset order, used when enrichment is unavailable.
    pub fn fallback(
        definition: Arc<CodeDefinition>,
        catalog_source: CatalogSource,
        max_causes: usize,
    ) -> Self {
        let causes = rank_causes(definition.causes.iter().take(max_causes).cloned());
        let fixes = definition.fixes.clone();
        Self {
            definition,
            causes,
            fixes,
            disclaimer: true,
            provenance: Provenance::GenericFallback,
            catalog_source,
        }
    }
}
