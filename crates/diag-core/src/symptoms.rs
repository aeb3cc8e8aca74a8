//! Keyword tagging of reported symptoms.

use serde::{Deserialize, Serialize};

/// Normalised symptom reported in the free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomTag {
    RoughIdle,
    LowPower,
    StuckInGear,
    HardStart,
    Stalling,
}

impl std::fmt::Display for SymptomTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RoughIdle => "rough idle",
            Self::LowPower => "low power",
            Self::StuckInGear => "stuck in gear",
            Self::HardStart => "hard start",
            Self::Stalling => "stalling",
        };
        f.write_str(s)
    }
}

const KEYWORDS: &[(&str, SymptomTag)] = &[
    ("shaking", SymptomTag::RoughIdle),
    ("vibrating", SymptomTag::RoughIdle),
    ("rough idle", SymptomTag::RoughIdle),
    ("judder", SymptomTag::RoughIdle),
    ("low power", SymptomTag::LowPower),
    ("sluggish", SymptomTag::LowPower),
    ("no power", SymptomTag::LowPower),
    ("limp mode", SymptomTag::LowPower),
    ("won't shift", SymptomTag::StuckInGear),
    ("wont shift", SymptomTag::StuckInGear),
    ("stuck in gear", SymptomTag::StuckInGear),
    ("hard to start", SymptomTag::HardStart),
    ("hard start", SymptomTag::HardStart),
    ("cranking", SymptomTag::HardStart),
    ("stalls", SymptomTag::Stalling),
    ("stalling", SymptomTag::Stalling),
];

/// At most this many tags are kept.
pub const MAX_SYMPTOMS: usize = 5;

/// Tags found in `text`, in first-seen order, without duplicates.
pub fn symptom_tags(text: &str) -> Vec<SymptomTag> {
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut found: Vec<SymptomTag> = KEYWORDS
        .iter()
        .filter(|(kw, _)| lower.contains(kw))
        .map(|(_, tag)| *tag)
        .collect();

    // "rough ... idle" and "low ... power" split by other words.
    if words.contains(&"rough") && words.contains(&"idle") {
        found.push(SymptomTag::RoughIdle);
    }
    if words.contains(&"low") && words.contains(&"power") {
        found.push(SymptomTag::LowPower);
    }

    let mut out = Vec::new();
    for tag in found {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out.truncate(MAX_SYMPTOMS);
    out
}
