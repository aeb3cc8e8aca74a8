//! Reply rendering.
//!
//! [`format`] turns a [`DiagnosticResult`] into sectioned text and
//! [`format_failure`] renders the clarification templates. Both are pure. The
//! formatter never re-sorts or filters the causes and fixes it is given.

use obd_catalog::{CatalogSource, VehicleContext};
use serde::{Deserialize, Serialize};

use crate::pipeline::state::{ClarificationReason, FailureKind};
use crate::request::CodeCandidate;
use crate::result::{DiagnosticResult, Provenance};

pub const TITLE_CODE: &str = "Code";
pub const TITLE_MEANING: &str = "Meaning";
pub const TITLE_CAUSES: &str = "Likely causes";
pub const TITLE_CHECKS: &str = "Recommended checks";
pub const TITLE_DISCLAIMER: &str = "Disclaimer";
pub const TITLE_SORRY: &str = "Sorry";
pub const TITLE_TRY: &str = "Try this";

const FALLBACK_CAVEAT: &str =
    "AI ranking was unavailable. Causes are listed in general order, not ranked for your vehicle.";
const NO_VEHICLE_CAVEAT: &str =
    "No vehicle details were given. Add make, model, year and engine for more specific guidance.";
const SAFETY_LINE: &str =
    "This is general guidance. Confirm with a qualified technician before replacing parts.";
const EXAMPLE_MESSAGE: &str = "P0171 Toyota Corolla 2015 1.6L";

/// How a section's lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStyle {
    /// `Title: line` on one line
    Header,
    Paragraph,
    Numbered,
    Bulleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub style: SectionStyle,
    pub lines: Vec<String>,
}

impl Section {
    fn new(title: &str, style: SectionStyle, lines: Vec<String>) -> Self {
        Self {
            title: title.to_string(),
            style,
            lines,
        }
    }
}

/// Sectioned reply text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredText {
    pub sections: Vec<Section>,
}

impl StructuredText {
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    pub fn titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }
}

impl std::fmt::Display for StructuredText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            if section.style == SectionStyle::Header {
                write!(f, "{}: {}", section.title, section.lines.join(" "))?;
                if i + 1 < self.sections.len() {
                    writeln!(f)?;
                }
                continue;
            }
            write!(f, "{}:", section.title)?;
            for (n, line) in section.lines.iter().enumerate() {
                match section.style {
                    SectionStyle::Numbered => write!(f, "\n{}. {}", n + 1, line)?,
                    SectionStyle::Bulleted => write!(f, "\n- {line}")?,
                    _ => write!(f, "\n{line}")?,
                }
            }
            if i + 1 < self.sections.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Render a diagnosis.
pub fn format(result: &DiagnosticResult, vehicle: &VehicleContext) -> StructuredText {
    let definition = &result.definition;

    let mut meaning = vec![definition.description.clone()];
    if result.catalog_source == CatalogSource::VehicleOverride {
        meaning.push(format!("Known issues for {} are listed first.", vehicle.summary()));
    }

    let causes = result.causes.iter().map(|c| c.text.clone()).collect();

    let mut disclaimer = Vec::new();
    if result.disclaimer {
        if result.provenance == Provenance::GenericFallback {
            disclaimer.push(FALLBACK_CAVEAT.to_string());
        }
        if vehicle.is_empty() {
            disclaimer.push(NO_VEHICLE_CAVEAT.to_string());
        }
    }
    disclaimer.push(SAFETY_LINE.to_string());

    StructuredText {
        sections: vec![
            Section::new(
                TITLE_CODE,
                SectionStyle::Header,
                vec![definition.code.to_string()],
            ),
            Section::new(TITLE_MEANING, SectionStyle::Paragraph, meaning),
            Section::new(TITLE_CAUSES, SectionStyle::Numbered, causes),
            Section::new(TITLE_CHECKS, SectionStyle::Bulleted, result.fixes.clone()),
            Section::new(TITLE_DISCLAIMER, SectionStyle::Paragraph, disclaimer),
        ],
    }
}

/// Render the apology template for `kind`, echoing the code when there is one.
pub fn format_failure(kind: FailureKind, candidate: Option<&CodeCandidate>) -> StructuredText {
    let (message, hints) = match kind {
        FailureKind::ClarificationNeeded(ClarificationReason::NoCode) => (
            "I couldn't find an OBD-II code in your message.".to_string(),
            vec![
                "Send one code, for example P0171.".to_string(),
                format!("Add your vehicle if you can, for example \"{EXAMPLE_MESSAGE}\"."),
            ],
        ),
        FailureKind::ClarificationNeeded(ClarificationReason::Ambiguous) => (
            "Your message contains more than one code.".to_string(),
            vec![
                "Send one code per message.".to_string(),
                format!("For example \"{EXAMPLE_MESSAGE}\"."),
            ],
        ),
        FailureKind::InvalidCode => (
            match candidate {
                Some(c) => format!("\"{c}\" doesn't look like a valid OBD-II code."),
                None => "That doesn't look like a valid OBD-II code.".to_string(),
            },
            vec![
                "Codes are one letter (P, B, C or U) followed by four digits.".to_string(),
                "Check the code on your scan tool and send it again.".to_string(),
            ],
        ),
        FailureKind::UnknownCode => (
            match candidate {
                Some(c) => format!("{c} isn't in our code database yet."),
                None => "We couldn't look up that code right now.".to_string(),
            },
            vec![
                "Double-check the code on your scan tool.".to_string(),
                "A qualified technician can read manufacturer-specific codes.".to_string(),
            ],
        ),
    };

    let mut sections = Vec::with_capacity(3);
    if let Some(c) = candidate {
        sections.push(Section::new(
            TITLE_CODE,
            SectionStyle::Header,
            vec![c.as_str().to_string()],
        ));
    }
    sections.push(Section::new(TITLE_SORRY, SectionStyle::Paragraph, vec![message]));
    sections.push(Section::new(TITLE_TRY, SectionStyle::Bulleted, hints));
    StructuredText { sections }
}
