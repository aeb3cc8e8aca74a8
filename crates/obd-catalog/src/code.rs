//! Trouble code identifiers.
//!
//! A [`TroubleCode`] is one category letter followed by exactly four ASCII
//! digits, always upper-case. The inner string is private so every value in
//! circulation went through [`TroubleCode::try_from`].

use serde::{Deserialize, Serialize};

use crate::error::CodeFormatError;

/// OBD-II code namespace, keyed by the leading letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeCategory {
    Powertrain,
    Body,
    Chassis,
    Network,
}

impl CodeCategory {
    /// Map a category letter (any case) to its namespace.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'P' => Some(Self::Powertrain),
            'B' => Some(Self::Body),
            'C' => Some(Self::Chassis),
            'U' => Some(Self::Network),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Powertrain => 'P',
            Self::Body => 'B',
            Self::Chassis => 'C',
            Self::Network => 'U',
        }
    }
}

impl std::fmt::Display for CodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Powertrain => "powertrain",
            Self::Body => "body",
            Self::Chassis => "chassis",
            Self::Network => "network",
        };
        f.write_str(name)
    }
}

/// A syntactically valid OBD-II trouble code, e.g. `P0171`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TroubleCode(String);

impl TroubleCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn category(&self) -> CodeCategory {
        // The constructor guarantees a known leading letter.
        self.0
            .chars()
            .next()
            .and_then(CodeCategory::from_letter)
            .unwrap_or(CodeCategory::Powertrain)
    }
}

impl TryFrom<&str> for TroubleCode {
    type Error = CodeFormatError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars
            .next()
            .ok_or_else(|| CodeFormatError::Malformed(s.to_string()))?;
        let body: String = chars.collect();

        if !letter.is_ascii_alphabetic() {
            return Err(CodeFormatError::Malformed(s.to_string()));
        }
        if body.len() != 4 || !body.chars().all(|c| c.is_ascii_digit()) {
            return Err(CodeFormatError::Malformed(s.to_string()));
        }
        let category = CodeCategory::from_letter(letter)
            .ok_or(CodeFormatError::UnknownCategory(letter.to_ascii_uppercase()))?;

        Ok(TroubleCode(format!("{}{}", category.letter(), body)))
    }
}

impl TryFrom<String> for TroubleCode {
    type Error = CodeFormatError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TroubleCode::try_from(s.as_str())
    }
}

impl<'de> Deserialize<'de> for TroubleCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TroubleCode::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for TroubleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
