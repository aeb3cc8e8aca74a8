//! Free-text request parsing.
//!
//! Finds trouble-code tokens and pulls best-effort vehicle details out of the
//! rest of the message. There is no canonical grammar for vehicle details, so
//! every vehicle field is optional and an unrecognised field is left empty.

use std::ops::Range;

use chrono::{Datelike, Utc};
use obd_catalog::{CodeCategory, VehicleContext};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::request::{CodeCandidate, ParseOutcome};

/// Earliest model year treated as plausible.
pub const MIN_MODEL_YEAR: u16 = 1980;

static CODE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([a-z])([ \-]?)([0-9o]{3,5})\b").expect("valid regex"));

static YEAR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));

static ENGINE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d\.\d\s?[ld]?|[vi]\d{1,2}|\d{3,4}\s?cc)\b").expect("valid regex")
});

static WORD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9\-]*").expect("valid regex"));

/// Known makes: (alias as typed, canonical name). Multi-word aliases first.
const MAKES: &[(&str, &str)] = &[
    ("land rover", "Land Rover"),
    ("alfa romeo", "Alfa Romeo"),
    ("mercedes benz", "Mercedes-Benz"),
    ("mercedes-benz", "Mercedes-Benz"),
    ("mercedes", "Mercedes-Benz"),
    ("toyota", "Toyota"),
    ("honda", "Honda"),
    ("nissan", "Nissan"),
    ("mazda", "Mazda"),
    ("subaru", "Subaru"),
    ("mitsubishi", "Mitsubishi"),
    ("suzuki", "Suzuki"),
    ("isuzu", "Isuzu"),
    ("lexus", "Lexus"),
    ("hyundai", "Hyundai"),
    ("kia", "Kia"),
    ("ford", "Ford"),
    ("chevrolet", "Chevrolet"),
    ("chevy", "Chevrolet"),
    ("gmc", "GMC"),
    ("dodge", "Dodge"),
    ("jeep", "Jeep"),
    ("chrysler", "Chrysler"),
    ("ram", "Ram"),
    ("volkswagen", "Volkswagen"),
    ("vw", "Volkswagen"),
    ("audi", "Audi"),
    ("bmw", "BMW"),
    ("porsche", "Porsche"),
    ("volvo", "Volvo"),
    ("peugeot", "Peugeot"),
    ("renault", "Renault"),
    ("citroen", "Citroen"),
    ("fiat", "Fiat"),
    ("skoda", "Skoda"),
    ("seat", "SEAT"),
    ("opel", "Opel"),
    ("vauxhall", "Vauxhall"),
    ("tesla", "Tesla"),
];

/// Words that are never a model name.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "my", "car", "with", "and", "engine", "code", "has", "have",
    "showing", "shows", "light", "on", "in", "of", "for", "model", "year",
];

/// Parse a message, treating `current_year + 1` as the latest plausible model year.
pub fn parse(raw_text: &str) -> ParseOutcome {
    parse_with_max_year(raw_text, Utc::now().year() as u16 + 1)
}

/// Deterministic variant of [`parse`] with an explicit upper year bound.
pub fn parse_with_max_year(raw_text: &str, max_year: u16) -> ParseOutcome {
    let tokens = scan_codes(raw_text);

    // Four-digit tokens win over malformed-length ones: "P0171 C200" is a
    // P0171 request about a C200, not an ambiguous pair.
    let well_formed = tokens.iter().any(|t| t.well_formed);
    let chosen: Vec<&CodeToken> = tokens.iter().filter(|t| t.well_formed == well_formed).collect();

    let mut distinct: Vec<CodeCandidate> = Vec::new();
    for token in &chosen {
        if !distinct.contains(&token.candidate) {
            distinct.push(token.candidate.clone());
        }
    }

    match distinct.len() {
        0 => ParseOutcome::NoCodeFound,
        1 => {
            let remainder = blank_spans(raw_text, &chosen);
            let vehicle = extract_vehicle_context(&remainder, max_year);
            ParseOutcome::Parsed(distinct.remove(0), vehicle)
        }
        _ => ParseOutcome::AmbiguousMultipleCodes(distinct),
    }
}

struct CodeToken {
    candidate: CodeCandidate,
    span: Range<usize>,
    well_formed: bool,
}

fn looks_like_year(digits: &str) -> bool {
    digits.len() == 4 && (digits.starts_with("19") || digits.starts_with("20"))
}

fn scan_codes(text: &str) -> Vec<CodeToken> {
    let mut tokens = Vec::new();

    for caps in CODE_TOKEN.captures_iter(text) {
        let (Some(whole), Some(letter), Some(sep), Some(body)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        let Some(letter) = letter.as_str().chars().next() else {
            continue;
        };
        let separated = !sep.as_str().is_empty();
        let digits = body.as_str().to_ascii_uppercase().replace('O', "0");

        if !body.as_str().chars().any(|c| c.is_ascii_digit()) {
            continue;
        }

        let accepted = if CodeCategory::from_letter(letter).is_some() {
            // A separated token must be exactly four digits and not a model year.
            !separated || (digits.len() == 4 && !looks_like_year(&digits))
        } else {
            // Foreign letters are only considered in the tight `X1234` shape.
            !separated && digits.len() == 4 && body.as_str().chars().all(|c| c.is_ascii_digit())
        };
        if !accepted {
            continue;
        }

        tokens.push(CodeToken {
            candidate: CodeCandidate::new(format!("{}{}", letter.to_ascii_uppercase(), digits)),
            span: whole.range(),
            well_formed: digits.len() == 4,
        });
    }
    tokens
}

/// Replace the given token spans with spaces so they are not read as vehicle details.
fn blank_spans(text: &str, tokens: &[&CodeToken]) -> String {
    let mut out = text.to_string();
    for token in tokens {
        out.replace_range(token.span.clone(), &" ".repeat(token.span.len()));
    }
    out
}

fn normalize_engine(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.to_ascii_lowercase().ends_with("cc") {
        compact.to_ascii_lowercase()
    } else {
        compact.to_ascii_uppercase()
    }
}

/// Best-effort make/model/year/engine extraction. Never fails.
pub fn extract_vehicle_context(text: &str, max_year: u16) -> VehicleContext {
    let year = YEAR_TOKEN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u16>().ok())
        .find(|y| (MIN_MODEL_YEAR..=max_year).contains(y));

    let engine_match = ENGINE_TOKEN.find(text);
    let engine = engine_match.map(|m| normalize_engine(m.as_str()));

    // Blank out the engine so "1.6L" is not read as a model.
    let mut rest = text.to_string();
    if let Some(m) = engine_match {
        rest.replace_range(m.range(), &" ".repeat(m.as_str().len()));
    }

    let words: Vec<&str> = WORD_TOKEN.find_iter(&rest).map(|m| m.as_str()).collect();
    let (make, model) = find_make_and_model(&words);

    VehicleContext {
        make,
        model,
        year,
        engine,
    }
}

fn canonical_make(phrase: &str) -> Option<&'static str> {
    let lower = phrase.to_lowercase();
    MAKES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| *canonical)
}

fn find_make_and_model(words: &[&str]) -> (Option<String>, Option<String>) {
    for i in 0..words.len() {
        let (make, consumed) = if let Some(m) = words
            .get(i + 1)
            .and_then(|next| canonical_make(&format!("{} {}", words[i], next)))
        {
            (m, 2)
        } else if let Some(m) = canonical_make(words[i]) {
            (m, 1)
        } else {
            continue;
        };

        let model = words.get(i + consumed).filter(|w| is_model_word(w));
        return (Some(make.to_string()), model.map(|w| w.to_string()));
    }
    (None, None)
}

fn is_model_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    if STOPWORDS.contains(&lower.as_str()) {
        return false;
    }
    // A bare four-digit number right after the make is the year, not a model.
    !(word.len() == 4 && word.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u16 = 2026;

    fn parsed(text: &str) -> (CodeCandidate, VehicleContext) {
        match parse_with_max_year(text, MAX) {
            ParseOutcome::Parsed(c, v) => (c, v),
            other => panic!("expected Parsed, got {other:?}"),
        }
    }

    #[test]
    fn test_code_with_full_vehicle() {
        let (code, v) = parsed("P0171\nToyota Corolla 2015 1.6L");
        assert_eq!(code.as_str(), "P0171");
        assert_eq!(v.make.as_deref(), Some("Toyota"));
        assert_eq!(v.model.as_deref(), Some("Corolla"));
        assert_eq!(v.year, Some(2015));
        assert_eq!(v.engine.as_deref(), Some("1.6L"));
    }

    #[test]
    fn test_lowercase_spaced_and_letter_o() {
        assert_eq!(parsed("p 0171").0.as_str(), "P0171");
        assert_eq!(parsed("code PO3O1 please").0.as_str(), "P0301");
        assert_eq!(parsed("u-0100").0.as_str(), "U0100");
    }

    #[test]
    fn test_no_code() {
        assert_eq!(
            parse_with_max_year("my car is broken", MAX),
            ParseOutcome::NoCodeFound
        );
    }

    #[test]
    fn test_two_distinct_codes_are_ambiguous() {
        match parse_with_max_year("P0171 P0420", MAX) {
            ParseOutcome::AmbiguousMultipleCodes(codes) => assert_eq!(codes.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_repeated_code_is_not_ambiguous() {
        assert_eq!(parsed("P0171 again p0171").0.as_str(), "P0171");
    }

    #[test]
    fn test_year_after_letter_is_not_a_code() {
        let (code, v) = parsed("P0420 Mercedes C 2014");
        assert_eq!(code.as_str(), "P0420");
        assert_eq!(v.year, Some(2014));
        assert_eq!(v.make.as_deref(), Some("Mercedes-Benz"));
    }

    #[test]
    fn test_well_formed_beats_malformed() {
        let (code, v) = parsed("P0300 on a Mercedes C200");
        assert_eq!(code.as_str(), "P0300");
        assert_eq!(v.model.as_deref(), Some("C200"));
    }

    #[test]
    fn test_malformed_only_is_returned_for_validation() {
        assert_eq!(parsed("P017").0.as_str(), "P017");
        assert_eq!(parsed("P01711").0.as_str(), "P01711");
    }

    #[test]
    fn test_foreign_letter_reaches_validator() {
        assert_eq!(parsed("X1234").0.as_str(), "X1234");
    }

    #[test]
    fn test_implausible_year_dropped() {
        let (_, v) = parsed("P0171 Ford 1975");
        assert_eq!(v.year, None);
        let (_, v) = parsed("P0171 Ford 2031");
        assert_eq!(v.year, None);
    }

    #[test]
    fn test_unknown_make_leaves_fields_empty() {
        let (_, v) = parsed("P0171 please help");
        assert!(v.is_empty());
    }

    #[test]
    fn test_engine_variants() {
        assert_eq!(parsed("P0705 Toyota Hilux 2011 2.5D").1.engine.as_deref(), Some("2.5D"));
        assert_eq!(parsed("P0300 Ford F-150 V8").1.engine.as_deref(), Some("V8"));
        assert_eq!(parsed("P0300 Honda 1600 cc").1.engine.as_deref(), Some("1600cc"));
    }

    #[test]
    fn test_multi_word_make_and_alias() {
        let (_, v) = parsed("P0171 land rover discovery");
        assert_eq!(v.make.as_deref(), Some("Land Rover"));
        assert_eq!(v.model.as_deref(), Some("discovery"));
        let (_, v) = parsed("P0171 vw golf");
        assert_eq!(v.make.as_deref(), Some("Volkswagen"));
    }

    #[test]
    fn test_year_directly_after_make_is_not_model() {
        let (_, v) = parsed("P0128 Honda 2012");
        assert_eq!(v.make.as_deref(), Some("Honda"));
        assert_eq!(v.model, None);
        assert_eq!(v.year, Some(2012));
    }
}
