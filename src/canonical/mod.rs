//! Ingredient token canonicalization.
//!
//! Maps raw tokens (typed, scraped, or OCR'd) to a [`CanonicalName`] or
//! rejects them. The pipeline is pure and deterministic: no I/O, no clock,
//! no locale. Same input always yields the same output, and the output is a
//! fixed point (`canonicalize(canonicalize(s)) == canonicalize(s)`).
//!
//! Steps, in order:
//! 1. NFKD normalization, combining marks stripped (removes accents)
//! 2. Greek-letter and special-character substitution
//! 3. Parenthetical segments dropped (`"Aqua (Water)"` keeps only `"Aqua"`)
//! 4. Measurement tokens rejected (`"1 mg"`, `"5 µg/L"`, `"0.1 ppm"`)
//! 5. Lowercase, punctuation to spaces, whitespace collapsed
//! 6. Synonym collapse (`aqua`/`eau` → `water`, paraben spellings, ...)
//! 7. Rejection of short tokens and label stopwords

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::CanonicalName;

/// Minimum length of a canonical name, after normalization.
const MIN_NAME_LEN: usize = 3;

/// Tokens that are label scaffolding, not ingredients.
const STOPWORDS: &[&str] = &[
    "and",
    "or",
    "the",
    "with",
    "may",
    "contain",
    "contains",
    "ingredient",
    "ingredients",
    "list",
    "free",
    "new",
];

/// Greek letters and symbols translated to ASCII before tokenization.
///
/// NFKD decomposes the micro sign (U+00B5) into Greek mu, so both spellings
/// land on `u` and the measurement pattern below only needs `ug`.
const CHAR_SUBSTITUTIONS: &[(char, &str)] = &[
    ('µ', "u"),
    ('μ', "u"),
    ('α', "alpha "),
    ('β', "beta "),
    ('γ', "gamma "),
    ('ω', "omega "),
    ('®', " "),
    ('™', " "),
];

/// Synonym table applied to the fully-normalized string.
///
/// Targets are themselves canonical (never appear as a key), which keeps
/// canonicalization idempotent.
const SYNONYMS: &[(&str, &str)] = &[
    ("aqua", "water"),
    ("eau", "water"),
    ("agua", "water"),
    ("parfum", "fragrance"),
    ("perfume", "fragrance"),
    ("vitamin e", "tocopherol"),
    ("vitamin c", "ascorbic acid"),
    ("methyl paraben", "methylparaben"),
    ("ethyl paraben", "ethylparaben"),
    ("propyl paraben", "propylparaben"),
    ("butyl paraben", "butylparaben"),
    ("sls", "sodium lauryl sulfate"),
    ("sles", "sodium laureth sulfate"),
];

/// `<num><unit>[/<unit>]` with units from the closed measurement set.
static MEASUREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+(?:[.,]\d+)?\s*(?:mg|g|ug|mcg|ml|l|ppm|ppb|%)(?:\s*/\s*(?:mg|g|ug|mcg|ml|l))?$")
        .expect("measurement pattern is valid")
});

/// Parenthetical segments, dropped wholesale.
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]*\)").expect("parenthetical pattern is valid"));

/// Map a raw ingredient token to its canonical form, or reject it.
///
/// Returns `None` for measurements, label stopwords, and tokens that
/// normalize to fewer than three characters. Rejection leaves no partial
/// state; the caller simply discards the token.
pub fn canonicalize(raw: &str) -> Option<CanonicalName> {
    // 1. Decompose and strip accents.
    let decomposed: String = raw.nfkd().filter(|c| !is_combining_mark(*c)).collect();

    // 2. Greek letters and symbols to ASCII.
    let mut substituted = String::with_capacity(decomposed.len());
    for c in decomposed.chars() {
        match CHAR_SUBSTITUTIONS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => substituted.push_str(to),
            None => substituted.push(c),
        }
    }

    // 3. Drop parenthetical segments.
    let without_parens = PARENTHETICAL.replace_all(&substituted, " ");

    // 4. Measurements are not ingredients.
    let trimmed = without_parens.trim();
    if MEASUREMENT.is_match(trimmed) {
        return None;
    }

    // 5. Lowercase, punctuation to spaces, collapse whitespace.
    let lowered: String = trimmed
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() {
                c
            } else {
                ' '
            }
        })
        .collect();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    // 6. Synonym collapse, word-level spelling standardization first.
    let standardized = collapsed.replace("sulphate", "sulfate");
    let canonical = SYNONYMS
        .iter()
        .find(|(from, _)| *from == standardized)
        .map_or(standardized, |(_, to)| (*to).to_owned());

    // 7. Reject scaffolding.
    if canonical.len() < MIN_NAME_LEN || STOPWORDS.contains(&canonical.as_str()) {
        return None;
    }

    Some(CanonicalName::from_normalized(canonical))
}
