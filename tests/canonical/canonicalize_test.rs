//! Canonicalization properties: idempotence, synonymy, measurement
//! rejection.

use inciguard::canonical::canonicalize;

fn value(raw: &str) -> String {
    match canonicalize(raw) {
        Some(name) => name.as_str().to_owned(),
        None => panic!("expected {raw:?} to canonicalize"),
    }
}

#[test]
fn canonicalization_is_idempotent() {
    let inputs = [
        "Aqua",
        "  WATER ",
        "Sodium Lauryl Sulphate",
        "α-Tocopherol",
        "Crème (Base)",
        "PEG-40 Hydrogenated Castor Oil",
        "Methyl Paraben",
        "GLNERPENTONETIANCL",
    ];
    for raw in inputs {
        let once = value(raw);
        let twice = value(&once);
        assert_eq!(once, twice, "canonicalize({raw:?}) is not a fixed point");
    }
}

#[test]
fn water_synonyms_collapse() {
    assert_eq!(value("Aqua"), "water");
    assert_eq!(value("water"), "water");
    assert_eq!(value(" WATER "), "water");
    assert_eq!(value("Eau"), "water");
}

#[test]
fn case_unicode_form_and_whitespace_are_equivalent() {
    // NFC vs NFD spellings of "Crème".
    let composed = "Cr\u{e8}me base";
    let decomposed = "Cre\u{300}me base";
    assert_eq!(value(composed), value(decomposed));
    assert_eq!(value("  creme BASE "), value(composed));
}

#[test]
fn measurement_tokens_are_rejected() {
    let measurements = [
        "1 mg", "5 µg/L", "0.1 ppm", "10%", "250 mL", "3ppb", "2 g", "1.5mg/L",
    ];
    for raw in measurements {
        assert!(
            canonicalize(raw).is_none(),
            "{raw:?} should be rejected as a measurement"
        );
    }
}

#[test]
fn label_scaffolding_is_rejected() {
    for raw in ["Ingredients", "and", "Contains", "", "  ", "ab"] {
        assert!(canonicalize(raw).is_none(), "{raw:?} should be rejected");
    }
}

#[test]
fn ocr_junk_becomes_a_plain_name() {
    // Junk tokens stay resolvable names; no fuzzy correction happens here.
    assert_eq!(value("GLNERPENTONETIANCL"), "glnerpentonetiancl");
}
