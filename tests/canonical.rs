//! Integration tests for `src/canonical/`.

#[path = "canonical/canonicalize_test.rs"]
mod canonicalize_test;
