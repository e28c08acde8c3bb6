//! External source adapter layer.
//!
//! Defines the [`SourceProvider`] trait and the shared HTTP plumbing used by
//! all adapter implementations. One adapter exists per external database:
//!
//! - [`faers::FaersProvider`] — FDA adverse event reports
//! - [`pubchem::PubchemProvider`] — PubChem PUG REST
//! - [`ewg::EwgProvider`] — EWG Skin Deep hazard scores
//! - [`cir::CirProvider`] — Cosmetic Ingredient Review conclusions
//! - [`sccs::SccsProvider`] — EU SCCS opinions
//! - [`iccr::IccrProvider`] — ICCR reports
//! - [`invima::InvimaProvider`] — INVIMA registry and alerts
//! - [`iarc::IarcProvider`] — IARC classifications via PubMed
//! - [`inci_beauty::InciBeautyProvider`] — INCI Beauty Pro notes
//! - [`cosing::CosingProvider`] — EU CosIng functions and annexes
//!
//! Adapters differ only in endpoint, request shaping, parsing, and risk
//! mapping. They never reach callers directly: the resilience layer wraps
//! every adapter and turns any [`ProviderError`] into a failure
//! [`crate::types::IngredientFact`]. The [`registry`] builds the enabled,
//! wrapped set from configuration.

use async_trait::async_trait;
use regex::Regex;

use crate::types::{CanonicalName, IngredientFact, ProviderId};

pub mod cir;
pub mod cosing;
pub mod ewg;
pub mod faers;
pub mod iarc;
pub mod iccr;
pub mod inci_beauty;
pub mod invima;
pub mod pubchem;
pub mod registry;
pub mod sccs;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by source adapters, before resilience classification.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP transport failure.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response did not match the expected schema.
    #[error("provider response parse error: {0}")]
    Parse(String),
    /// Upstream responded with an error status.
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
}

// ---------------------------------------------------------------------------
// HTTP helpers (shared by all adapters)
// ---------------------------------------------------------------------------

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `ProviderError::Request` on transport failure,
/// `ProviderError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

/// Collapse, redact, and truncate an upstream error body before it reaches
/// logs or the audit trail.
fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"api_key=[A-Za-z0-9_\-]{8,}",
        r"[Bb]earer [A-Za-z0-9_\-\.]{8,}",
        r"[Xx]-[Aa]pi-[Kk]ey: ?[A-Za-z0-9_\-]{8,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

/// Truncate a payload excerpt for the audit log's `raw_summary` column.
pub(crate) fn summarize_payload(raw: &str) -> String {
    const MAX_SUMMARY_CHARS: usize = 200;
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_SUMMARY_CHARS {
        collapsed.chars().take(MAX_SUMMARY_CHARS).collect()
    } else {
        collapsed
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Core source adapter interface.
///
/// Implementations must be `Send + Sync`: every adapter is shared across
/// concurrent resolutions. Adapters own only transient request state; rate
/// limiting, circuit breaking, retries, and deadline enforcement are the
/// resilience layer's job, as is converting a [`ProviderError`] into a
/// failure fact.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// The registered identity of this source.
    fn id(&self) -> ProviderId;

    /// Fetch this source's answer for one canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport, status, or parse failure.
    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError>;
}
