//! Cosmetic Ingredient Review adapter.
//!
//! CIR publishes textual safety conclusions; the adapter maps the
//! conclusion phrasing onto the normalized risk scale.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// CIR safety conclusion adapter.
#[derive(Debug, Clone)]
pub struct CirProvider {
    base_url: String,
    client: reqwest::Client,
}

impl CirProvider {
    /// Create a new CIR adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for CirProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Cir
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let url = format!("{}/ingredients", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("name", name.as_str())])
            .send()
            .await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let conclusion = parsed
            .get("conclusion")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Parse("missing conclusion".to_owned()))?;

        let risk = map_conclusion(conclusion);

        Ok(IngredientFact {
            provider: ProviderId::Cir,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: Some(risk.fallback_score()),
            benefits: String::new(),
            risks_detailed: format!("CIR conclusion: {conclusion}"),
            raw_summary: summarize_payload(&payload),
        })
    }
}

/// Map a CIR conclusion phrase to a risk level.
///
/// Phrases are matched most-severe first; an unrecognized conclusion stays
/// unknown rather than guessing a tier.
fn map_conclusion(conclusion: &str) -> RiskLevel {
    let lowered = conclusion.to_lowercase();
    if lowered.contains("unsafe") {
        RiskLevel::High
    } else if lowered.contains("insufficient data") {
        RiskLevel::Unknown
    } else if lowered.contains("qualification") || lowered.contains("restrict") {
        RiskLevel::Moderate
    } else if lowered.contains("safe as used") {
        RiskLevel::None
    } else if lowered.contains("safe") {
        RiskLevel::Low
    } else {
        RiskLevel::Unknown
    }
}
