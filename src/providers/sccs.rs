//! EU SCCS opinion adapter.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// SCCS scientific opinion adapter.
#[derive(Debug, Clone)]
pub struct SccsProvider {
    base_url: String,
    client: reqwest::Client,
}

impl SccsProvider {
    /// Create a new SCCS adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for SccsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Sccs
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let url = format!("{}/opinions", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("substance", name.as_str())])
            .send()
            .await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let (risk, summary) = parse_opinion(&parsed);

        Ok(IngredientFact {
            provider: ProviderId::Sccs,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: Some(risk.fallback_score()),
            benefits: String::new(),
            risks_detailed: summary,
            raw_summary: summarize_payload(&payload),
        })
    }
}

/// Read the most recent opinion's verdict and concern text.
///
/// No opinion on file is a legitimate answer: the substance simply has no
/// SCCS classification.
fn parse_opinion(value: &Value) -> (RiskLevel, String) {
    let Some(opinion) = value
        .get("opinions")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
    else {
        return (RiskLevel::Unknown, String::new());
    };

    let verdict = opinion
        .get("verdict")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    let concern = opinion
        .get("concern")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let risk = if verdict.contains("not safe") || verdict.contains("unsafe") {
        RiskLevel::High
    } else if verdict.contains("concentration") || verdict.contains("restricted") {
        RiskLevel::Moderate
    } else if verdict.contains("safe") {
        RiskLevel::None
    } else {
        RiskLevel::Unknown
    };
    (risk, concern)
}
