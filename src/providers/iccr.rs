//! ICCR report adapter.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// ICCR cooperation report adapter.
#[derive(Debug, Clone)]
pub struct IccrProvider {
    base_url: String,
    client: reqwest::Client,
}

impl IccrProvider {
    /// Create a new ICCR adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for IccrProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Iccr
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let url = format!("{}/reports", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("ingredient", name.as_str())])
            .send()
            .await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let flagged = parsed
            .get("reports")
            .and_then(Value::as_array)
            .map(|reports| {
                reports.iter().any(|r| {
                    r.get("flagged").and_then(Value::as_bool).unwrap_or(false)
                })
            });

        // ICCR reports flag ingredients under joint review; absence of any
        // report leaves the classification to other sources.
        let risk = match flagged {
            Some(true) => RiskLevel::Moderate,
            Some(false) => RiskLevel::None,
            None => RiskLevel::Unknown,
        };

        Ok(IngredientFact {
            provider: ProviderId::Iccr,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: Some(risk.fallback_score()),
            benefits: String::new(),
            risks_detailed: if risk == RiskLevel::Moderate {
                format!("{name} is flagged in an ICCR joint review")
            } else {
                String::new()
            },
            raw_summary: summarize_payload(&payload),
        })
    }
}
