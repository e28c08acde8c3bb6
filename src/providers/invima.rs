//! INVIMA registry adapter.
//!
//! Checks the Colombian sanitary registry for alerts attached to an
//! ingredient. Alerts escalate the risk tier; a clean registered entry is
//! treated as low risk rather than safe, since registration is not a safety
//! review.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// Alert count that escalates to high risk.
const HIGH_ALERT_THRESHOLD: u64 = 3;

/// INVIMA registry and alert adapter.
#[derive(Debug, Clone)]
pub struct InvimaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl InvimaProvider {
    /// Create a new INVIMA adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for InvimaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Invima
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let url = format!("{}/registro", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("ingrediente", name.as_str())])
            .send()
            .await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let registered = parsed
            .get("registered")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let alerts = parsed.get("alerts").and_then(Value::as_u64).unwrap_or(0);
        let risk = map_risk(registered, alerts);

        Ok(IngredientFact {
            provider: ProviderId::Invima,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: Some(risk.fallback_score()),
            benefits: String::new(),
            risks_detailed: if alerts > 0 {
                format!("INVIMA lists {alerts} sanitary alerts for {name}")
            } else {
                String::new()
            },
            raw_summary: summarize_payload(&payload),
        })
    }
}

fn map_risk(registered: bool, alerts: u64) -> RiskLevel {
    if alerts >= HIGH_ALERT_THRESHOLD {
        RiskLevel::High
    } else if alerts > 0 {
        RiskLevel::Moderate
    } else if registered {
        RiskLevel::Low
    } else {
        RiskLevel::Unknown
    }
}
