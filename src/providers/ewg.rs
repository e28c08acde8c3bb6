//! EWG Skin Deep adapter.
//!
//! The hazard score (1 = safest, 10 = most hazardous) drives both the risk
//! tier and the eco score; the eco score is normalized to 0–100 at this
//! boundary so the aggregator never sees the 1–10 scale.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// EWG Skin Deep hazard adapter.
#[derive(Debug, Clone)]
pub struct EwgProvider {
    base_url: String,
    client: reqwest::Client,
}

impl EwgProvider {
    /// Create a new EWG adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for EwgProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ewg
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let url = format!("{}/ingredient", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("name", name.as_str()), ("format", "json")])
            .send()
            .await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let hazard = parsed
            .get("hazard_score")
            .and_then(Value::as_f64)
            .ok_or_else(|| ProviderError::Parse("missing hazard_score".to_owned()))?;

        let concerns = join_strings(&parsed, "concerns");
        let functions = join_strings(&parsed, "functions");

        Ok(IngredientFact {
            provider: ProviderId::Ewg,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk: map_risk(hazard),
            eco_score: Some(eco_from_hazard(hazard)),
            benefits: functions,
            risks_detailed: concerns,
            raw_summary: summarize_payload(&payload),
        })
    }
}

/// EWG tiers: hazard ≥ 8 high, ≥ 5 moderate, ≥ 3 low, else safe.
fn map_risk(hazard: f64) -> RiskLevel {
    if hazard >= 8.0 {
        RiskLevel::High
    } else if hazard >= 5.0 {
        RiskLevel::Moderate
    } else if hazard >= 3.0 {
        RiskLevel::Low
    } else {
        RiskLevel::None
    }
}

/// Invert the 1–10 hazard scale onto 0–100.
fn eco_from_hazard(hazard: f64) -> f64 {
    (((10.0 - hazard) * 100.0) / 9.0).clamp(0.0, 100.0)
}

fn join_strings(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}
