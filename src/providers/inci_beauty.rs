//! INCI Beauty Pro adapter.
//!
//! INCI Beauty rates ingredients with a note out of 20; the note is scaled
//! to the 0–100 eco range at this boundary. The Pro API requires a key,
//! passed as an `X-Api-Key` header.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// INCI Beauty Pro ingredient adapter.
#[derive(Debug, Clone)]
pub struct InciBeautyProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl InciBeautyProvider {
    /// Create a new INCI Beauty adapter.
    pub fn new(base_url: String, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            base_url,
            api_key,
            client,
        }
    }
}

#[async_trait::async_trait]
impl SourceProvider for InciBeautyProvider {
    fn id(&self) -> ProviderId {
        ProviderId::InciBeauty
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let url = format!("{}/ingredient", self.base_url);
        let mut request = self.client.get(&url).query(&[("name", name.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key.as_str());
        }
        let response = request.send().await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let note = parsed
            .get("note")
            .and_then(Value::as_f64)
            .ok_or_else(|| ProviderError::Parse("missing note".to_owned()))?;
        let functions = parsed
            .get("functions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Ok(IngredientFact {
            provider: ProviderId::InciBeauty,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk: map_note(note),
            eco_score: Some((note * 5.0).clamp(0.0, 100.0)),
            benefits: functions,
            risks_detailed: String::new(),
            raw_summary: summarize_payload(&payload),
        })
    }
}

/// Note tiers out of 20: below 8 high, below 12 moderate, below 16 low.
fn map_note(note: f64) -> RiskLevel {
    if note < 8.0 {
        RiskLevel::High
    } else if note < 12.0 {
        RiskLevel::Moderate
    } else if note < 16.0 {
        RiskLevel::Low
    } else {
        RiskLevel::None
    }
}
