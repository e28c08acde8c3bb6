//! EU CosIng adapter.
//!
//! CosIng contributes the ingredient's declared cosmetic functions (the
//! benefits text) and its annex listing: Annex II entries are prohibited,
//! Annex III entries restricted.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// EU CosIng ingredient adapter.
#[derive(Debug, Clone)]
pub struct CosingProvider {
    base_url: String,
    client: reqwest::Client,
}

impl CosingProvider {
    /// Create a new CosIng adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for CosingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Cosing
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
        let (risk, functions, annex) = parse_entry(&parsed);

        Ok(IngredientFact {
            provider: ProviderId::Cosing,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: None,
            benefits: functions,
            risks_detailed: annex
                .map(|a| format!("listed in CosIng Annex {a}"))
                .unwrap_or_default(),
            raw_summary: summarize_payload(&payload),
        })
    }
}

/// First matching CosIng entry: annex listing and declared functions.
fn parse_entry(value: &Value) -> (RiskLevel, String, Option<String>) {
    let Some(entry) = value
        .get("results")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
    else {
        return (RiskLevel::Unknown, String::new(), None);
    };

    let functions = entry
        .get("functions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    let annex = entry
        .get("annex")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let risk = match annex.as_deref() {
        Some("II") => RiskLevel::High,
        Some("III") => RiskLevel::Moderate,
        Some(_) => RiskLevel::Low,
        None => RiskLevel::None,
    };

    (risk, functions, annex)
}
