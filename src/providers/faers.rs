//! FDA adverse event (FAERS) adapter.
//!
//! Queries the openFDA drug event endpoint with a `count=serious` facet and
//! maps report counts to a risk level: any serious report is high risk, more
//! than five total reports moderate, any report low, none clean.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// Total-report threshold for the moderate tier.
const MODERATE_REPORT_THRESHOLD: u64 = 5;

/// openFDA `serious` facet term for serious reports.
const SERIOUS_TERM: u64 = 1;

/// FDA FAERS adverse event adapter.
#[derive(Debug, Clone)]
pub struct FaersProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl FaersProvider {
    /// Create a new FAERS adapter.
    pub fn new(base_url: String, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            base_url,
            api_key,
            client,
        }
    }
}

#[async_trait::async_trait]
impl SourceProvider for FaersProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Faers
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let search = format!("patient.drug.medicinalproduct:\"{}\"", name.as_str());
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[("search", search.as_str()), ("count", "serious")]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request.send().await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let (serious, total) = parse_report_counts(&parsed);
        let risk = map_risk(serious, total);

        Ok(IngredientFact {
            provider: ProviderId::Faers,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: Some(risk.fallback_score()),
            benefits: String::new(),
            risks_detailed: describe(name, serious, total),
            raw_summary: summarize_payload(&payload),
        })
    }
}

/// Extract (serious, total) report counts from the `count=serious` facet.
///
/// An absent or empty `results` array means zero reports, which openFDA also
/// signals with a 404 handled upstream.
fn parse_report_counts(value: &Value) -> (u64, u64) {
    let Some(results) = value.get("results").and_then(Value::as_array) else {
        return (0, 0);
    };

    let mut serious = 0u64;
    let mut total = 0u64;
    for bucket in results {
        let term = bucket.get("term").and_then(Value::as_u64).unwrap_or(0);
        let count = bucket.get("count").and_then(Value::as_u64).unwrap_or(0);
        total = total.saturating_add(count);
        if term == SERIOUS_TERM {
            serious = serious.saturating_add(count);
        }
    }
    (serious, total)
}

fn map_risk(serious: u64, total: u64) -> RiskLevel {
    if serious > 0 {
        RiskLevel::High
    } else if total > MODERATE_REPORT_THRESHOLD {
        RiskLevel::Moderate
    } else if total > 0 {
        RiskLevel::Low
    } else {
        RiskLevel::None
    }
}

fn describe(name: &CanonicalName, serious: u64, total: u64) -> String {
    if total == 0 {
        return String::new();
    }
    format!(
        "FAERS lists {total} adverse event reports mentioning {name}, {serious} of them serious"
    )
}
