//! PubChem PUG REST adapter.
//!
//! PubChem carries no safety verdicts; this adapter contributes identity
//! data (formula, weight) to the record's raw trail and leaves the risk
//! classification to the regulatory sources.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// PubChem compound property adapter.
#[derive(Debug, Clone)]
pub struct PubchemProvider {
    base_url: String,
    client: reqwest::Client,
}

impl PubchemProvider {
    /// Create a new PubChem adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for PubchemProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Pubchem
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let url = format!(
            "{}/compound/name/{}/property/MolecularFormula,MolecularWeight/JSON",
            self.base_url,
            name.as_str().replace(' ', "%20")
        );
        let response = self.client.get(&url).send().await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let summary = parse_property_summary(&parsed)
            .ok_or_else(|| ProviderError::Parse("missing PropertyTable".to_owned()))?;

        Ok(IngredientFact {
            provider: ProviderId::Pubchem,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk: RiskLevel::Unknown,
            eco_score: None,
            benefits: String::new(),
            risks_detailed: String::new(),
            raw_summary: format!("{summary}; {}", summarize_payload(&payload)),
        })
    }
}

/// `PropertyTable.Properties[0]` formula and weight, if present.
fn parse_property_summary(value: &Value) -> Option<String> {
    let first = value
        .get("PropertyTable")?
        .get("Properties")?
        .as_array()?
        .first()?;
    let formula = first
        .get("MolecularFormula")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let weight = first
        .get("MolecularWeight")
        .and_then(Value::as_str)
        .unwrap_or("?");
    Some(format!("formula {formula}, weight {weight}"))
}
