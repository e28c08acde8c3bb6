//! IARC carcinogen classification adapter, queried via PubMed E-utilities.
//!
//! IARC monographs have no public REST surface; the adapter follows the
//! established workaround of searching PubMed for monograph citations and
//! treating the citation volume as a carcinogenicity signal. Hits are
//! scanned for group labels so an explicit "Group 1" classification is
//! never diluted by a low citation count.

use chrono::Utc;
use serde_json::Value;

use super::{check_http_response, summarize_payload, ProviderError, SourceProvider};
use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// Citation count that alone suggests a documented concern.
const MODERATE_CITATION_THRESHOLD: u64 = 10;

/// IARC-via-PubMed adapter.
#[derive(Debug, Clone)]
pub struct IarcProvider {
    base_url: String,
    client: reqwest::Client,
}

impl IarcProvider {
    /// Create a new IARC adapter.
    pub fn new(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl SourceProvider for IarcProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Iarc
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let term = format!("\"{}\" AND IARC monograph carcinogen", name.as_str());
        let url = format!("{}/esearch.fcgi", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("term", term.as_str()),
                ("retmode", "json"),
            ])
            .send()
            .await?;
        let payload = check_http_response(response).await?;

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let count = parse_hit_count(&parsed)
            .ok_or_else(|| ProviderError::Parse("missing esearchresult.count".to_owned()))?;
        let group = parse_group_label(&parsed);
        let risk = map_risk(count, group);

        Ok(IngredientFact {
            provider: ProviderId::Iarc,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: Some(risk.fallback_score()),
            benefits: String::new(),
            risks_detailed: describe(name, count, group),
            raw_summary: summarize_payload(&payload),
        })
    }
}

/// `esearchresult.count` arrives as a JSON string.
fn parse_hit_count(value: &Value) -> Option<u64> {
    value
        .get("esearchresult")?
        .get("count")?
        .as_str()?
        .parse()
        .ok()
}

/// Scan translated query terms for an explicit IARC group label.
fn parse_group_label(value: &Value) -> Option<u8> {
    let translation = value
        .get("esearchresult")?
        .get("querytranslation")?
        .as_str()?
        .to_lowercase();
    if translation.contains("group 1") {
        Some(1)
    } else if translation.contains("group 2a") || translation.contains("group 2b") {
        Some(2)
    } else {
        None
    }
}

fn map_risk(count: u64, group: Option<u8>) -> RiskLevel {
    match group {
        Some(1) => RiskLevel::High,
        Some(_) => RiskLevel::Moderate,
        None if count >= MODERATE_CITATION_THRESHOLD => RiskLevel::Moderate,
        None if count > 0 => RiskLevel::Low,
        None => RiskLevel::None,
    }
}

fn describe(name: &CanonicalName, count: u64, group: Option<u8>) -> String {
    match group {
        Some(g) => format!("IARC group {g} classification cited for {name}"),
        None if count > 0 => {
            format!("{count} PubMed citations link {name} to IARC carcinogen monographs")
        }
        None => String::new(),
    }
}
