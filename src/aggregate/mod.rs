//! Merging of per-provider facts into one canonical record.
//!
//! The aggregator is pure: same bag of facts in, same record out, in any
//! order, regardless of clock. All I/O (fetching, caching, persistence)
//! happens around it. Merge rules:
//!
//! - risk level: highest-priority non-unknown answer wins, ties broken by
//!   the earliest-fetched fact
//! - eco score: weighted mean over successful facts that carried a score,
//!   falling back to a fixed mapping from the merged risk level
//! - benefits / detailed risks: unique non-empty texts joined in priority
//!   order, capped
//! - sources: contributing providers in priority order, deduplicated

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::types::{
    CanonicalName, IngredientFact, IngredientRecord, ProviderId, RiskLevel, SCHEMA_VERSION,
};

/// Cap on merged benefits / risks text, in characters.
const MAX_TEXT_LEN: usize = 2_000;

/// Weight for providers absent from the configuration (notably the local
/// seed catalog).
const DEFAULT_WEIGHT: f64 = 0.10;

/// Priority- and weight-aware fact merger.
///
/// Built once from configuration and shared by all resolutions.
#[derive(Debug, Clone)]
pub struct Aggregator {
    priorities: HashMap<ProviderId, u32>,
    weights: HashMap<ProviderId, f64>,
}

impl Aggregator {
    /// Build from the configured provider priorities and weights.
    pub fn from_config(config: &EngineConfig) -> Self {
        let priorities = config
            .providers
            .iter()
            .map(|p| (p.id, p.priority))
            .collect();
        let weights = config.providers.iter().map(|p| (p.id, p.weight)).collect();
        Self { priorities, weights }
    }

    fn priority_of(&self, provider: ProviderId) -> u32 {
        if let Some(p) = self.priorities.get(&provider) {
            return *p;
        }
        // Unconfigured providers (the seed catalog) sort by the default
        // merge order, after everything explicitly configured.
        ProviderId::DEFAULT_PRIORITY
            .iter()
            .position(|&id| id == provider)
            .and_then(|p| u32::try_from(p).ok())
            .map_or(u32::MAX, |p| p.saturating_add(1_000))
    }

    fn weight_of(&self, provider: ProviderId) -> f64 {
        self.weights.get(&provider).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    /// Merge a bag of facts into one record.
    ///
    /// `as_of` stamps `created_at`/`updated_at`; the store adjusts both on
    /// upsert. Facts with `success == false` contribute nothing. An empty
    /// or all-failed bag yields the unknown record.
    pub fn aggregate(
        &self,
        name: &CanonicalName,
        facts: &[IngredientFact],
        as_of: DateTime<Utc>,
    ) -> IngredientRecord {
        // Deterministic merge order: priority, then fetch time, then id.
        let mut contributing: Vec<&IngredientFact> =
            facts.iter().filter(|f| f.success()).collect();
        contributing.sort_by(|a, b| {
            self.priority_of(a.provider)
                .cmp(&self.priority_of(b.provider))
                .then(a.fetched_at.cmp(&b.fetched_at))
                .then(a.provider.as_str().cmp(b.provider.as_str()))
        });

        let risk_level = contributing
            .iter()
            .find(|f| f.risk != RiskLevel::Unknown)
            .map_or(RiskLevel::Unknown, |f| f.risk);

        let eco_score = self.eco_score(&contributing, risk_level);
        let benefits = merged_text(&contributing, |f| &f.benefits);
        let risks_detailed = merged_text(&contributing, |f| &f.risks_detailed);

        let mut sources = Vec::new();
        for fact in &contributing {
            if !sources.contains(&fact.provider) {
                sources.push(fact.provider);
            }
        }

        IngredientRecord {
            canonical_name: name.clone(),
            eco_score,
            risk_level,
            benefits,
            risks_detailed,
            sources,
            created_at: as_of,
            updated_at: as_of,
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Weighted mean over contributed scores, else the risk-level fallback.
    fn eco_score(&self, contributing: &[&IngredientFact], risk_level: RiskLevel) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for fact in contributing {
            if let Some(score) = fact.eco_score {
                let weight = self.weight_of(fact.provider);
                weighted_sum += weight * score;
                weight_sum += weight;
            }
        }
        if weight_sum > 0.0 {
            (weighted_sum / weight_sum).round().clamp(0.0, 100.0)
        } else {
            risk_level.fallback_score()
        }
    }
}

/// Unique non-empty texts in merge order, ". "-joined and capped.
fn merged_text<'a>(
    contributing: &[&'a IngredientFact],
    field: impl Fn(&'a IngredientFact) -> &'a str,
) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for &fact in contributing {
        let text = field(fact).trim();
        if !text.is_empty() && !seen.contains(&text) {
            seen.push(text);
        }
    }
    let joined = seen.join(". ");
    if joined.chars().count() > MAX_TEXT_LEN {
        joined.chars().take(MAX_TEXT_LEN).collect()
    } else {
        joined
    }
}
