//! Shared domain types for the resolution engine.
//!
//! Everything that crosses a component boundary lives here: canonical
//! ingredient names, provider identities, per-provider facts, aggregated
//! records, and the product-level analysis returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version stamped on every aggregated record.
///
/// Incremented only by an intentional migration of the `ingredient` table.
pub const SCHEMA_VERSION: i64 = 1;

// ---------------------------------------------------------------------------
// Canonical name
// ---------------------------------------------------------------------------

/// A normalized, synonym-collapsed ingredient identifier.
///
/// Produced exclusively by [`crate::canonical::canonicalize`]; used as the
/// cache and storage key. Two raw tokens that differ only in case, Unicode
/// form, or surrounding whitespace map to the same `CanonicalName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    /// Wrap an already-normalized string.
    ///
    /// Only the canonicalizer and the store (reading values it previously
    /// wrote) construct names; everything else receives them.
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CanonicalName> for String {
    fn from(name: CanonicalName) -> Self {
        name.0
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Identity of an external information source (or the local seed catalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// FDA adverse event reporting system (FAERS).
    Faers,
    /// PubChem PUG REST compound database.
    Pubchem,
    /// Environmental Working Group Skin Deep database.
    Ewg,
    /// Cosmetic Ingredient Review.
    Cir,
    /// EU Scientific Committee on Consumer Safety.
    Sccs,
    /// International Cooperation on Cosmetics Regulation.
    Iccr,
    /// Colombian INVIMA registry.
    Invima,
    /// IARC carcinogen classifications, queried via PubMed.
    Iarc,
    /// INCI Beauty Pro ingredient database.
    InciBeauty,
    /// EU CosIng ingredient database.
    Cosing,
    /// Built-in seed catalog (lowest priority, never fetched remotely).
    LocalSeed,
}

impl ProviderId {
    /// All providers that have a remote adapter, in declaration order.
    pub const REMOTE: [Self; 10] = [
        Self::Faers,
        Self::Pubchem,
        Self::Ewg,
        Self::Cir,
        Self::Sccs,
        Self::Iccr,
        Self::Invima,
        Self::Iarc,
        Self::InciBeauty,
        Self::Cosing,
    ];

    /// Default merge priority, most authoritative first.
    pub const DEFAULT_PRIORITY: [Self; 11] = [
        Self::Iarc,
        Self::Faers,
        Self::Cir,
        Self::Sccs,
        Self::Invima,
        Self::Ewg,
        Self::Iccr,
        Self::InciBeauty,
        Self::Cosing,
        Self::Pubchem,
        Self::LocalSeed,
    ];

    /// Returns the string representation used in config, SQLite, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Faers => "faers",
            Self::Pubchem => "pubchem",
            Self::Ewg => "ewg",
            Self::Cir => "cir",
            Self::Sccs => "sccs",
            Self::Iccr => "iccr",
            Self::Invima => "invima",
            Self::Iarc => "iarc",
            Self::InciBeauty => "inci_beauty",
            Self::Cosing => "cosing",
            Self::LocalSeed => "local_seed",
        }
    }

    /// Parse from a config or SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a registered provider id.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "faers" => Ok(Self::Faers),
            "pubchem" => Ok(Self::Pubchem),
            "ewg" => Ok(Self::Ewg),
            "cir" => Ok(Self::Cir),
            "sccs" => Ok(Self::Sccs),
            "iccr" => Ok(Self::Iccr),
            "invima" => Ok(Self::Invima),
            "iarc" => Ok(Self::Iarc),
            "inci_beauty" => Ok(Self::InciBeauty),
            "cosing" => Ok(Self::Cosing),
            "local_seed" => Ok(Self::LocalSeed),
            other => Err(TypeError::InvalidEnum {
                field: "provider_id",
                value: other.to_owned(),
            }),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

/// Normalized risk classification for one ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No known concern.
    None,
    /// Minor or concentration-dependent concern.
    Low,
    /// Documented concern for some populations or uses.
    Moderate,
    /// Serious documented concern.
    High,
    /// No source could classify the ingredient.
    Unknown,
}

impl RiskLevel {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised risk level.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            "unknown" => Ok(Self::Unknown),
            other => Err(TypeError::InvalidEnum {
                field: "risk_level",
                value: other.to_owned(),
            }),
        }
    }

    /// Deterministic eco-score stand-in when no provider contributed one.
    pub fn fallback_score(&self) -> f64 {
        match self {
            Self::None => 95.0,
            Self::Low => 80.0,
            Self::Moderate => 55.0,
            Self::High => 25.0,
            Self::Unknown => 50.0,
        }
    }

    /// Whether this level should surface in product recommendations.
    pub fn is_problematic(&self) -> bool {
        matches!(self, Self::Moderate | Self::High)
    }
}

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

/// Why a provider call failed. Recovered locally, never surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// Token bucket exhausted and acquisition timed out.
    RateLimited,
    /// Bulkhead concurrency cap reached.
    BulkheadFull,
    /// Circuit breaker rejected the call while open.
    BreakerOpen,
    /// Per-call deadline elapsed.
    Timeout,
    /// Response body did not match the provider schema.
    ParseError,
    /// Upstream answered with a 4xx status.
    Upstream4xx,
    /// Upstream answered with a 5xx status.
    Upstream5xx,
    /// Transport-level connection failure.
    ConnectionReset,
}

impl FailureCode {
    /// Returns the stable string code stored in the audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::BulkheadFull => "bulkhead_full",
            Self::BreakerOpen => "breaker_open",
            Self::Timeout => "timeout",
            Self::ParseError => "parse_error",
            Self::Upstream4xx => "upstream_4xx",
            Self::Upstream5xx => "upstream_5xx",
            Self::ConnectionReset => "connection_reset",
        }
    }
}

/// Outcome of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    /// The provider answered and the payload parsed.
    Ok,
    /// The call failed with a named failure class.
    Failed(FailureCode),
}

impl FactStatus {
    /// Returns the stable string code stored in the audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed(code) => code.as_str(),
        }
    }
}

/// One provider's answer for one canonical name.
///
/// A failure fact is a legitimate value: `status` names the failure class
/// and all semantic fields are empty. `name` and `fetched_at` are always set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientFact {
    /// Which provider produced this fact.
    pub provider: ProviderId,
    /// The canonical name the fact answers for.
    pub name: CanonicalName,
    /// When the provider returned.
    pub fetched_at: DateTime<Utc>,
    /// Call outcome.
    pub status: FactStatus,
    /// Normalized risk classification.
    pub risk: RiskLevel,
    /// Eco score in [0, 100], already normalized at the adapter boundary.
    pub eco_score: Option<f64>,
    /// Free-text benefits summary, empty when unknown.
    pub benefits: String,
    /// Free-text detailed risks, empty when unknown.
    pub risks_detailed: String,
    /// Short summary of the raw payload, for the audit log.
    pub raw_summary: String,
}

impl IngredientFact {
    /// Build a failure fact for the given failure class.
    ///
    /// All semantic fields are empty; callers treat it as a missing source.
    pub fn failure(provider: ProviderId, name: CanonicalName, code: FailureCode) -> Self {
        Self {
            provider,
            name,
            fetched_at: Utc::now(),
            status: FactStatus::Failed(code),
            risk: RiskLevel::Unknown,
            eco_score: None,
            benefits: String::new(),
            risks_detailed: String::new(),
            raw_summary: String::new(),
        }
    }

    /// Whether the provider answered successfully.
    pub fn success(&self) -> bool {
        self.status == FactStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The merged, canonical answer for one ingredient.
///
/// Derived from many [`IngredientFact`]s plus optional seed data; persisted
/// to the relational store and mirrored to the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRecord {
    /// Primary key.
    pub canonical_name: CanonicalName,
    /// Weighted eco score in [0, 100].
    pub eco_score: f64,
    /// Highest-priority risk classification.
    pub risk_level: RiskLevel,
    /// Merged benefits text.
    pub benefits: String,
    /// Merged detailed risks text.
    pub risks_detailed: String,
    /// Contributing providers in priority order, deduplicated.
    pub sources: Vec<ProviderId>,
    /// First persistence time.
    pub created_at: DateTime<Utc>,
    /// Last persistence time; monotonically non-decreasing per name.
    pub updated_at: DateTime<Utc>,
    /// Record schema version, see [`SCHEMA_VERSION`].
    pub schema_version: i64,
}

impl IngredientRecord {
    /// Build the record returned when nothing at all is known about a name.
    pub fn unknown(name: CanonicalName) -> Self {
        let now = Utc::now();
        Self {
            canonical_name: name,
            eco_score: RiskLevel::Unknown.fallback_score(),
            risk_level: RiskLevel::Unknown,
            benefits: String::new(),
            risks_detailed: String::new(),
            sources: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: SCHEMA_VERSION,
        }
    }
}

// ---------------------------------------------------------------------------
// Product analysis
// ---------------------------------------------------------------------------

/// Three-valued product verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suitability {
    /// Average eco score at or above the suitable threshold.
    Suitable,
    /// Middle band, or unknowns dominate.
    Caution,
    /// Low score, or a high-risk ingredient for a sensitive user.
    Avoid,
}

impl Suitability {
    /// Returns the string representation used in CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suitable => "suitable",
            Self::Caution => "caution",
            Self::Avoid => "avoid",
        }
    }
}

/// Product-level aggregate returned by
/// [`crate::engine::Engine::resolve_ingredients`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    /// Caller-supplied product name, may be empty.
    pub product_name: String,
    /// One record per surviving canonical ingredient, input order.
    pub ingredients_details: Vec<IngredientRecord>,
    /// Rounded mean of per-ingredient eco scores.
    pub avg_eco_score: f64,
    /// Product verdict.
    pub suitability: Suitability,
    /// Deterministic recommendation text over the problematic ingredients.
    pub recommendations: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing stored or configured enum values.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// An invalid enum value was read from config or the database.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which field contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },
}
