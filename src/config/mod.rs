//! Configuration loading and management.
//!
//! Loads engine configuration from `./inciguard.toml` (or
//! `$INCIGUARD_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.
//!
//! Providers are configured declaratively: the default set registers all ten
//! remote sources with their default priorities, weights, and limits; a
//! `[[providers]]` array in the file replaces that set entirely.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::ProviderId;

// ── Top-level config ────────────────────────────────────────────

/// Top-level engine configuration loaded from TOML.
///
/// Path: `./inciguard.toml` or `$INCIGUARD_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolver orchestration limits.
    pub orchestrator: OrchestratorConfig,
    /// In-process cache sizing and freshness.
    pub cache: CacheConfig,
    /// Relational store location.
    pub store: StoreConfig,
    /// Document-store mirror (best effort, disabled by default).
    pub mirror: MirrorConfig,
    /// Product verdict thresholds and sensitivity contexts.
    pub suitability: SuitabilityConfig,
    /// Per-provider adapter settings.
    pub providers: Vec<ProviderConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            mirror: MirrorConfig::default(),
            suitability: SuitabilityConfig::default(),
            providers: default_providers(),
        }
    }
}

impl EngineConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$INCIGUARD_CONFIG_PATH` or `./inciguard.toml`.
    /// If the file does not exist, returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: EngineConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(EngineConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("INCIGUARD_CONFIG_PATH")
            .map_or_else(|| PathBuf::from("inciguard.toml"), PathBuf::from)
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("INCIGUARD_DB_PATH") {
            self.store.db_path = v;
        }

        if let Some(v) = env("INCIGUARD_OVERALL_DEADLINE_SECS") {
            match v.parse() {
                Ok(n) => self.orchestrator.overall_deadline_secs = n,
                Err(_) => tracing::warn!(
                    var = "INCIGUARD_OVERALL_DEADLINE_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env("INCIGUARD_MAX_IN_FLIGHT") {
            match v.parse() {
                Ok(n) => self.orchestrator.max_global_in_flight = n,
                Err(_) => tracing::warn!(
                    var = "INCIGUARD_MAX_IN_FLIGHT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        // Mirror — env var presence enables the mirror.
        if let Some(url) = env("INCIGUARD_MIRROR_URL") {
            self.mirror.enabled = true;
            self.mirror.base_url = url;
        }

        // Comma-separated provider ids to disable, e.g. "ewg,cosing".
        if let Some(list) = env("INCIGUARD_DISABLE_PROVIDERS") {
            for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match ProviderId::parse(raw) {
                    Ok(id) => {
                        for p in self.providers.iter_mut().filter(|p| p.id == id) {
                            p.enabled = false;
                        }
                    }
                    Err(_) => tracing::warn!(
                        var = "INCIGUARD_DISABLE_PROVIDERS",
                        value = raw,
                        "ignoring unknown provider id"
                    ),
                }
            }
        }
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML does not parse or is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    fn validate(&self) -> Result<()> {
        for p in &self.providers {
            if !(0.0..=1.0).contains(&p.breaker.failure_rate) {
                anyhow::bail!(
                    "provider {}: breaker failure_rate must be in [0, 1], got {}",
                    p.id,
                    p.breaker.failure_rate
                );
            }
            if p.weight < 0.0 {
                anyhow::bail!("provider {}: weight must be non-negative", p.id);
            }
            if p.bulkhead.max_concurrent == 0 {
                anyhow::bail!("provider {}: bulkhead max_concurrent must be at least 1", p.id);
            }
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.providers {
            if !seen.insert(p.id) {
                anyhow::bail!("provider {} configured twice", p.id);
            }
        }
        if self.orchestrator.max_global_in_flight == 0 {
            anyhow::bail!("orchestrator max_global_in_flight must be at least 1");
        }
        Ok(())
    }

    /// Config entry for one provider, if configured.
    pub fn provider(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }
}

// ── Orchestrator config ─────────────────────────────────────────

/// Resolver orchestration limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Global cap on concurrent external calls across all resolutions.
    pub max_global_in_flight: usize,
    /// Hard budget for one `resolve_ingredients` call, in seconds.
    pub overall_deadline_secs: u64,
    /// Successful provider answers required to mint a fresh record.
    pub min_providers_for_fresh: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_global_in_flight: 64,
            overall_deadline_secs: 30,
            min_providers_for_fresh: 1,
        }
    }
}

// ── Cache config ────────────────────────────────────────────────

/// In-process cache sizing and record freshness.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bound on total in-process cache entries before LRU eviction.
    pub max_entries: usize,
    /// Default TTL for cached entries, in seconds.
    pub default_ttl_secs: u64,
    /// How old a stored record may be and still be served without
    /// re-resolution, in seconds.
    pub record_max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            default_ttl_secs: 24 * 60 * 60,
            record_max_age_secs: 24 * 60 * 60,
        }
    }
}

// ── Store config ────────────────────────────────────────────────

/// Relational store location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path. `:memory:` is accepted for tests.
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "inciguard.db".to_owned(),
        }
    }
}

// ── Mirror config ───────────────────────────────────────────────

/// Document-store mirror settings. Best effort: mirror failures never fail
/// a resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Whether the mirror is active.
    pub enabled: bool,
    /// Document store base URL.
    pub base_url: String,
    /// Env var holding the bearer token, read at startup.
    pub auth_env: String,
    /// Collection name the records are mirrored into.
    pub collection: String,
    /// Bound on queued retries held by the reconciler.
    pub retry_queue_size: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            auth_env: "INCIGUARD_MIRROR_TOKEN".to_owned(),
            collection: "ingredients".to_owned(),
            retry_queue_size: 256,
        }
    }
}

// ── Suitability config ──────────────────────────────────────────

/// Product verdict thresholds and the sensitivity predicate's vocabulary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuitabilityConfig {
    /// Average eco score at or above this is `suitable`.
    pub suitable_min: f64,
    /// Average eco score at or above this (and below `suitable_min`) is
    /// `caution`; anything lower is `avoid`.
    pub caution_min: f64,
    /// A user context containing any of these substrings (case-insensitive)
    /// is treated as sensitive, forcing `avoid` when a high-risk ingredient
    /// is present.
    pub sensitive_contexts: Vec<String>,
}

impl Default for SuitabilityConfig {
    fn default() -> Self {
        Self {
            suitable_min: 75.0,
            caution_min: 50.0,
            sensitive_contexts: vec![
                "sensitive".to_owned(),
                "pregnan".to_owned(),
                "baby".to_owned(),
                "infant".to_owned(),
                "allerg".to_owned(),
            ],
        }
    }
}

impl SuitabilityConfig {
    /// Whether the opaque user context implies a sensitivity concern.
    pub fn is_sensitive(&self, user_context: &str) -> bool {
        let lowered = user_context.to_lowercase();
        self.sensitive_contexts.iter().any(|s| lowered.contains(s.as_str()))
    }
}

// ── Provider config ─────────────────────────────────────────────

/// Declarative settings for one remote provider adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Registered provider identity.
    pub id: ProviderId,
    /// Disabled providers are never fanned out to.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Adapter base URL.
    #[serde(default)]
    pub base_url: String,
    /// Env var holding the API key, read at adapter construction. Empty
    /// means the provider needs no auth.
    #[serde(default)]
    pub auth_env: String,
    /// Merge priority; lower is more authoritative.
    #[serde(default)]
    pub priority: u32,
    /// Weight in the eco-score weighted mean.
    #[serde(default)]
    pub weight: f64,
    /// TTL for cached facts from this provider, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_seconds: u64,
    /// Token bucket settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Circuit breaker settings.
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Concurrency cap settings.
    #[serde(default)]
    pub bulkhead: BulkheadConfig,
    /// Retry settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Hard deadline for one wrapped call, in milliseconds.
    #[serde(default = "default_per_call_deadline_ms")]
    pub per_call_deadline_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_per_call_deadline_ms() -> u64 {
    5_000
}

/// Token bucket: `limit` tokens refill every `period_secs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Refill period in seconds.
    pub period_secs: u64,
    /// Tokens per period.
    pub limit: u32,
    /// How long an acquisition may wait before failing `rate_limited`,
    /// in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            period_secs: 1,
            limit: 10,
            acquire_timeout_ms: 1_000,
        }
    }
}

/// Sliding-window circuit breaker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failure rate over the window that trips the breaker, in [0, 1].
    pub failure_rate: f64,
    /// Minimum samples in the window before the rate is considered.
    pub min_calls: u32,
    /// Sliding window size, in calls.
    pub window: usize,
    /// How long the breaker stays open before probing, in seconds.
    pub open_secs: u64,
    /// Probe calls admitted while half-open.
    pub half_open_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.5,
            min_calls: 5,
            window: 20,
            open_secs: 30,
            half_open_probes: 2,
        }
    }
}

/// Concurrency cap for in-flight calls to one provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    /// Maximum concurrent in-flight requests; over-limit calls fail fast.
    pub max_concurrent: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: 8 }
    }
}

/// Retry policy for transient failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Exponential backoff base, in milliseconds. Jitter is drawn from
    /// `[0, base)`.
    pub base_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff_ms: 100,
        }
    }
}

// ── Default provider set ────────────────────────────────────────

/// Representative default weights from the scoring design; providers not
/// listed here weigh 0.10.
fn default_weight(id: ProviderId) -> f64 {
    match id {
        ProviderId::Faers => 0.30,
        ProviderId::Ewg => 0.25,
        ProviderId::Cir => 0.20,
        ProviderId::Sccs => 0.15,
        _ => 0.10,
    }
}

fn default_base_url(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Faers => "https://api.fda.gov/drug/event.json",
        ProviderId::Pubchem => "https://pubchem.ncbi.nlm.nih.gov/rest/pug",
        ProviderId::Ewg => "https://www.ewg.org/skindeep/api",
        ProviderId::Cir => "https://cir-reports.cir-safety.org/api",
        ProviderId::Sccs => "https://ec.europa.eu/health/scientific_committees/api",
        ProviderId::Iccr => "https://www.iccr-cosmetics.org/api",
        ProviderId::Invima => "https://www.invima.gov.co/api",
        ProviderId::Iarc => "https://eutils.ncbi.nlm.nih.gov/entrez/eutils",
        ProviderId::InciBeauty => "https://incibeauty.com/api",
        ProviderId::Cosing => "https://api.tech.ec.europa.eu/cosing/v1",
        ProviderId::LocalSeed => "",
    }
}

fn default_auth_env(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Faers => "FDA_API_KEY",
        ProviderId::InciBeauty => "INCI_BEAUTY_API_KEY",
        _ => "",
    }
}

/// The full default provider set, priorities from
/// [`ProviderId::DEFAULT_PRIORITY`].
fn default_providers() -> Vec<ProviderConfig> {
    ProviderId::REMOTE
        .iter()
        .map(|&id| {
            let priority = ProviderId::DEFAULT_PRIORITY
                .iter()
                .position(|&p| p == id)
                .and_then(|p| u32::try_from(p).ok())
                .unwrap_or(u32::MAX);
            ProviderConfig {
                id,
                enabled: true,
                base_url: default_base_url(id).to_owned(),
                auth_env: default_auth_env(id).to_owned(),
                priority,
                weight: default_weight(id),
                ttl_seconds: default_ttl_secs(),
                rate_limit: RateLimitConfig::default(),
                breaker: BreakerConfig::default(),
                bulkhead: BulkheadConfig::default(),
                retry: RetryConfig::default(),
                per_call_deadline_ms: default_per_call_deadline_ms(),
            }
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────
