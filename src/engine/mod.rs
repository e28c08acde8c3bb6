//! Resolver orchestrator.
//!
//! The [`Engine`] owns every component of a resolution: canonicalizer
//! output flows through the in-process cache, the relational store, and the
//! provider fan-out, then back through the aggregator and the dual-store
//! writer. Components are explicit dependencies wired at construction; no
//! module-level state exists anywhere in the crate.
//!
//! Concurrency model: each unique canonical name resolves in its own task,
//! single-flighted per name, with all external calls bounded by a global
//! semaphore and the whole request bounded by `overall_deadline`. Fan-out
//! tasks are children of the request scope; only the mirror reconciler
//! outlives a request, and [`Engine::shutdown`] drains it.

pub mod flight;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::cache::{CacheStats, TtlCache};
use crate::canonical::canonicalize;
use crate::catalog;
use crate::config::EngineConfig;
use crate::providers::registry::ProviderRegistry;
use crate::resilience::ProviderHealth;
use crate::store::mirror::{run_reconciler, DocumentMirror, MirrorStats};
use crate::store::{DualStoreWriter, RelationalStore, StoreError};
use crate::types::{
    CanonicalName, IngredientFact, IngredientRecord, ProductAnalysis, RiskLevel, Suitability,
};

use self::flight::FlightGroup;

/// Maximum raw tokens per request.
const MAX_TOKENS: usize = 200;

/// Maximum characters per raw token.
const MAX_TOKEN_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced to engine callers.
///
/// Provider-local failures never appear here; they are recovered inside the
/// resolution and at worst degrade a record to `unknown`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller-supplied input violates the request constraints.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// The overall resolution budget elapsed.
    #[error("overall deadline exceeded")]
    DeadlineExceeded,

    /// The primary store is unreachable, returned corrupt data, or a
    /// resolution task died.
    #[error("internal error: {reason}")]
    Internal {
        /// What failed.
        reason: String,
    },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Internal {
            reason: err.to_string(),
        }
    }
}

impl EngineError {
    /// Stable error code for CLI and API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Internal { .. } => "internal_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Engine health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Per-provider breaker state, recent error rate, and mean latency.
    pub providers: BTreeMap<String, ProviderHealth>,
    /// In-process cache counters.
    pub cache: CacheStats,
    /// Whether the relational store answers a trivial probe.
    pub store_reachable: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Everything a resolution task needs, cheap to clone into child tasks.
#[derive(Clone)]
struct ResolveCtx {
    config: Arc<EngineConfig>,
    cache: Arc<TtlCache>,
    registry: Arc<ProviderRegistry>,
    store: Arc<RelationalStore>,
    writer: Arc<DualStoreWriter>,
    aggregator: Arc<Aggregator>,
    flights: Arc<FlightGroup>,
    fanout_limit: Arc<Semaphore>,
}

/// The ingredient resolution engine.
///
/// Construct with [`Engine::new`] (or [`Engine::with_parts`] to inject a
/// store and provider set, as the tests do), call
/// [`Engine::resolve_ingredients`] / [`Engine::get_ingredient`] /
/// [`Engine::health`], and finish with [`Engine::shutdown`].
pub struct Engine {
    ctx: ResolveCtx,
    mirror_task: Option<tokio::task::JoinHandle<()>>,
    mirror_stats: Arc<MirrorStats>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("providers", &self.ctx.registry.len())
            .field("mirroring", &self.mirror_task.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build the engine from configuration: open the store, construct the
    /// provider registry, and start the mirror reconciler if enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the relational store cannot be opened.
    pub async fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let store = RelationalStore::connect(&config.store.db_path).await?;
        let registry = ProviderRegistry::from_config(&config);
        Ok(Self::with_parts(config, registry, store))
    }

    /// Assemble the engine from pre-built parts.
    ///
    /// Used by tests to substitute deterministic providers and an
    /// in-memory store; production goes through [`Engine::new`].
    pub fn with_parts(
        config: EngineConfig,
        registry: ProviderRegistry,
        store: RelationalStore,
    ) -> Self {
        let cache = Arc::new(TtlCache::new(
            config.cache.max_entries,
            Duration::from_secs(config.cache.default_ttl_secs),
        ));
        let store = Arc::new(store);
        let aggregator = Arc::new(Aggregator::from_config(&config));
        let fanout_limit = Arc::new(Semaphore::new(config.orchestrator.max_global_in_flight));

        let mirror_stats = Arc::new(MirrorStats::default());
        let (mirror_tx, mirror_task) = if config.mirror.enabled {
            let (tx, rx) = mpsc::channel(config.mirror.retry_queue_size.max(1));
            let mirror = DocumentMirror::from_config(&config.mirror);
            let task = tokio::spawn(run_reconciler(mirror, rx, Arc::clone(&mirror_stats)));
            (Some(tx), Some(task))
        } else {
            (None, None)
        };

        let writer = Arc::new(DualStoreWriter::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            mirror_tx,
        ));

        info!(
            providers = registry.len(),
            mirroring = mirror_task.is_some(),
            "engine initialised"
        );

        Self {
            ctx: ResolveCtx {
                config: Arc::new(config),
                cache,
                registry: Arc::new(registry),
                store,
                writer,
                aggregator,
                flights: Arc::new(FlightGroup::default()),
                fanout_limit,
            },
            mirror_task,
            mirror_stats,
        }
    }

    /// Resolve a full ingredient list into a product analysis.
    ///
    /// `user_context` is an opaque tag that only biases the suitability
    /// verdict; it never alters per-ingredient facts. Partial provider
    /// failures degrade individual records, never the call.
    ///
    /// # Errors
    ///
    /// `invalid_input` for empty or over-limit input, `deadline_exceeded`
    /// when the overall budget elapses, `internal_error` when the primary
    /// store is unavailable.
    pub async fn resolve_ingredients(
        &self,
        raw_tokens: &[String],
        user_context: &str,
        product_name: &str,
    ) -> Result<ProductAnalysis, EngineError> {
        let names = validate_and_canonicalize(raw_tokens)?;
        let deadline = Duration::from_secs(self.ctx.config.orchestrator.overall_deadline_secs);

        let records = tokio::time::timeout(deadline, self.resolve_all(names))
            .await
            .map_err(|_| EngineError::DeadlineExceeded)??;

        Ok(self.product_analysis(product_name, user_context, records))
    }

    /// Resolve a single raw token.
    ///
    /// # Errors
    ///
    /// Same error surface as [`Engine::resolve_ingredients`];
    /// `invalid_input` also covers tokens the canonicalizer rejects.
    pub async fn get_ingredient(&self, raw_token: &str) -> Result<IngredientRecord, EngineError> {
        if raw_token.chars().count() > MAX_TOKEN_CHARS {
            return Err(EngineError::InvalidInput {
                reason: format!("token exceeds {MAX_TOKEN_CHARS} characters"),
            });
        }
        let name = canonicalize(raw_token).ok_or_else(|| EngineError::InvalidInput {
            reason: format!("token {raw_token:?} is not an ingredient name"),
        })?;

        let deadline = Duration::from_secs(self.ctx.config.orchestrator.overall_deadline_secs);
        let record = tokio::time::timeout(deadline, resolve_one(self.ctx.clone(), name))
            .await
            .map_err(|_| EngineError::DeadlineExceeded)??;
        Ok(record)
    }

    /// Engine health: provider breaker states, cache counters, store
    /// reachability.
    pub async fn health(&self) -> HealthReport {
        let providers = self
            .ctx
            .registry
            .providers()
            .iter()
            .map(|p| (p.id().as_str().to_owned(), p.health()))
            .collect();
        HealthReport {
            providers,
            cache: self.ctx.cache.stats(),
            store_reachable: self.ctx.store.ping().await,
        }
    }

    /// Records abandoned by the mirror reconciler (observability hook).
    pub fn mirror_abandoned(&self) -> u64 {
        self.mirror_stats
            .abandoned
            .load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Stop the mirror reconciler, draining queued writes.
    pub async fn shutdown(self) {
        let Self {
            ctx, mirror_task, ..
        } = self;
        // Dropping the writer's sender stops the reconciler loop.
        drop(ctx);
        if let Some(task) = mirror_task {
            let _ = task.await;
        }
        info!("engine shut down");
    }

    /// Resolve each unique name concurrently, preserving input order.
    async fn resolve_all(
        &self,
        names: Vec<CanonicalName>,
    ) -> Result<Vec<IngredientRecord>, EngineError> {
        let mut tasks = JoinSet::new();
        for (index, name) in names.iter().cloned().enumerate() {
            let ctx = self.ctx.clone();
            tasks.spawn(async move { (index, resolve_one(ctx, name).await) });
        }

        let mut slots: Vec<Option<IngredientRecord>> = names.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(record))) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(record);
                    }
                }
                Ok((_, Err(store_error))) => return Err(store_error.into()),
                Err(join_error) => {
                    warn!(error = %join_error, "resolution task failed");
                    return Err(EngineError::Internal {
                        reason: "resolution task aborted".to_owned(),
                    });
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Product-level aggregate over the resolved records.
    fn product_analysis(
        &self,
        product_name: &str,
        user_context: &str,
        records: Vec<IngredientRecord>,
    ) -> ProductAnalysis {
        let avg_eco_score = mean_score(&records);
        let suitability = self.suitability(avg_eco_score, &records, user_context);
        let recommendations = recommendations_text(&records);

        ProductAnalysis {
            product_name: product_name.to_owned(),
            ingredients_details: records,
            avg_eco_score,
            suitability,
            recommendations,
        }
    }

    fn suitability(
        &self,
        avg: f64,
        records: &[IngredientRecord],
        user_context: &str,
    ) -> Suitability {
        let thresholds = &self.ctx.config.suitability;
        let base = if avg >= thresholds.suitable_min {
            Suitability::Suitable
        } else if avg >= thresholds.caution_min {
            Suitability::Caution
        } else {
            Suitability::Avoid
        };

        let has_high_risk = records.iter().any(|r| r.risk_level == RiskLevel::High);
        if has_high_risk && thresholds.is_sensitive(user_context) {
            Suitability::Avoid
        } else {
            base
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution ladder
// ---------------------------------------------------------------------------

/// Resolve one canonical name: L1 record, then fresh L2, then fan-out.
///
/// Single-flighted per name; concurrent callers for the same name observe
/// the leader's record. Store failures propagate — they are the only
/// non-recoverable path.
async fn resolve_one(
    ctx: ResolveCtx,
    name: CanonicalName,
) -> Result<IngredientRecord, StoreError> {
    let key_lock = ctx.flights.lock_for(&name);
    let guard = key_lock.lock().await;
    let result = resolve_one_locked(&ctx, &name).await;
    drop(guard);
    drop(key_lock);
    ctx.flights.release(&name);
    result
}

async fn resolve_one_locked(
    ctx: &ResolveCtx,
    name: &CanonicalName,
) -> Result<IngredientRecord, StoreError> {
    // L1 — the follower path after a single-flight wait lands here.
    if let Some(record) = ctx.cache.get_record(name) {
        return Ok(record);
    }

    // L2, if fresh enough.
    let max_age = chrono::Duration::seconds(
        i64::try_from(ctx.config.cache.record_max_age_secs).unwrap_or(i64::MAX),
    );
    let stored = ctx.store.get_record(name).await?;
    if let Some(record) = &stored {
        if Utc::now().signed_duration_since(record.updated_at) <= max_age {
            ctx.cache.put_record(record.clone());
            return Ok(record.clone());
        }
    }

    // Provider fan-out.
    let facts = fan_out(ctx, name).await;
    let successes = facts.iter().filter(|f| f.success()).count();
    let seed = catalog::seed_fact(name);

    if successes >= ctx.config.orchestrator.min_providers_for_fresh {
        let mut bag = facts;
        if let Some(seed_fact) = seed {
            bag.push(seed_fact);
        }
        let record = ctx.aggregator.aggregate(name, &bag, Utc::now());
        return ctx.writer.persist(record).await;
    }

    // Not enough fresh answers: serve the stale record if one exists.
    if let Some(stale) = stored {
        debug!(%name, "serving stale record, providers unavailable");
        return Ok(stale);
    }

    // Seed-only fallback keeps common names meaningful offline.
    if let Some(seed_fact) = seed {
        let record = ctx.aggregator.aggregate(name, &[seed_fact], Utc::now());
        return ctx.writer.persist(record).await;
    }

    // Nothing anywhere: an unknown record, cached but not persisted.
    debug!(%name, "no information from any source");
    let unknown = IngredientRecord::unknown(name.clone());
    ctx.cache.put_record(unknown.clone());
    Ok(unknown)
}

/// Fan out to every registered provider, reusing cached facts.
///
/// Fetches run concurrently under the global in-flight cap; each is
/// individually bounded by its provider's per-call deadline and returns a
/// failure fact rather than an error. Fresh outcomes are audit-logged and
/// successful ones cached under the provider's TTL.
async fn fan_out(ctx: &ResolveCtx, name: &CanonicalName) -> Vec<IngredientFact> {
    let mut facts = Vec::with_capacity(ctx.registry.len());
    let mut tasks = JoinSet::new();

    for provider in ctx.registry.providers() {
        if let Some(cached) = ctx.cache.get_fact(provider.id(), name) {
            facts.push(cached);
            continue;
        }

        let Ok(permit) = Arc::clone(&ctx.fanout_limit).acquire_owned().await else {
            break;
        };
        let provider = Arc::clone(provider);
        let name = name.clone();
        tasks.spawn(async move {
            let fact = provider.fetch_fact(&name).await;
            drop(permit);
            (fact, provider.fact_ttl())
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let Ok((fact, ttl)) = joined else { continue };
        if let Err(error) = ctx.store.log_source(&fact).await {
            warn!(error = %error, "audit log write failed");
        }
        if fact.success() {
            ctx.cache.put_fact(fact.clone(), ttl);
        }
        facts.push(fact);
    }

    facts
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate request constraints and produce the unique canonical name list,
/// preserving first-seen order.
fn validate_and_canonicalize(raw_tokens: &[String]) -> Result<Vec<CanonicalName>, EngineError> {
    if raw_tokens.is_empty() {
        return Err(EngineError::InvalidInput {
            reason: "empty ingredient list".to_owned(),
        });
    }
    if raw_tokens.len() > MAX_TOKENS {
        return Err(EngineError::InvalidInput {
            reason: format!("more than {MAX_TOKENS} tokens"),
        });
    }
    if let Some(oversized) = raw_tokens
        .iter()
        .find(|t| t.chars().count() > MAX_TOKEN_CHARS)
    {
        return Err(EngineError::InvalidInput {
            reason: format!(
                "token {:?}... exceeds {MAX_TOKEN_CHARS} characters",
                oversized.chars().take(24).collect::<String>()
            ),
        });
    }

    let mut names = Vec::new();
    for token in raw_tokens {
        if let Some(name) = canonicalize(token) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    if names.is_empty() {
        return Err(EngineError::InvalidInput {
            reason: "no resolvable ingredient tokens".to_owned(),
        });
    }
    Ok(names)
}

/// Rounded mean of the per-ingredient eco scores.
#[allow(clippy::cast_precision_loss)]
fn mean_score(records: &[IngredientRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: f64 = records.iter().map(|r| r.eco_score).sum();
    (sum / records.len() as f64).round()
}

/// Deterministic recommendation text over the problematic ingredients.
fn recommendations_text(records: &[IngredientRecord]) -> String {
    let problematic: Vec<&IngredientRecord> = records
        .iter()
        .filter(|r| r.risk_level.is_problematic())
        .collect();

    if problematic.is_empty() {
        return "No ingredients of concern were identified.".to_owned();
    }

    let listed = problematic
        .iter()
        .map(|r| format!("{} ({} risk)", r.canonical_name, r.risk_level.as_str()))
        .collect::<Vec<_>>()
        .join("; ");
    let worst = problematic
        .iter()
        .max_by_key(|r| match r.risk_level {
            RiskLevel::High => 2,
            RiskLevel::Moderate => 1,
            _ => 0,
        })
        .map_or_else(String::new, |r| r.canonical_name.to_string());

    format!(
        "Ingredients of concern: {listed}. Consider a formulation that avoids {worst}."
    )
}
