//! Relational store (L2) and the dual-store write path.
//!
//! The `ingredient` table is the source of truth: one row per canonical
//! name, written with upsert semantics and a monotonically non-decreasing
//! `updated_at`. The `external_source_log` table keeps an audit trail of
//! every provider outcome (success or named failure).
//!
//! The [`DualStoreWriter`] enforces the write ordering: relational upsert
//! (authoritative — its failure fails the resolution), then the in-process
//! cache, then a best-effort hand-off to the document-store mirror. No
//! other code path writes to the mirror.

pub mod mirror;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::types::{
    CanonicalName, IngredientFact, IngredientRecord, ProviderId, RiskLevel, TypeError,
};

/// Errors from relational store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row contained an unparseable enum or timestamp.
    #[error("corrupt row for {name}: {detail}")]
    CorruptRow {
        /// The canonical name of the bad row.
        name: String,
        /// What failed to parse.
        detail: String,
    },
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::CorruptRow {
            name: String::new(),
            detail: err.to_string(),
        }
    }
}

/// SQLite-backed ingredient store.
#[derive(Debug, Clone)]
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    /// Open (creating if missing) the database and run the idempotent DDL.
    ///
    /// `:memory:` is accepted for tests; the pool is then pinned to a
    /// single connection so every query sees the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub async fn connect(db_path: &str) -> Result<Self, StoreError> {
        let pool = if db_path == ":memory:" {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&format!("sqlite://{db_path}?mode=rwc"))
                .await?
        };
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ingredient (\
                 canonical_name TEXT PRIMARY KEY,\
                 eco_score REAL NOT NULL,\
                 risk_level TEXT NOT NULL,\
                 benefits TEXT NOT NULL,\
                 risks_detailed TEXT NOT NULL,\
                 sources TEXT NOT NULL,\
                 created_at TEXT NOT NULL,\
                 updated_at TEXT NOT NULL,\
                 schema_version INTEGER NOT NULL\
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS external_source_log (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT,\
                 source_id TEXT NOT NULL,\
                 canonical_name TEXT NOT NULL,\
                 status_code TEXT NOT NULL,\
                 fetched_at TEXT NOT NULL,\
                 summary TEXT NOT NULL\
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_source_log_name \
             ON external_source_log (canonical_name)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upsert one record, keyed on `canonical_name`.
    ///
    /// `created_at` is preserved from the existing row; `updated_at` never
    /// moves backwards. Returns the row as persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or the read-back fails.
    pub async fn upsert_record(
        &self,
        record: &IngredientRecord,
    ) -> Result<IngredientRecord, StoreError> {
        sqlx::query(
            "INSERT INTO ingredient (\
                 canonical_name, eco_score, risk_level, benefits, risks_detailed,\
                 sources, created_at, updated_at, schema_version\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)\
             ON CONFLICT(canonical_name) DO UPDATE SET \
                 eco_score = excluded.eco_score,\
                 risk_level = excluded.risk_level,\
                 benefits = excluded.benefits,\
                 risks_detailed = excluded.risks_detailed,\
                 sources = excluded.sources,\
                 updated_at = MAX(ingredient.updated_at, excluded.updated_at),\
                 schema_version = excluded.schema_version",
        )
        .bind(record.canonical_name.as_str())
        .bind(record.eco_score)
        .bind(record.risk_level.as_str())
        .bind(&record.benefits)
        .bind(&record.risks_detailed)
        .bind(encode_sources(&record.sources))
        .bind(encode_time(record.created_at))
        .bind(encode_time(record.updated_at))
        .bind(record.schema_version)
        .execute(&self.pool)
        .await?;

        debug!(name = %record.canonical_name, "ingredient upserted");

        self.get_record(&record.canonical_name)
            .await?
            .ok_or_else(|| StoreError::CorruptRow {
                name: record.canonical_name.as_str().to_owned(),
                detail: "row missing after upsert".to_owned(),
            })
    }

    /// Read one record by canonical name.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the row is corrupt.
    pub async fn get_record(
        &self,
        name: &CanonicalName,
    ) -> Result<Option<IngredientRecord>, StoreError> {
        let row: Option<(String, f64, String, String, String, String, String, String, i64)> =
            sqlx::query_as(
                "SELECT canonical_name, eco_score, risk_level, benefits, risks_detailed,\
                        sources, created_at, updated_at, schema_version \
                 FROM ingredient WHERE canonical_name = ?1",
            )
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(decode_record).transpose()
    }

    /// Append one provider outcome to the audit log.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails; callers treat this as
    /// non-fatal.
    pub async fn log_source(&self, fact: &IngredientFact) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO external_source_log \
                 (source_id, canonical_name, status_code, fetched_at, summary)\
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(fact.provider.as_str())
        .bind(fact.name.as_str())
        .bind(fact.status.as_str())
        .bind(encode_time(fact.fetched_at))
        .bind(&fact.raw_summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count audit rows for one canonical name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_source_logs(&self, name: &CanonicalName) -> Result<u64, StoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT count(*) FROM external_source_log WHERE canonical_name = ?1")
                .bind(name.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0.cast_unsigned())
    }

    /// Whether the store answers a trivial probe.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// The underlying pool (tests, migrations).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Fixed-width RFC 3339 so `MAX()` on the TEXT column compares
/// chronologically.
fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_sources(sources: &[ProviderId]) -> String {
    sources
        .iter()
        .map(ProviderId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[allow(clippy::type_complexity)]
fn decode_record(
    row: (String, f64, String, String, String, String, String, String, i64),
) -> Result<IngredientRecord, StoreError> {
    let (name, eco_score, risk, benefits, risks_detailed, sources, created_at, updated_at, version) =
        row;

    let corrupt = |detail: String| StoreError::CorruptRow {
        name: name.clone(),
        detail,
    };

    let risk_level = RiskLevel::parse(&risk).map_err(|e| corrupt(e.to_string()))?;
    let sources = sources
        .split(',')
        .filter(|s| !s.is_empty())
        .map(ProviderId::parse)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| corrupt(e.to_string()))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| corrupt(format!("created_at: {e}")))?
        .with_timezone(&Utc);
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| corrupt(format!("updated_at: {e}")))?
        .with_timezone(&Utc);

    Ok(IngredientRecord {
        canonical_name: CanonicalName::from_normalized(name),
        eco_score,
        risk_level,
        benefits,
        risks_detailed,
        sources,
        created_at,
        updated_at,
        schema_version: version,
    })
}

// ---------------------------------------------------------------------------
// Dual-store writer
// ---------------------------------------------------------------------------

/// Single write path for aggregated records.
///
/// Ordering: relational upsert (authoritative), then L1 cache, then a
/// non-blocking hand-off to the mirror reconciler. A full reconciler queue
/// drops the mirror write (logged and counted), never the resolution.
pub struct DualStoreWriter {
    store: Arc<RelationalStore>,
    cache: Arc<TtlCache>,
    mirror_tx: Option<mpsc::Sender<IngredientRecord>>,
    mirror_dropped: AtomicU64,
}

impl std::fmt::Debug for DualStoreWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualStoreWriter")
            .field("mirroring", &self.mirror_tx.is_some())
            .finish_non_exhaustive()
    }
}

impl DualStoreWriter {
    /// Build the write path. `mirror_tx` is `None` when the mirror is
    /// disabled.
    pub fn new(
        store: Arc<RelationalStore>,
        cache: Arc<TtlCache>,
        mirror_tx: Option<mpsc::Sender<IngredientRecord>>,
    ) -> Self {
        Self {
            store,
            cache,
            mirror_tx,
            mirror_dropped: AtomicU64::new(0),
        }
    }

    /// Persist one record through the full write ordering.
    ///
    /// # Errors
    ///
    /// Returns an error only when the relational write fails; the caller
    /// surfaces it as `internal_error` and the cache is left untouched.
    pub async fn persist(&self, record: IngredientRecord) -> Result<IngredientRecord, StoreError> {
        let effective = self.store.upsert_record(&record).await?;
        self.cache.put_record(effective.clone());

        if let Some(tx) = &self.mirror_tx {
            if let Err(e) = tx.try_send(effective.clone()) {
                self.mirror_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(name = %effective.canonical_name, error = %e, "mirror queue full, write dropped");
            }
        }

        Ok(effective)
    }

    /// Mirror hand-offs dropped because the reconciler queue was full.
    pub fn mirror_dropped(&self) -> u64 {
        self.mirror_dropped.load(Ordering::Relaxed)
    }
}
