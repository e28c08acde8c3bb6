//! Best-effort document-store mirror and its reconciler.
//!
//! Records are mirrored as JSON documents keyed by canonical name. All
//! mirror writes flow through the reconciler actor: the dual-store writer
//! hands records over a bounded channel, the actor pushes them with bounded
//! retries and backoff, and failures are logged and counted — never
//! propagated. Dropping the sender drains and stops the actor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::MirrorConfig;
use crate::types::IngredientRecord;

/// Push attempts per record before it is abandoned.
const MAX_PUSH_ATTEMPTS: u32 = 3;

/// Backoff base between mirror retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Errors from one mirror push.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// HTTP transport failure.
    #[error("mirror request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Document store answered with an error status.
    #[error("mirror returned status {0}")]
    Status(u16),
}

/// HTTP client for the document store.
#[derive(Debug, Clone)]
pub struct DocumentMirror {
    base_url: String,
    collection: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl DocumentMirror {
    /// Build from configuration; the bearer token is read from the
    /// configured env var at startup.
    pub fn from_config(config: &MirrorConfig) -> Self {
        let token = if config.auth_env.is_empty() {
            None
        } else {
            std::env::var(&config.auth_env).ok().filter(|t| !t.is_empty())
        };
        Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            collection: config.collection.clone(),
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Push one record as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-2xx status.
    pub async fn push(&self, record: &IngredientRecord) -> Result<(), MirrorError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            self.collection,
            record.canonical_name.as_str().replace(' ', "-")
        );
        let mut request = self.client.put(&url).json(record);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::Status(status.as_u16()));
        }
        trace!(name = %record.canonical_name, "record mirrored");
        Ok(())
    }
}

/// Counters shared between the engine and the reconciler task.
#[derive(Debug, Default)]
pub struct MirrorStats {
    /// Records successfully mirrored.
    pub pushed: AtomicU64,
    /// Records abandoned after exhausting retries.
    pub abandoned: AtomicU64,
}

/// Run the mirror reconciler until the sender half is dropped.
///
/// Each record is pushed with up to [`MAX_PUSH_ATTEMPTS`] attempts and
/// doubling backoff. This is the only long-lived task that outlives a
/// resolution; the engine owns its lifecycle.
pub async fn run_reconciler(
    mirror: DocumentMirror,
    mut rx: mpsc::Receiver<IngredientRecord>,
    stats: Arc<MirrorStats>,
) {
    while let Some(record) = rx.recv().await {
        let mut backoff = RETRY_BACKOFF;
        let mut delivered = false;
        for attempt in 1..=MAX_PUSH_ATTEMPTS {
            match mirror.push(&record).await {
                Ok(()) => {
                    stats.pushed.fetch_add(1, Ordering::Relaxed);
                    delivered = true;
                    break;
                }
                Err(error) => {
                    debug!(
                        name = %record.canonical_name,
                        attempt,
                        error = %error,
                        "mirror push failed"
                    );
                    if attempt < MAX_PUSH_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }
        if !delivered {
            stats.abandoned.fetch_add(1, Ordering::Relaxed);
            warn!(name = %record.canonical_name, "mirror write abandoned after retries");
        }
    }
    trace!("mirror reconciler stopped");
}
