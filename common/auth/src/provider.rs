use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::error::VerificationResult;
use crate::jwks::{KeySource, StaticKeySource};
use crate::keys::{KeySet, SigningKey};

/// Owns the active key set and the policy for replacing it.
///
/// Readers take an `Arc<KeySet>` snapshot and never wait on a refresh. Refreshes
/// are serialised so at most one fetch is in flight; a refresh that fails or yields
/// no keys leaves the current set in place.
pub struct KeySetProvider {
    source: Arc<dyn KeySource>,
    current: RwLock<Arc<KeySet>>,
    refresh_lock: AsyncMutex<()>,
    generation: AtomicU64,
    last_attempt: Mutex<Instant>,
}

impl KeySetProvider {
    /// Fetch the initial key set. Fails if the source does.
    pub async fn load(source: Arc<dyn KeySource>) -> VerificationResult<Self> {
        let keys = source.load().await?;
        info!(
            source = %source.describe(),
            keys = keys.len(),
            "Loaded signing keys"
        );
        Ok(Self::with_keys(source, keys))
    }

    /// Wrap a key set that was already fetched from `source`.
    pub fn with_keys(source: Arc<dyn KeySource>, keys: KeySet) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(keys)),
            refresh_lock: AsyncMutex::new(()),
            generation: AtomicU64::new(0),
            last_attempt: Mutex::new(Instant::now()),
        }
    }

    /// A provider whose keys never change.
    pub fn fixed(keys: KeySet) -> Self {
        let source = Arc::new(StaticKeySource::new(keys.clone()));
        Self::with_keys(source, keys)
    }

    pub fn source(&self) -> &dyn KeySource {
        self.source.as_ref()
    }

    /// Snapshot of the active key set.
    pub fn current(&self) -> Arc<KeySet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find(&self, kid: &str) -> Option<SigningKey> {
        self.current().find(kid).cloned()
    }

    /// Number of successful key set replacements since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Refetch the key set and return the number of keys now active.
    ///
    /// Callers that queue behind a refresh which succeeds reuse its result.
    pub async fn refresh(&self) -> VerificationResult<usize> {
        let observed = self.generation();
        let _guard = self.refresh_lock.lock().await;
        if self.generation() != observed {
            return Ok(self.current().len());
        }
        self.refresh_locked().await
    }

    /// Refresh unless an attempt finished within `min_interval`.
    ///
    /// Waits for any refresh already in flight before judging staleness, so a caller
    /// that queued behind a fetch sees its keys. Returns whether this call installed
    /// a new key set.
    pub async fn refresh_if_stale(&self, min_interval: Duration) -> VerificationResult<bool> {
        let _guard = self.refresh_lock.lock().await;
        if self.attempted_within(min_interval) {
            debug!("Skipping key refresh; last attempt too recent");
            return Ok(false);
        }
        let before = self.generation();
        self.refresh_locked().await?;
        Ok(self.generation() != before)
    }

    async fn refresh_locked(&self) -> VerificationResult<usize> {
        let loaded = self.source.load().await;
        *self
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();

        let keys = match loaded {
            Ok(keys) => keys,
            Err(err) => {
                warn!(
                    source = %self.source.describe(),
                    reason = err.reason_code(),
                    "Failed to refresh signing keys; keeping current set"
                );
                return Err(err);
            }
        };

        if keys.is_empty() {
            warn!(
                source = %self.source.describe(),
                "Key source returned no keys; keeping current set"
            );
            return Ok(0);
        }

        let count = keys.len();
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(keys);
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(count, source = %self.source.describe(), "Refreshed signing keys");
        Ok(count)
    }

    fn attempted_within(&self, window: Duration) -> bool {
        self.last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
            < window
    }
}
