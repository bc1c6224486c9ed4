//! Overlap control for scheduled and on-demand runs.
//!
//! [`OverlapGuard`] keeps one job from overlapping itself. [`QueryGuards`]
//! skips a query whose keyword and location another run already holds, and
//! its store lock admits one ingestion run at a time across every caller
//! sharing it. Dedup and capacity rewrite rows read earlier in the run, so
//! two runs must never interleave.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use harvest_types::SearchQuery;

/// What to do when a job fires while its previous run is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Skip the new execution and record it as skipped.
    #[default]
    Skip,

    /// Let executions run side by side.
    Concurrent,
}

/// Running flag for one job.
pub struct OverlapGuard {
    is_running: Arc<AtomicBool>,
    policy: OverlapPolicy,
}

impl OverlapGuard {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    /// Returns `None` when the execution must be skipped.
    ///
    /// Under `Concurrent` this always succeeds and the shared flag is left
    /// untouched.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        match self.policy {
            OverlapPolicy::Skip => self
                .is_running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .ok()
                .map(|_| RunGuard {
                    flag: self.is_running.clone(),
                }),
            OverlapPolicy::Concurrent => Some(RunGuard {
                flag: Arc::new(AtomicBool::new(true)),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }
}

/// Clears the running flag when dropped, including on panic unwind.
pub struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Keyed run guards shared by every caller that triggers ingestion.
///
/// Cloning shares the underlying key set and store lock.
#[derive(Clone, Default)]
pub struct QueryGuards {
    held: Arc<Mutex<HashSet<String>>>,
    store: Arc<tokio::sync::Mutex<()>>,
}

impl QueryGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `key`, or `None` if another run holds it.
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<QueryGuard> {
        let key = key.into();
        if !self.keys().insert(key.clone()) {
            return None;
        }
        Some(QueryGuard {
            held: self.held.clone(),
            key,
        })
    }

    /// Claim the logical key of `query` (case-insensitive keyword and location).
    pub fn try_acquire_query(&self, query: &SearchQuery) -> Option<QueryGuard> {
        self.try_acquire(query.logical_key())
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.keys().contains(key)
    }

    /// Number of keys currently held.
    pub fn held_count(&self) -> usize {
        self.keys().len()
    }

    /// Wait for exclusive use of the store for one ingestion run.
    pub async fn lock_store(&self) -> StoreLock {
        StoreLock {
            _guard: self.store.clone().lock_owned().await,
        }
    }

    /// True while some run holds the store lock.
    pub fn store_busy(&self) -> bool {
        self.store.try_lock().is_err()
    }
}

impl std::fmt::Debug for QueryGuards {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryGuards")
            .field("held", &self.held_count())
            .finish()
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct QueryGuard {
    held: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl QueryGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Exclusive use of the store; released when dropped.
#[derive(Debug)]
pub struct StoreLock {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl Drop for QueryGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
