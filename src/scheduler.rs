//! Delayed follow-up jobs: auto-delete, admin expiry warnings, countdowns.
//!
//! Every job runs as a detached tokio task that sleeps until its deadline
//! and then runs unless its `CancellationToken` fired first. Tokens are
//! children of one root token, so shutting the registry down cancels
//! everything still pending.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Sleeps for `delay`, then runs `job` unless `token` is cancelled first.
pub fn spawn_delayed<F>(token: CancellationToken, delay: Duration, job: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                if !token.is_cancelled() {
                    job.await;
                }
            }
        }
    })
}

/// Token for one armed group of jobs.
#[derive(Debug, Clone)]
pub struct Armed {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Keyed groups of delayed jobs; re-arming a key cancels the previous group.
#[derive(Debug)]
pub struct TimerRegistry<K: Eq + Hash + Clone + Debug> {
    root: CancellationToken,
    entries: DashMap<K, Armed>,
    next_generation: AtomicU64,
}

impl<K: Eq + Hash + Clone + Debug> Default for TimerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Debug> TimerRegistry<K> {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            entries: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    /// A token for an unkeyed job that still dies with the registry.
    pub fn detached_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Cancels whatever is armed under `key` and returns a fresh token.
    pub fn arm(&self, key: K) -> Armed {
        let armed = Armed {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            token: self.root.child_token(),
        };
        if let Some(previous) = self.entries.insert(key.clone(), armed.clone()) {
            log::debug!("Replacing timers for {:?}", key);
            previous.token.cancel();
        }
        armed
    }

    /// Arms `key` and schedules one job under it.
    pub fn schedule<F>(&self, key: K, delay: Duration, job: F) -> Armed
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let armed = self.arm(key);
        spawn_delayed(armed.token.clone(), delay, job);
        armed
    }

    /// Returns `true` when something was armed under `key`.
    pub fn cancel(&self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some((_, armed)) => {
                armed.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drops the entry after its last job ran, unless it was re-armed meanwhile.
    pub fn finish(&self, key: &K, generation: u64) {
        self.entries.remove_if(key, |_, armed| armed.generation == generation);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cancels every pending job, keyed or detached.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.entries.clear();
    }
}
