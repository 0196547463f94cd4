//! Session tokens for discarding superseded analysis work.
//!
//! Each pipeline run takes a token from a shared [`SessionRegistry`]. Starting
//! a new run makes every older token stale. Work done under a stale token must
//! not be published, and [`SessionToken::emit`] enforces that: a publish
//! holds the registry's publish lock, so once [`SessionRegistry::begin`]
//! returns no older token can publish again.
//!
//! Reads of the current id never take the lock, so code running after a
//! publish (a progress callback, say) may freely check or begin sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

struct Inner {
    current: AtomicU64,
    /// Held while a session begins or a token publishes.
    publish: Mutex<()>,
    changes: watch::Sender<u64>,
}

/// Hands out monotonically increasing session tokens.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                current: AtomicU64::new(0),
                publish: Mutex::new(()),
                changes,
            }),
        }
    }

    /// Starts a new session, superseding the current one.
    pub fn begin(&self) -> SessionToken {
        let _publish = self
            .inner
            .publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = self.inner.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.changes.send_replace(id);
        SessionToken {
            id,
            inner: Arc::clone(&self.inner),
            changes: self.inner.changes.subscribe(),
        }
    }

    /// The id of the newest session, 0 before any was started.
    pub fn current(&self) -> u64 {
        self.inner.current.load(Ordering::Acquire)
    }
}

/// Identifies one run. Cheap to check, stale once a newer run begins.
pub struct SessionToken {
    id: u64,
    inner: Arc<Inner>,
    changes: watch::Receiver<u64>,
}

impl SessionToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.inner.current.load(Ordering::Acquire) == self.id
    }

    /// Runs `publish` only if this token is still current, with no newer
    /// session able to begin until it returns.
    ///
    /// `publish` must not begin a session itself; do that after `emit`
    /// returns.
    pub fn emit<R>(&self, publish: impl FnOnce() -> R) -> Option<R> {
        let _publish = self
            .inner
            .publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.is_current().then(publish)
    }

    /// Resolves once a newer session has begun.
    pub async fn superseded(&self) {
        let id = self.id;
        let mut changes = self.changes.clone();
        // The registry keeps the sender alive as long as this token exists.
        let _ = changes.wait_for(|latest| *latest != id).await;
    }
}
