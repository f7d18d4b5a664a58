//! Per-thread cancellation tokens.
//!
//! Each in-flight chat run gets a `CancelToken` registered under its thread
//! id. The token fires when the client disconnects (the response body is
//! dropped) or when `POST /api/chat/threads/:id/stop` is called. The run's
//! poll loop and chunk emitter wait on it alongside their timers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};

/// A cancellation token that the runtime can both check and await.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
    /// Registration id, so a finished run never unregisters its successor.
    generation: u64,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// A guard that cancels this token when dropped.
    pub fn drop_guard(&self) -> DropGuard {
        self.inner.clone().drop_guard()
    }
}

/// Tracks the active run token per thread id.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
    next_generation: AtomicU64,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Create and register a new token for a thread, replacing any previous one.
    pub fn register(&self, thread_id: &str) -> CancelToken {
        let token = CancelToken {
            inner: CancellationToken::new(),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        };
        self.tokens
            .lock()
            .insert(thread_id.to_owned(), token.clone());
        token
    }

    /// Cancel the running turn for a thread. Returns true if one was found.
    pub fn cancel(&self, thread_id: &str) -> bool {
        match self.tokens.lock().get(thread_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Unregister `token` if it is still the thread's current one.
    pub fn remove(&self, thread_id: &str, token: &CancelToken) {
        let mut tokens = self.tokens.lock();
        if tokens
            .get(thread_id)
            .is_some_and(|current| current.generation == token.generation)
        {
            tokens.remove(thread_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_lifecycle() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("t1");
        assert!(!token.is_cancelled());
        assert!(map.cancel("t1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_unknown_thread_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("nope"));
    }

    #[test]
    fn remove_ignores_stale_token() {
        let map = CancelMap::new();
        let old = map.register("t1");
        let new = map.register("t1");
        map.remove("t1", &old);
        assert!(map.cancel("t1"));
        assert!(new.is_cancelled());
        assert!(!old.is_cancelled());
        map.remove("t1", &new);
        assert!(!map.cancel("t1"));
    }

    #[test]
    fn drop_guard_cancels() {
        let token = CancelToken::new();
        {
            let _guard = token.drop_guard();
        }
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        handle.await.unwrap();
    }
}
