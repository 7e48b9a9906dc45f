//! Per-session request serialization.
//!
//! Two concurrent requests for the *same* session must be ordered so the
//! later one builds its context after the earlier one committed its turns.
//! Requests for different sessions are fully independent.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// One mutex per active session.
///
/// The map only grows for sessions seen by this process; entries are tiny and
/// sessions are few per instance, so no eviction is done.
#[derive(Default)]
pub struct SessionLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for a session, waiting behind any in-flight request
    /// for the same session.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let read = self.locks.read().await;
            read.get(session_id).cloned()
        };

        let lock = match lock {
            Some(lock) => lock,
            None => {
                let mut write = self.locks.write().await;
                write
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_session_requests_are_serialized() {
        let locks = Arc::new(SessionLocks::new());
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("s-1").await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_sessions_run_concurrently() {
        let locks = Arc::new(SessionLocks::new());

        let a = locks.acquire("s-a").await;
        // Must not deadlock while s-a is held.
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("s-b"))
            .await
            .expect("different session blocked behind s-a");
        drop(a);
        drop(b);
    }
}
