//! Read-through memoization of idempotent console queries
//!
//! Suspended-state queries (type lookups, evaluations, backtraces, thread
//! lists) are stable until the next control command, so each operation
//! kind gets its own typed cache. The cached value is a shared future
//! inserted before the factory first polls, which guarantees a given key
//! has at most one concurrently-running fetch even when several callers
//! race on it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;

use crate::common::Result;

type CachedFuture<T> = Shared<BoxFuture<'static, Result<T>>>;

pub struct ResponseCache<T: Clone> {
    entries: Mutex<HashMap<String, CachedFuture<T>>>,
}

impl<T: Clone + Send + Sync + 'static> ResponseCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the memoized result for `key`, running `factory` only if no
    /// fetch (pending or settled) exists for it yet.
    pub async fn resolve<F, Fut>(&self, key: &str, factory: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let fut = factory().boxed().shared();
                    entries.insert(key.to_string(), fut.clone());
                    fut
                }
            }
        };
        entry.await
    }

    /// Drop every entry, pending fetches included; the next `resolve` for
    /// any key runs its factory again.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ResponseCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_same_key_runs_factory_once() {
        let cache = Arc::new(ResponseCache::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        // Both callers request the same key while the first fetch is
        // still pending; only the first factory may run.
        let joined = {
            let cache = cache.clone();
            let calls1 = calls.clone();
            let calls2 = calls.clone();
            tokio::spawn(async move {
                let first = cache.resolve("key", move || async move {
                    calls1.fetch_add(1, Ordering::SeqCst);
                    release_rx.await.ok();
                    Ok(7)
                });
                let second = cache.resolve("key", move || async move {
                    calls2.fetch_add(1, Ordering::SeqCst);
                    Ok(99)
                });
                tokio::join!(first, second)
            })
        };
        tokio::task::yield_now().await;
        release_tx.send(()).ok();

        let (a, b) = joined.await.unwrap();
        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let cache = ResponseCache::<u32>::new();
        let a = cache.resolve("a", || async { Ok(1) }).await.unwrap();
        let b = cache.resolve("b", || async { Ok(2) }).await.unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let cache = ResponseCache::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in [1, 1] {
            let calls_in = calls.clone();
            let got = cache
                .resolve("key", move || async move {
                    calls_in.fetch_add(1, Ordering::SeqCst);
                    Ok(5)
                })
                .await
                .unwrap();
            assert_eq!(got, 5);
            assert_eq!(calls.load(Ordering::SeqCst), expected);
        }

        cache.clear();

        let calls2 = calls.clone();
        cache
            .resolve("key", move || async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(5)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_memoized_too() {
        let cache = ResponseCache::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let err = cache
                .resolve("key", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(crate::common::Error::ConnectionClosed)
                })
                .await
                .unwrap_err();
            assert!(matches!(err, crate::common::Error::ConnectionClosed));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
