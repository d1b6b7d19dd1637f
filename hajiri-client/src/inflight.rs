//! In-flight request coalescing
//!
//! Concurrent calls with the same key share one underlying future. The entry
//! is removed the moment that future settles, so this never behaves as a
//! result cache: a call made after settlement always starts fresh work.
//!
//! The pending map only holds a weak handle. Once every waiting caller is
//! dropped the work is dropped with them, and the next caller with the same
//! key starts fresh work under its own credentials.

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

type SharedWork<V, E> = BoxFuture<'static, Result<V, E>>;
type PendingMap<K, V, E> = Arc<Mutex<HashMap<K, WeakShared<SharedWork<V, E>>>>>;

/// Coalesces concurrent identical requests
pub struct InFlight<K, V, E> {
    pending: PendingMap<K, V, E>,
}

impl<K, V, E> Default for InFlight<K, V, E> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V, E> InFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` unless an identical request is already pending
    ///
    /// `make` is only invoked when no request for `key` is in flight; the
    /// caller then owns the new entry and every concurrent caller with the
    /// same key awaits the same outcome.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let shared = {
            let mut pending = lock(&self.pending);

            match pending.get(&key).and_then(WeakShared::upgrade) {
                Some(existing) => {
                    tracing::debug!(pending = pending.len(), "Joining in-flight request");
                    existing
                }
                None => {
                    let map = Arc::clone(&self.pending);
                    let settle_key = key.clone();
                    let work = make();

                    let shared: Shared<SharedWork<V, E>> = async move {
                        let result = work.await;
                        lock(&map).remove(&settle_key);
                        result
                    }
                    .boxed()
                    .shared();

                    match shared.downgrade() {
                        Some(weak) => {
                            pending.insert(key, weak);
                        }
                        None => {
                            pending.remove(&key);
                        }
                    }
                    shared
                }
            }
        };

        shared.await
    }

    /// Number of requests currently in flight
    pub fn pending(&self) -> usize {
        let mut pending = lock(&self.pending);
        pending.retain(|_, weak| weak.upgrade().is_some());
        pending.len()
    }
}

fn lock<K, V, E>(
    map: &PendingMap<K, V, E>,
) -> MutexGuard<'_, HashMap<K, WeakShared<SharedWork<V, E>>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_work(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = Result<u32, String>> + Send + 'static {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_concurrent_identical_keys_share_one_call() {
        let in_flight: InFlight<&'static str, u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            in_flight.run("users", || counting_work(&calls, 1)),
            in_flight.run("users", || counting_work(&calls, 2)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(1));
        assert_eq!(in_flight.pending(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_separately() {
        let in_flight: InFlight<&'static str, u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            in_flight.run("classes", || counting_work(&calls, 1)),
            in_flight.run("subjects", || counting_work(&calls, 2)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!((a, b), (Ok(1), Ok(2)));
    }

    #[tokio::test]
    async fn test_settled_entry_is_not_reused() {
        let in_flight: InFlight<&'static str, u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = in_flight.run("users", || counting_work(&calls, 1)).await;
        let second = in_flight.run("users", || counting_work(&calls, 2)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
    }

    #[tokio::test]
    async fn test_failure_clears_entry() {
        let in_flight: InFlight<&'static str, u32, String> = InFlight::new();

        let failed = in_flight
            .run("users", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert_eq!(failed, Err("boom".to_string()));
        assert_eq!(in_flight.pending(), 0);

        let retried = in_flight.run("users", || async { Ok(5) }).await;
        assert_eq!(retried, Ok(5));
    }

    #[tokio::test]
    async fn test_abandoned_request_is_not_resumed() {
        let in_flight: InFlight<&'static str, u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            in_flight.run("users", || counting_work(&calls, 1)),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(in_flight.pending(), 0);

        let fresh = in_flight.run("users", || counting_work(&calls, 2)).await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
