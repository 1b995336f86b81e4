//! In-flight read de-duplication.
//!
//! At most one read per cache key is in flight at any instant. The first
//! caller launches the request as its own task; every later caller for the
//! same key awaits a shared handle to that task and observes the identical
//! outcome. The pending record is removed when the task settles, before the
//! result is handed to anyone.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::classify::{ClassifiedError, ErrorKind};

type ReadResult = std::result::Result<Value, ClassifiedError>;
type PendingRead = Shared<BoxFuture<'static, ReadResult>>;
type PendingMap = Arc<Mutex<HashMap<String, PendingRead>>>;

/// Removes a key's pending record when dropped.
///
/// Lives inside the spawned request task, so the record disappears when the
/// task finishes, panics, or is torn down with the runtime.
struct PendingGuard {
    pending: PendingMap,
    key: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
        trace!(key = %self.key, "Pending read settled");
    }
}

/// Coalesces concurrent reads of the same key.
#[derive(Clone, Default)]
pub struct RequestDeduplicator {
    pending: PendingMap,
    launched: Arc<AtomicU64>,
}

impl RequestDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `factory` for `key` unless a read for `key` is already in flight,
    /// in which case join that read instead.
    ///
    /// The request runs on a spawned task: dropping the returned future only
    /// abandons this caller's interest, never the request itself.
    pub async fn deduped_get<F, Fut>(&self, key: &str, factory: F) -> ReadResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ReadResult> + Send + 'static,
    {
        let existing = self.pending.lock().get(key).cloned();
        if let Some(existing) = existing {
            debug!(key = %key, "Joining in-flight read");
            return existing.await;
        }

        // The factory runs unlocked; it may inspect this deduplicator.
        let request = factory();

        let shared = {
            let mut pending = self.pending.lock();
            match pending.get(key) {
                Some(existing) => {
                    // Another caller launched first; the unpolled request is dropped.
                    debug!(key = %key, "Joining in-flight read");
                    existing.clone()
                }
                None => {
                    let guard = PendingGuard {
                        pending: Arc::clone(&self.pending),
                        key: key.to_string(),
                    };
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        request.await
                    });
                    self.launched.fetch_add(1, Ordering::Relaxed);

                    let shared = async move {
                        match handle.await {
                            Ok(result) => result,
                            Err(e) => Err(ClassifiedError::new(
                                ErrorKind::Unknown,
                                format!("read task failed: {}", e),
                            )),
                        }
                    }
                    .boxed()
                    .shared();

                    pending.insert(key.to_string(), shared.clone());
                    trace!(key = %key, "Read launched");
                    shared
                }
            }
        };

        shared.await
    }

    /// Number of keys with a read in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether a read for `key` is in flight.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Total reads actually launched since creation.
    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RequestDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("in_flight", &self.in_flight())
            .field("launched", &self.launched())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::sleep;

    fn counting_factory(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        result: ReadResult,
    ) -> impl FnOnce() -> BoxFuture<'static, ReadResult> + use<> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(delay).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_callers_share_one_request() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let dedup = dedup.clone();
            let factory =
                counting_factory(&calls, Duration::from_millis(200), Ok(json!({"id": 42})));
            tokio::spawn(async move { dedup.deduped_get("customers:42", factory).await })
        };
        sleep(Duration::from_millis(10)).await;
        let second = {
            let dedup = dedup.clone();
            let factory =
                counting_factory(&calls, Duration::from_millis(200), Ok(json!("other")));
            tokio::spawn(async move { dedup.deduped_get("customers:42", factory).await })
        };

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert_eq!(a, json!({"id": 42}));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_callers_share_failure() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let failure =
            ClassifiedError::new(ErrorKind::ServerFault, "Server error. Try again later.");

        let mut handles = Vec::new();
        for i in 0..25u64 {
            let dedup = dedup.clone();
            let factory =
                counting_factory(&calls, Duration::from_millis(100), Err(failure.clone()));
            handles.push(tokio::spawn(async move {
                sleep(Duration::from_millis(i % 7)).await;
                dedup.deduped_get("jobs", factory).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err(failure.clone()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.launched(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_removed_after_settlement() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let factory = counting_factory(&calls, Duration::from_millis(5), Ok(json!(1)));
        dedup.deduped_get("k", factory).await.unwrap();
        assert!(!dedup.is_pending("k"));

        let factory = counting_factory(&calls, Duration::from_millis(5), Ok(json!(2)));
        assert_eq!(dedup.deduped_get("k", factory).await.unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_do_not_coalesce() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let fa = counting_factory(&calls, Duration::from_millis(50), Ok(json!("a")));
        let fb = counting_factory(&calls, Duration::from_millis(50), Ok(json!("b")));
        let (a, b) = tokio::join!(dedup.deduped_get("a", fa), dedup.deduped_get("b", fb));

        assert_eq!(a.unwrap(), json!("a"));
        assert_eq!(b.unwrap(), json!("b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_caller_does_not_cancel_request() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let factory = counting_factory(&calls, Duration::from_millis(100), Ok(json!("done")));
        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), dedup.deduped_get("k", factory)).await;
        assert!(abandoned.is_err());
        assert!(dedup.is_pending("k"));

        let factory = counting_factory(&calls, Duration::from_millis(100), Ok(json!("second")));
        assert_eq!(dedup.deduped_get("k", factory).await.unwrap(), json!("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dedup.is_pending("k"));
    }

    #[tokio::test]
    async fn test_factory_may_inspect_deduplicator() {
        let dedup = RequestDeduplicator::new();
        let observer = dedup.clone();

        let result = dedup
            .deduped_get("jobs", move || {
                let before = observer.in_flight();
                let pending = observer.is_pending("jobs");
                async move { Ok(json!({"before": before, "pending": pending})) }
            })
            .await
            .unwrap();

        assert_eq!(result, json!({"before": 0, "pending": false}));
        assert_eq!(dedup.in_flight(), 0);
    }

    async fn exploding_read() -> ReadResult {
        panic!("transport exploded")
    }

    #[tokio::test]
    async fn test_panicking_request_clears_record() {
        let dedup = RequestDeduplicator::new();

        let result = dedup.deduped_get("boom", exploding_read).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(!dedup.is_pending("boom"));
    }
}
