//! Offline mutation queue.
//!
//! Writes that fail because the server is unreachable are parked here in
//! FIFO order. When connectivity returns the queue is drained one mutation
//! at a time; the first failure halts the drain and leaves that mutation and
//! everything behind it queued in original order.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::classify::ClassifiedError;
use crate::transport::{Body, HttpRequest, RequestClass};

/// A write request waiting for connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMutation {
    /// Monotonic id, unique per queue.
    pub id: u64,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub headers: Vec<(String, String)>,
    pub class: RequestClass,
    /// Cache pattern to invalidate once the mutation lands.
    pub invalidate: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    /// Replay attempts made so far.
    pub attempts: u32,
}

impl QueuedMutation {
    /// Rebuild the outgoing request for a replay.
    pub fn to_request(&self, timeout: Duration) -> HttpRequest {
        HttpRequest {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            timeout,
        }
    }
}

/// What a caller gets back when its write was queued instead of sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedReceipt {
    pub id: u64,
    /// 1-based position in the queue at enqueue time.
    pub position: usize,
}

/// Observable queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Empty,
    Accumulating,
    Draining,
}

/// Delay between replay attempts of the same mutation within one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    #[default]
    None,
    Fixed(Duration),
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay after the given 1-based failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Replay policy applied during a drain.
///
/// The default tries each mutation once per drain and halts on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPolicy {
    /// Attempts per mutation per drain; at least 1.
    pub attempts_per_drain: u32,
    pub backoff: Backoff,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            attempts_per_drain: 1,
            backoff: Backoff::None,
        }
    }
}

impl ReplayPolicy {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts_per_drain = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, PartialEq)]
pub enum DrainReport {
    /// Another drain was already running; nothing was done.
    AlreadyDraining,
    /// Every queued mutation was replayed.
    Completed { replayed: usize },
    /// Replay stopped at the first failure.
    Halted {
        replayed: usize,
        failed_id: u64,
        error: ClassifiedError,
        remaining: usize,
    },
}

impl DrainReport {
    pub fn replayed(&self) -> usize {
        match self {
            DrainReport::AlreadyDraining => 0,
            DrainReport::Completed { replayed } | DrainReport::Halted { replayed, .. } => {
                *replayed
            }
        }
    }
}

/// Clears the draining flag when a drain ends or is dropped.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// FIFO queue of pending writes. Clones share state.
#[derive(Debug, Clone)]
pub struct MutationQueue {
    items: Arc<Mutex<VecDeque<QueuedMutation>>>,
    next_id: Arc<AtomicU64>,
    draining: Arc<AtomicBool>,
    policy: ReplayPolicy,
}

impl MutationQueue {
    pub fn new(policy: ReplayPolicy) -> Self {
        Self {
            items: Arc::new(Mutex::new(VecDeque::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            draining: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    pub fn policy(&self) -> &ReplayPolicy {
        &self.policy
    }

    /// Append a write request. Returns its receipt.
    ///
    /// The request's `Authorization` header is dropped; replays carry the
    /// credential held at replay time.
    pub fn enqueue(
        &self,
        request: HttpRequest,
        class: RequestClass,
        invalidate: Option<String>,
    ) -> QueuedReceipt {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let headers = request
            .headers
            .into_iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("authorization"))
            .collect();
        let mutation = QueuedMutation {
            id,
            method: request.method,
            path: request.path,
            query: request.query,
            body: request.body,
            headers,
            class,
            invalidate,
            enqueued_at: Utc::now(),
            attempts: 0,
        };

        let mut items = self.items.lock();
        info!(
            id,
            method = %mutation.method,
            path = %mutation.path,
            "Request queued, will retry when back online"
        );
        items.push_back(mutation);
        QueuedReceipt {
            id,
            position: items.len(),
        }
    }

    /// Replay queued mutations in order through `send`.
    ///
    /// Each mutation is awaited before the next starts. A mutation is removed
    /// only after `send` succeeds for it. Re-entrant calls while a drain is
    /// running return [`DrainReport::AlreadyDraining`].
    pub async fn drain<S, Fut>(&self, mut send: S) -> DrainReport
    where
        S: FnMut(QueuedMutation) -> Fut,
        Fut: Future<Output = Result<(), ClassifiedError>>,
    {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain already in progress, ignoring trigger");
            return DrainReport::AlreadyDraining;
        }
        let _guard = DrainGuard(&self.draining);

        let pending = self.len();
        if pending > 0 {
            info!(pending, "Back online, replaying queued requests");
        }

        let mut replayed = 0;
        loop {
            let Some(front) = self.items.lock().front().cloned() else {
                if replayed > 0 {
                    info!(replayed, "Queue drained");
                }
                return DrainReport::Completed { replayed };
            };

            let mut attempt = 0;
            let outcome = loop {
                attempt += 1;
                self.record_attempt(front.id);
                match send(front.clone()).await {
                    Ok(()) => break Ok(()),
                    Err(e) if attempt < self.policy.attempts_per_drain => {
                        let delay = self.policy.backoff.delay(attempt);
                        debug!(
                            id = front.id,
                            attempt,
                            ?delay,
                            error = %e,
                            "Replay failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => break Err(e),
                }
            };

            match outcome {
                Ok(()) => {
                    self.remove(front.id);
                    replayed += 1;
                    debug!(id = front.id, path = %front.path, "Queued request replayed");
                }
                Err(error) => {
                    let remaining = self.len();
                    warn!(
                        id = front.id,
                        path = %front.path,
                        kind = %error.kind,
                        remaining,
                        "Replay failed, halting drain"
                    );
                    return DrainReport::Halted {
                        replayed,
                        failed_id: front.id,
                        error,
                        remaining,
                    };
                }
            }
        }
    }

    fn record_attempt(&self, id: u64) {
        if let Some(m) = self.items.lock().iter_mut().find(|m| m.id == id) {
            m.attempts += 1;
        }
    }

    /// Remove a mutation by id. Returns whether it was present.
    pub fn remove(&self, id: u64) -> bool {
        let mut items = self.items.lock();
        match items.iter().position(|m| m.id == id) {
            Some(pos) => items.remove(pos).is_some(),
            None => false,
        }
    }

    pub fn state(&self) -> QueueState {
        if self.draining.load(Ordering::Acquire) {
            QueueState::Draining
        } else if self.is_empty() {
            QueueState::Empty
        } else {
            QueueState::Accumulating
        }
    }

    /// Copy of the queue contents in order.
    pub fn snapshot(&self) -> Vec<QueuedMutation> {
        self.items.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Drop every queued mutation. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let count = items.len();
        items.clear();
        count
    }
}

impl Default for MutationQueue {
    fn default() -> Self {
        Self::new(ReplayPolicy::default())
    }
}
