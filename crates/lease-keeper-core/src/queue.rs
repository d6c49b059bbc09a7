//! Per-queue message engine.
//!
//! A [`QueueEngine`] owns one queue's messages across three disjoint
//! collections:
//! - `pending`: FIFO of messages waiting for a claimant
//! - `in_flight`: claimed messages keyed by id, each with a visibility deadline
//! - `dead_letter`: terminal, append-only list of messages that exceeded the
//!   delivery limit
//!
//! All collections sit behind a single mutex that is never held across an
//! `.await`. Blocked claimants park on a [`Notify`]; every publish and every
//! lease-expiry requeue wakes one of them. A background task per queue scans
//! in-flight messages on a fixed interval and returns expired ones to pending
//! or dead-letters them, handling a bounded batch per tick.

use crate::{BrokerError, EntropyError, MessageId, QualifiedQueueName, Timestamp};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Default time a claimed message stays invisible before redelivery
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(5);

/// Default number of deliveries before a message is dead-lettered
pub const DEFAULT_MAX_DELIVERY_COUNT: u32 = 3;

/// Default period of the reclamation sweep
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound on messages handled per sweep
pub const DEFAULT_RECLAIM_BATCH_SIZE: usize = 100;

// Upper bound for claim windows so deadline arithmetic cannot overflow.
const MAX_CLAIM_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

// ============================================================================
// Settings and Data Types
// ============================================================================

/// Lease and reclamation parameters shared by every queue of a broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Visibility window granted by a claim
    pub lease_duration: Duration,

    /// Deliveries allowed before a message moves to dead-letter
    pub max_delivery_count: u32,

    /// Period of the background reclamation sweep
    pub reclaim_interval: Duration,

    /// Maximum messages a sweep (or one claim attempt) moves in a single
    /// lock hold
    pub reclaim_batch_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            lease_duration: DEFAULT_LEASE_DURATION,
            max_delivery_count: DEFAULT_MAX_DELIVERY_COUNT,
            reclaim_interval: DEFAULT_RECLAIM_INTERVAL,
            reclaim_batch_size: DEFAULT_RECLAIM_BATCH_SIZE,
        }
    }
}

/// A message held by a queue
///
/// The payload is opaque bytes; the broker never inspects it.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    payload: Bytes,
    created_at: Timestamp,
    delivery_count: u32,
    visibility_deadline: Option<Instant>,
}

impl Message {
    fn new(payload: Bytes) -> Result<Self, EntropyError> {
        Ok(Self {
            id: MessageId::generate()?,
            payload,
            created_at: Timestamp::now(),
            delivery_count: 0,
            visibility_deadline: None,
        })
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Number of times this message has been handed to a claimant
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    /// Lease expiry; only meaningful while the message is in flight
    pub fn visibility_deadline(&self) -> Option<Instant> {
        self.visibility_deadline
    }
}

/// Point-in-time counts of a queue's collections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub dead_letter: usize,
}

impl QueueStats {
    /// Messages published and not yet acknowledged
    pub fn total(&self) -> usize {
        self.pending + self.in_flight + self.dead_letter
    }
}

/// Result of a reclamation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimOutcome {
    pub requeued: usize,
    pub dead_lettered: usize,
}

impl ReclaimOutcome {
    pub fn is_empty(&self) -> bool {
        self.requeued == 0 && self.dead_lettered == 0
    }
}

// ============================================================================
// Shared State
// ============================================================================

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Message>,
    in_flight: HashMap<MessageId, Message>,
    dead_letter: Vec<Message>,
}

enum ClaimAttempt {
    Delivered(Message),
    /// Filtered a full batch of over-delivered messages; release the lock
    /// and try again
    Yield,
    Empty,
}

struct QueueShared {
    name: QualifiedQueueName,
    settings: QueueSettings,
    state: Mutex<QueueState>,
    available: Notify,
}

impl QueueShared {
    // A panic while holding the lock cannot leave the collections half-moved:
    // every transfer is a pop followed by a push with no fallible step between.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn batch_size(&self) -> usize {
        self.settings.reclaim_batch_size.max(1)
    }

    fn try_claim(&self, now: Instant) -> ClaimAttempt {
        let mut state = self.lock();
        let mut filtered = 0usize;

        while let Some(mut message) = state.pending.pop_front() {
            message.delivery_count += 1;

            if message.delivery_count > self.settings.max_delivery_count {
                warn!(
                    queue = %self.name,
                    message_id = %message.id,
                    delivery_count = message.delivery_count,
                    "Delivery limit exceeded, moving message to dead-letter"
                );
                message.visibility_deadline = None;
                state.dead_letter.push(message);

                filtered += 1;
                if filtered >= self.batch_size() {
                    return ClaimAttempt::Yield;
                }
                continue;
            }

            message.visibility_deadline = Some(now + self.settings.lease_duration);
            state.in_flight.insert(message.id.clone(), message.clone());
            return ClaimAttempt::Delivered(message);
        }

        ClaimAttempt::Empty
    }

    fn reclaim_expired(&self, now: Instant) -> ReclaimOutcome {
        let mut outcome = ReclaimOutcome::default();

        {
            let mut state = self.lock();

            let mut expired: Vec<(Instant, MessageId)> = state
                .in_flight
                .values()
                .filter_map(|message| {
                    message
                        .visibility_deadline
                        .filter(|deadline| *deadline <= now)
                        .map(|deadline| (deadline, message.id.clone()))
                })
                .collect();

            // The batch holds the earliest deadlines, requeued in deadline order
            let batch = self.batch_size();
            if expired.len() > batch {
                expired.select_nth_unstable_by_key(batch - 1, |(deadline, _)| *deadline);
                expired.truncate(batch);
            }
            expired.sort_by_key(|(deadline, _)| *deadline);

            for (_, message_id) in expired {
                let Some(mut message) = state.in_flight.remove(&message_id) else {
                    continue;
                };
                message.visibility_deadline = None;

                if message.delivery_count > self.settings.max_delivery_count {
                    warn!(
                        queue = %self.name,
                        message_id = %message.id,
                        delivery_count = message.delivery_count,
                        "Lease expired past delivery limit, moving message to dead-letter"
                    );
                    state.dead_letter.push(message);
                    outcome.dead_lettered += 1;
                } else {
                    state.pending.push_back(message);
                    outcome.requeued += 1;
                }
            }
        }

        for _ in 0..outcome.requeued {
            self.available.notify_one();
        }

        outcome
    }
}

// ============================================================================
// Queue Engine
// ============================================================================

/// A single named queue with lease-based at-least-once delivery
///
/// Creating an engine spawns its reclamation task on the current Tokio
/// runtime; dropping the engine stops it.
pub struct QueueEngine {
    shared: Arc<QueueShared>,
    reclaimer: JoinHandle<()>,
}

impl QueueEngine {
    /// Create an empty queue and start its reclamation task
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(name: QualifiedQueueName, settings: QueueSettings) -> Self {
        let interval = settings.reclaim_interval.max(Duration::from_millis(1));
        let shared = Arc::new(QueueShared {
            name,
            settings,
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
        });

        let reclaimer = tokio::spawn(run_reclaimer(Arc::downgrade(&shared), interval));

        info!(queue = %shared.name, "Created queue");

        Self { shared, reclaimer }
    }

    pub fn name(&self) -> &QualifiedQueueName {
        &self.shared.name
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    /// Append a message to the tail of pending and wake one waiting claimant
    pub fn publish(&self, payload: Bytes) -> Result<MessageId, BrokerError> {
        let message = Message::new(payload)?;
        let message_id = message.id.clone();

        self.shared.lock().pending.push_back(message);
        self.shared.available.notify_one();

        debug!(queue = %self.shared.name, message_id = %message_id, "Published message");
        Ok(message_id)
    }

    /// Claim the oldest deliverable message, waiting up to `wait` for one
    ///
    /// The returned message is in flight until acknowledged or until its
    /// lease expires. Messages whose delivery count would exceed the limit
    /// are dead-lettered on the way and never returned.
    #[instrument(skip(self), fields(queue = %self.shared.name))]
    pub async fn claim(&self, wait: Duration) -> Result<Message, BrokerError> {
        let started = Instant::now();
        let deadline = started + wait.min(MAX_CLAIM_WAIT);

        loop {
            // Register interest before checking so a publish between the
            // check and the wait is not lost.
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.shared.try_claim(Instant::now()) {
                ClaimAttempt::Delivered(message) => {
                    debug!(
                        message_id = %message.id,
                        delivery_count = message.delivery_count,
                        "Claimed message"
                    );
                    return Ok(message);
                }
                ClaimAttempt::Yield => {
                    tokio::task::yield_now().await;
                    continue;
                }
                ClaimAttempt::Empty => {}
            }

            if Instant::now() >= deadline {
                debug!(waited_ms = wait.as_millis() as u64, "Claim window elapsed");
                return Err(BrokerError::Timeout { waited: wait });
            }

            // A wake-up and the deadline both lead back to a fresh check
            let _ = tokio::time::timeout_at(deadline, notified).await;
        }
    }

    /// Acknowledge an in-flight message, removing it permanently
    ///
    /// Fails once the lease has been reclaimed, or for ids that were never
    /// claimed from this queue.
    pub fn ack(&self, message_id: &MessageId) -> Result<(), BrokerError> {
        let removed = self.shared.lock().in_flight.remove(message_id);

        match removed {
            Some(_) => {
                debug!(queue = %self.shared.name, message_id = %message_id, "Acknowledged message");
                Ok(())
            }
            None => Err(BrokerError::MessageNotFound {
                message_id: message_id.to_string(),
            }),
        }
    }

    /// Snapshot of collection sizes, taken under a single lock hold
    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        QueueStats {
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            dead_letter: state.dead_letter.len(),
        }
    }

    /// Run one reclamation sweep immediately
    pub fn reclaim_expired(&self) -> ReclaimOutcome {
        self.shared.reclaim_expired(Instant::now())
    }
}

impl fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEngine")
            .field("name", &self.shared.name)
            .field("settings", &self.shared.settings)
            .finish_non_exhaustive()
    }
}

impl Drop for QueueEngine {
    fn drop(&mut self) {
        self.reclaimer.abort();
    }
}

async fn run_reclaimer(shared: Weak<QueueShared>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(shared) = shared.upgrade() else {
            break;
        };

        let outcome = shared.reclaim_expired(Instant::now());
        if !outcome.is_empty() {
            debug!(
                queue = %shared.name,
                requeued = outcome.requeued,
                dead_lettered = outcome.dead_lettered,
                "Reclaimed expired leases"
            );
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
