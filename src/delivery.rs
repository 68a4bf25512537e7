//! Per-subscription delivery state machine
//!
//! Every subscription owns one `SubscriptionCore`: a pending queue, the set
//! of deliveries awaiting ack/nack, and the registered listeners, all behind
//! a single mutex. One dispatcher task per subscription drains the queue,
//! handing the head message to a uniformly random `"message"` listener.
//!
//! Envelope lifecycle: `pending -> in flight -> acked | pending (nack)`.
//! An envelope is in exactly one of the two collections at any time.

use crate::error::{PubSubError, Result};
use crate::name::ResourceKind;
use crate::types::{Attributes, EventKind, ListenerId, Message, SubscriptionEvent, SubscriptionStats};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::Notify;

/// Listener callback
pub(crate) type Handler = Arc<dyn Fn(SubscriptionEvent) + Send + Sync>;

/// A message as accepted by a topic, shared by every subscription's envelope
#[derive(Debug)]
pub(crate) struct PublishedMessage {
    pub(crate) id: String,
    pub(crate) data: Bytes,
    pub(crate) attributes: Attributes,
    pub(crate) publish_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Envelope {
    message: Arc<PublishedMessage>,
    delivery_attempt: u32,
}

struct DeliveryState {
    pending: VecDeque<Envelope>,
    in_flight: HashMap<String, Envelope>,
    listeners: HashMap<EventKind, BTreeMap<ListenerId, Handler>>,
    next_listener: u64,
    rng: StdRng,
    deleted: bool,
}

impl DeliveryState {
    fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, BTreeMap::len)
    }
}

/// What the dispatcher should do next
enum Step {
    Deliver(Handler, Message),
    Idle,
}

/// Listeners owed a final event after the subscription was deleted
#[derive(Default)]
struct Farewell {
    errors: Vec<Handler>,
    closes: Vec<Handler>,
}

/// Shared between a core and its dispatcher; outlives the core
#[derive(Default)]
struct Signal {
    wake: Notify,
    farewell: Mutex<Option<Farewell>>,
}

impl Signal {
    fn take_farewell(&self) -> Option<Farewell> {
        self.farewell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Queue, in-flight set and listeners of one subscription
pub(crate) struct SubscriptionCore {
    name: String,
    state: Mutex<DeliveryState>,
    signal: Arc<Signal>,
}

impl std::fmt::Debug for SubscriptionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionCore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SubscriptionCore {
    /// Create the core and spawn its dispatcher on the current runtime
    pub(crate) fn start(name: impl Into<String>, seed: Option<u64>) -> Arc<Self> {
        let core = Arc::new(Self::new(name, seed));
        tokio::spawn(dispatch(
            core.name.clone(),
            Arc::downgrade(&core),
            core.signal.clone(),
        ));
        core
    }

    fn new(name: impl Into<String>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            name: name.into(),
            state: Mutex::new(DeliveryState {
                pending: VecDeque::new(),
                in_flight: HashMap::new(),
                listeners: HashMap::new(),
                next_listener: 0,
                rng,
                deleted: false,
            }),
            signal: Arc::new(Signal::default()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    // A panicking listener must not wedge settlement of other deliveries
    fn lock(&self) -> MutexGuard<'_, DeliveryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a freshly published message to the pending queue
    pub(crate) fn enqueue(&self, message: Arc<PublishedMessage>) {
        {
            let mut state = self.lock();
            if state.deleted {
                return;
            }
            state.pending.push_back(Envelope {
                message,
                delivery_attempt: 1,
            });
        }
        self.signal.wake.notify_one();
    }

    pub(crate) fn add_listener(&self, kind: EventKind, handler: Handler) -> Result<ListenerId> {
        let id = {
            let mut state = self.lock();
            if state.deleted {
                return Err(PubSubError::not_found(ResourceKind::Subscription));
            }
            state.next_listener += 1;
            let id = ListenerId(state.next_listener);
            state.listeners.entry(kind).or_default().insert(id, handler);
            id
        };
        tracing::debug!(subscription = %self.name, listener = %id, event = %kind, "Listener added");
        if kind == EventKind::Message {
            self.signal.wake.notify_one();
        }
        Ok(id)
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let removed = state
            .listeners
            .values_mut()
            .any(|handlers| handlers.remove(&id).is_some());
        state.listeners.retain(|_, handlers| !handlers.is_empty());
        removed
    }

    /// Drop listeners of one kind, or of every kind. Queued messages stay.
    pub(crate) fn remove_all_listeners(&self, kind: Option<EventKind>) -> usize {
        let mut state = self.lock();
        let removed = match kind {
            Some(kind) => state.listeners.remove(&kind).map_or(0, |h| h.len()),
            None => state.listeners.drain().map(|(_, h)| h.len()).sum(),
        };
        tracing::debug!(subscription = %self.name, removed, "Listeners removed");
        removed
    }

    pub(crate) fn ack(&self, ack_id: &str) {
        let settled = self.lock().in_flight.remove(ack_id);
        match settled {
            Some(envelope) => tracing::debug!(
                subscription = %self.name,
                message_id = %envelope.message.id,
                "Message acked"
            ),
            None => tracing::debug!(subscription = %self.name, ack_id, "Ack ignored"),
        }
    }

    pub(crate) fn nack(&self, ack_id: &str) {
        {
            let mut state = self.lock();
            let Some(mut envelope) = state.in_flight.remove(ack_id) else {
                tracing::debug!(subscription = %self.name, ack_id, "Nack ignored");
                return;
            };
            envelope.delivery_attempt += 1;
            tracing::debug!(
                subscription = %self.name,
                message_id = %envelope.message.id,
                attempt = envelope.delivery_attempt,
                "Message nacked"
            );
            state.pending.push_front(envelope);
        }
        self.signal.wake.notify_one();
    }

    pub(crate) fn stats(&self) -> SubscriptionStats {
        let state = self.lock();
        SubscriptionStats {
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            listeners: state.listeners.values().map(BTreeMap::len).sum(),
        }
    }

    /// Discard queued messages and hand the error/close listeners to the
    /// dispatcher for a final event
    pub(crate) fn mark_deleted(&self) {
        let farewell = {
            let mut state = self.lock();
            if state.deleted {
                return;
            }
            let discarded = state.pending.len() + state.in_flight.len();
            if discarded > 0 {
                tracing::warn!(
                    subscription = %self.name,
                    discarded,
                    "Subscription deleted with undelivered messages"
                );
            }
            state.pending.clear();
            state.in_flight.clear();
            state.deleted = true;

            let mut take = |kind: EventKind| -> Vec<Handler> {
                state
                    .listeners
                    .remove(&kind)
                    .map(|h| h.into_values().collect())
                    .unwrap_or_default()
            };
            let farewell = Farewell {
                errors: take(EventKind::Error),
                closes: take(EventKind::Close),
            };
            state.listeners.clear();
            farewell
        };

        *self
            .signal
            .farewell
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(farewell);
        self.signal.wake.notify_one();
    }

    fn next_step(self: &Arc<Self>) -> Step {
        let mut guard = self.lock();
        let state = &mut *guard;

        let count = state.listener_count(EventKind::Message);
        if count == 0 || state.pending.is_empty() {
            return Step::Idle;
        }

        let index = state.rng.gen_range(0..count);
        let Some(handler) = state
            .listeners
            .get(&EventKind::Message)
            .and_then(|handlers| handlers.values().nth(index))
            .cloned()
        else {
            return Step::Idle;
        };
        let Some(envelope) = state.pending.pop_front() else {
            return Step::Idle;
        };

        let ack_id = uuid::Uuid::new_v4().to_string();
        let message = Message {
            id: envelope.message.id.clone(),
            ack_id: ack_id.clone(),
            data: envelope.message.data.clone(),
            attributes: envelope.message.attributes.clone(),
            publish_time: envelope.message.publish_time,
            delivery_attempt: envelope.delivery_attempt,
            core: Arc::downgrade(self),
        };
        state.in_flight.insert(ack_id, envelope);
        Step::Deliver(handler, message)
    }
}

impl Drop for SubscriptionCore {
    fn drop(&mut self) {
        self.signal.wake.notify_one();
    }
}

/// Run one listener, returning `false` if it panicked
fn invoke(subscription: &str, handler: &Handler, event: SubscriptionEvent) -> bool {
    let kind = event.kind();
    if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
        tracing::error!(subscription, event = %kind, "Listener panicked");
        return false;
    }
    true
}

/// Dispatcher loop; exits when the core is deleted or dropped
async fn dispatch(name: String, core: Weak<SubscriptionCore>, signal: Arc<Signal>) {
    loop {
        if let Some(farewell) = signal.take_farewell() {
            if !farewell.errors.is_empty() {
                let error = Arc::new(PubSubError::not_found(ResourceKind::Subscription));
                for handler in &farewell.errors {
                    invoke(&name, handler, SubscriptionEvent::Error(error.clone()));
                }
            }
            for handler in &farewell.closes {
                invoke(&name, handler, SubscriptionEvent::Close);
            }
            tracing::debug!(subscription = %name, "Dispatcher stopped");
            return;
        }

        let step = match core.upgrade() {
            Some(core) => core.next_step(),
            None => return,
        };

        match step {
            Step::Deliver(handler, message) => {
                tracing::debug!(
                    subscription = %name,
                    message_id = %message.id,
                    attempt = message.delivery_attempt,
                    "Delivering message"
                );
                let ack_id = message.ack_id.clone();
                if !invoke(&name, &handler, SubscriptionEvent::Message(message)) {
                    // Requeue unless the listener settled the message before panicking
                    if let Some(core) = core.upgrade() {
                        core.nack(&ack_id);
                    }
                }
                tokio::task::yield_now().await;
            }
            Step::Idle => signal.wake.notified().await,
        }
    }
}
