//! Subscription handle and listener registration

use crate::delivery::{Handler, SubscriptionCore};
use crate::error::Result;
use crate::registry::Registry;
use crate::types::{EventKind, ListenerId, Message, SubscriptionEvent, SubscriptionStats};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// A named delivery channel attached to one topic
///
/// Listeners are invoked on the subscription's dispatcher task, one message
/// at a time, each delivered to a random `"message"` listener. Messages
/// published while no listener is registered wait in the queue.
#[derive(Clone)]
pub struct Subscription {
    name: String,
    registry: Arc<Registry>,
}

impl Subscription {
    pub(crate) fn new(name: String, registry: Arc<Registry>) -> Self {
        Self { name, registry }
    }

    /// Full name (`projects/{project}/subscriptions/{name}`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the subscription is registered
    pub async fn exists(&self) -> Result<bool> {
        self.registry.subscription_exists(&self.name)
    }

    /// Delete the subscription, discarding its undelivered messages
    ///
    /// `"error"` listeners then receive a `NOT_FOUND` error and `"close"`
    /// listeners a close event.
    pub async fn delete(&self) -> Result<()> {
        self.registry.delete_subscription(&self.name)
    }

    /// Full name of the topic this subscription is attached to
    ///
    /// `None` once that topic has been deleted.
    pub async fn topic_name(&self) -> Result<Option<String>> {
        self.registry.subscription_topic(&self.name)
    }

    /// Register a listener for one event kind
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Result<ListenerId>
    where
        F: Fn(SubscriptionEvent) + Send + Sync + 'static,
    {
        let core = self.registry.subscription_core(&self.name)?;
        core.add_listener(kind, Arc::new(handler))
    }

    /// Register a `"message"` listener
    pub fn on_message<F>(&self, handler: F) -> Result<ListenerId>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.on(EventKind::Message, move |event| {
            if let SubscriptionEvent::Message(message) = event {
                handler(message);
            }
        })
    }

    /// Remove one listener, returning whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.registry
            .subscription_core(&self.name)
            .map(|core| core.remove_listener(id))
            .unwrap_or(false)
    }

    /// Remove the listeners of one kind, or of every kind with `None`
    ///
    /// Queued and in-flight messages are kept. Returns how many listeners
    /// were removed.
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) -> usize {
        self.registry
            .subscription_core(&self.name)
            .map(|core| core.remove_all_listeners(kind))
            .unwrap_or(0)
    }

    /// Receive messages as a stream instead of a callback
    ///
    /// The stream counts as one `"message"` listener until it is dropped.
    /// Messages still buffered in a dropped stream are nacked.
    pub fn listen(&self) -> Result<MessageStream> {
        let core = self.registry.subscription_core(&self.name)?;
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        let handler: Handler = Arc::new(move |event: SubscriptionEvent| {
            if let SubscriptionEvent::Message(message) = event {
                if let Err(mpsc::error::SendError(message)) = tx.send(message) {
                    message.nack();
                }
            }
        });
        let listener = core.add_listener(EventKind::Message, handler)?;
        tracing::debug!(subscription = %core.name(), listener = %listener, "Message stream opened");

        Ok(MessageStream {
            receiver: rx,
            core: Arc::downgrade(&core),
            listener,
        })
    }

    /// Queue and listener counters
    pub async fn stats(&self) -> Result<SubscriptionStats> {
        Ok(self.registry.subscription_core(&self.name)?.stats())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .finish()
    }
}

/// Stream of messages delivered to one listener
///
/// Ends when the subscription is deleted or its client dropped.
pub struct MessageStream {
    receiver: mpsc::UnboundedReceiver<Message>,
    core: Weak<SubscriptionCore>,
    listener: ListenerId,
}

impl MessageStream {
    /// Wait for the next message
    pub async fn next(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

impl Stream for MessageStream {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.remove_listener(self.listener);
        }
        self.receiver.close();
        while let Ok(message) = self.receiver.try_recv() {
            message.nack();
        }
    }
}
