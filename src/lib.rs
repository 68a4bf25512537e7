//! # a3s-pubsub
//!
//! In-process stand-in for a managed publish-subscribe service.
//!
//! ## Overview
//!
//! `a3s-pubsub` lets application and test code run topic and subscription
//! workflows without a broker: create topics, attach subscriptions, publish,
//! and receive messages with ack/nack semantics. Everything lives in memory
//! and is scoped to one project per client.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_pubsub::PubSub;
//!
//! # async fn example() -> a3s_pubsub::Result<()> {
//! let pubsub = PubSub::with_project("test-project")?;
//! let topic = pubsub.create_topic("orders").await?;
//! let subscription = topic.create_subscription("billing").await?;
//!
//! subscription.on_message(|message| {
//!     println!("Received {}: {}", message.id, message.text());
//!     message.ack();
//! })?;
//!
//! topic.publish("order #1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery
//!
//! - Publishing enqueues an independent copy into every attached subscription
//! - Each subscription hands its head message to one random `"message"` listener
//! - `ack()` removes the message; `nack()` puts it back at the head with the
//!   delivery attempt incremented
//! - Messages published while nobody listens wait in the queue
//!
//! ## Architecture
//!
//! - **PubSub**: project-scoped client and registry owner
//! - **Topic** / **Subscription**: lazy handles resolved when an action runs
//! - **Message**: delivered envelope with ack/nack capability
//! - One dispatcher task per subscription serves listeners

pub mod client;
pub mod config;
mod delivery;
pub mod error;
pub mod name;
mod registry;
pub mod subscription;
pub mod topic;
pub mod types;

// Re-export core types
pub use client::PubSub;
pub use config::PubSubConfig;
pub use error::{PubSubError, Result, StatusCode};
pub use name::{ResourceKind, ResourceName};
pub use subscription::{MessageStream, Subscription};
pub use topic::Topic;
pub use types::{
    Attributes, EventKind, ListenerId, Message, Payload, PublishMessage, SubscriptionEvent,
    SubscriptionStats,
};
