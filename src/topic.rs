//! Topic handle

use crate::error::Result;
use crate::name::{format_name, ResourceKind};
use crate::registry::Registry;
use crate::subscription::Subscription;
use crate::types::{Attributes, PublishMessage};
use bytes::Bytes;
use std::sync::Arc;

/// A named publish endpoint
///
/// A handle may point at a topic that does not exist; operations on it then
/// fail with `NOT_FOUND` (or `INVALID_ARGUMENT` for a malformed name).
#[derive(Clone)]
pub struct Topic {
    name: String,
    registry: Arc<Registry>,
}

impl Topic {
    pub(crate) fn new(name: String, registry: Arc<Registry>) -> Self {
        Self { name, registry }
    }

    /// Full name (`projects/{project}/topics/{name}`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the topic this handle points at
    pub async fn create(&self) -> Result<()> {
        self.registry.create_topic(&self.name).map(|_| ())
    }

    /// Whether the topic is registered
    pub async fn exists(&self) -> Result<bool> {
        self.registry.topic_exists(&self.name)
    }

    /// Delete the topic
    ///
    /// Its subscriptions remain registered but stop receiving messages.
    pub async fn delete(&self) -> Result<()> {
        self.registry.delete_topic(&self.name)
    }

    /// Publish raw bytes, returning the message id
    pub async fn publish(&self, data: impl Into<Bytes>) -> Result<String> {
        self.registry.publish(&self.name, data.into(), Attributes::new())
    }

    /// Publish raw bytes with attributes
    pub async fn publish_with_attributes(
        &self,
        data: impl Into<Bytes>,
        attributes: Attributes,
    ) -> Result<String> {
        self.registry.publish(&self.name, data.into(), attributes)
    }

    /// Publish a raw or JSON message
    pub async fn publish_message(&self, message: PublishMessage) -> Result<String> {
        let (data, attributes) = message.into_parts()?;
        self.registry.publish(&self.name, data, attributes)
    }

    /// Create a subscription attached to this topic
    pub async fn create_subscription(&self, name: &str) -> Result<Subscription> {
        let full = self.registry.create_subscription(&self.name, name)?;
        Ok(Subscription::new(full, self.registry.clone()))
    }

    /// Handle to a subscription that may not exist yet
    pub fn subscription(&self, name: &str) -> Subscription {
        let name = format_name(name, ResourceKind::Subscription, self.registry.project_id());
        Subscription::new(name, self.registry.clone())
    }

    /// Subscriptions attached to this topic, in creation order
    pub async fn get_subscriptions(&self) -> Result<Vec<Subscription>> {
        let names = self.registry.subscription_names(Some(&self.name))?;
        Ok(names
            .into_iter()
            .map(|name| Subscription::new(name, self.registry.clone()))
            .collect())
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic").field("name", &self.name).finish()
    }
}
