//! Project-scoped client
//!
//! `PubSub` is the entry point: one instance per project, cheap to clone.
//! Every clone shares the same registry, and projects never see each other's
//! resources.

use crate::config::PubSubConfig;
use crate::error::Result;
use crate::name::{format_name, ResourceKind};
use crate::registry::Registry;
use crate::subscription::Subscription;
use crate::topic::Topic;
use std::sync::Arc;

/// In-process Pub/Sub client for one project
///
/// Creating subscriptions spawns their dispatchers on the ambient Tokio
/// runtime. Dropping the last handle of a project stops them.
#[derive(Clone)]
pub struct PubSub {
    registry: Arc<Registry>,
}

impl PubSub {
    /// Create a client from a validated configuration
    pub fn new(config: PubSubConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            project = %config.project_id,
            max_message_bytes = config.max_message_bytes,
            "Pub/Sub client created"
        );
        Ok(Self {
            registry: Arc::new(Registry::new(config)),
        })
    }

    /// Create a client for `project_id` with default settings
    pub fn with_project(project_id: impl Into<String>) -> Result<Self> {
        Self::new(PubSubConfig::new(project_id))
    }

    /// Create a client whose project comes from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(PubSubConfig::from_env())
    }

    /// Project id every name is scoped to
    pub fn project_id(&self) -> &str {
        self.registry.project_id()
    }

    /// Active configuration
    pub fn config(&self) -> &PubSubConfig {
        self.registry.config()
    }

    /// Create a topic, failing with `ALREADY_EXISTS` on a duplicate name
    pub async fn create_topic(&self, name: &str) -> Result<Topic> {
        let full = self.registry.create_topic(name)?;
        Ok(Topic::new(full, self.registry.clone()))
    }

    /// Every topic of the project, in creation order
    pub async fn get_topics(&self) -> Result<Vec<Topic>> {
        let names = self.registry.topic_names()?;
        Ok(names
            .into_iter()
            .map(|name| Topic::new(name, self.registry.clone()))
            .collect())
    }

    /// Handle to a topic that may not exist yet
    pub fn topic(&self, name: &str) -> Topic {
        let name = format_name(name, ResourceKind::Topic, self.project_id());
        Topic::new(name, self.registry.clone())
    }

    /// Every subscription of the project, in creation order
    pub async fn get_subscriptions(&self) -> Result<Vec<Subscription>> {
        let names = self.registry.subscription_names(None)?;
        Ok(names
            .into_iter()
            .map(|name| Subscription::new(name, self.registry.clone()))
            .collect())
    }

    /// Handle to a subscription that may not exist yet
    pub fn subscription(&self, name: &str) -> Subscription {
        let name = format_name(name, ResourceKind::Subscription, self.project_id());
        Subscription::new(name, self.registry.clone())
    }

    /// Delete every topic, then every subscription
    ///
    /// Listeners of deleted subscriptions receive their error and close
    /// events. Handles stay usable and report `NOT_FOUND`.
    pub async fn clear(&self) -> Result<()> {
        self.registry.clear()
    }
}

impl std::fmt::Debug for PubSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSub")
            .field("project_id", &self.project_id())
            .finish()
    }
}
