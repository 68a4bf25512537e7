//! Per-project resource registry
//!
//! Maps full topic and subscription names to their state. Topics own no
//! reference to their subscriptions; each subscription records the topic it
//! was bound to together with that topic's creation sequence, so a topic
//! deleted and recreated under the same name does not pick up the old
//! subscriptions.

use crate::config::PubSubConfig;
use crate::delivery::{PublishedMessage, SubscriptionCore};
use crate::error::{PubSubError, Result};
use crate::name::{ResourceKind, ResourceName};
use crate::types::Attributes;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct TopicRecord {
    seq: u64,
    // Serializes fan-out so every subscription sees one topic's messages in the same order
    fanout: Mutex<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TopicBinding {
    name: String,
    seq: u64,
}

struct SubscriptionRecord {
    seq: u64,
    topic: Option<TopicBinding>,
    core: Arc<SubscriptionCore>,
}

#[derive(Default)]
struct RegistryState {
    topics: HashMap<String, TopicRecord>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    next_seq: u64,
}

impl RegistryState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Topics and subscriptions of one project
pub(crate) struct Registry {
    config: PubSubConfig,
    state: RwLock<RegistryState>,
    next_message_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new(config: PubSubConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
            next_message_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn config(&self) -> &PubSubConfig {
        &self.config
    }

    pub(crate) fn project_id(&self) -> &str {
        &self.config.project_id
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|e| PubSubError::Internal(format!("Registry lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|e| PubSubError::Internal(format!("Registry lock poisoned: {}", e)))
    }

    /// Full name of `name` within this registry's project
    ///
    /// Names from another project are syntactically valid but never exist
    /// here, so they resolve to `None`.
    fn resolve(&self, name: &str, kind: ResourceKind) -> Result<Option<String>> {
        let resolved = ResourceName::resolve(name, kind, self.project_id())?;
        if resolved.project() != self.project_id() {
            tracing::debug!(
                name = %resolved.full_name(),
                project = %self.project_id(),
                "Name outside project"
            );
            return Ok(None);
        }
        Ok(Some(resolved.full_name()))
    }

    /// Like [`Registry::resolve`], with foreign names reported as `NOT_FOUND`
    fn resolve_own(&self, name: &str, kind: ResourceKind) -> Result<String> {
        self.resolve(name, kind)?.ok_or_else(|| PubSubError::not_found(kind))
    }

    // ─── Topics ───

    pub(crate) fn create_topic(&self, name: &str) -> Result<String> {
        let full = self.resolve_own(name, ResourceKind::Topic)?;
        let mut state = self.write()?;
        if state.topics.contains_key(&full) {
            return Err(PubSubError::already_exists(ResourceKind::Topic));
        }
        let seq = state.next_seq();
        state.topics.insert(
            full.clone(),
            TopicRecord {
                seq,
                fanout: Mutex::new(()),
            },
        );
        tracing::info!(topic = %full, "Topic created");
        Ok(full)
    }

    pub(crate) fn topic_exists(&self, name: &str) -> Result<bool> {
        match self.resolve(name, ResourceKind::Topic)? {
            Some(full) => Ok(self.read()?.topics.contains_key(&full)),
            None => Ok(false),
        }
    }

    /// Remove a topic; its subscriptions stay registered but detached
    pub(crate) fn delete_topic(&self, name: &str) -> Result<()> {
        let full = self.resolve_own(name, ResourceKind::Topic)?;
        let mut state = self.write()?;
        if state.topics.remove(&full).is_none() {
            return Err(PubSubError::not_found(ResourceKind::Topic));
        }

        let mut detached = 0usize;
        for record in state.subscriptions.values_mut() {
            if record.topic.as_ref().is_some_and(|b| b.name == full) {
                record.topic = None;
                detached += 1;
            }
        }
        tracing::info!(topic = %full, detached, "Topic deleted");
        Ok(())
    }

    /// Full names of every topic, in creation order
    pub(crate) fn topic_names(&self) -> Result<Vec<String>> {
        let state = self.read()?;
        let mut topics: Vec<(u64, &String)> = state
            .topics
            .iter()
            .map(|(name, record)| (record.seq, name))
            .collect();
        topics.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(topics.into_iter().map(|(_, name)| name.clone()).collect())
    }

    // ─── Subscriptions ───

    pub(crate) fn create_subscription(&self, topic: &str, name: &str) -> Result<String> {
        let full = self.resolve(name, ResourceKind::Subscription)?;
        let topic_full = self.resolve(topic, ResourceKind::Topic)?;
        let topic_full = topic_full.ok_or_else(|| PubSubError::not_found(ResourceKind::Topic))?;
        let full = full.ok_or_else(|| PubSubError::not_found(ResourceKind::Subscription))?;

        let mut state = self.write()?;
        if state.subscriptions.contains_key(&full) {
            return Err(PubSubError::already_exists(ResourceKind::Subscription));
        }
        let topic_seq = state
            .topics
            .get(&topic_full)
            .map(|record| record.seq)
            .ok_or_else(|| PubSubError::not_found(ResourceKind::Topic))?;

        let seq = state.next_seq();
        let core = SubscriptionCore::start(full.clone(), self.config.dispatch_seed);
        state.subscriptions.insert(
            full.clone(),
            SubscriptionRecord {
                seq,
                topic: Some(TopicBinding {
                    name: topic_full.clone(),
                    seq: topic_seq,
                }),
                core,
            },
        );
        tracing::info!(subscription = %full, topic = %topic_full, "Subscription created");
        Ok(full)
    }

    pub(crate) fn subscription_exists(&self, name: &str) -> Result<bool> {
        match self.resolve(name, ResourceKind::Subscription)? {
            Some(full) => Ok(self.read()?.subscriptions.contains_key(&full)),
            None => Ok(false),
        }
    }

    pub(crate) fn subscription_core(&self, name: &str) -> Result<Arc<SubscriptionCore>> {
        let full = self.resolve_own(name, ResourceKind::Subscription)?;
        self.read()?
            .subscriptions
            .get(&full)
            .map(|record| record.core.clone())
            .ok_or_else(|| PubSubError::not_found(ResourceKind::Subscription))
    }

    /// Full name of the bound topic, `None` once that topic was deleted
    pub(crate) fn subscription_topic(&self, name: &str) -> Result<Option<String>> {
        let full = self.resolve_own(name, ResourceKind::Subscription)?;
        self.read()?
            .subscriptions
            .get(&full)
            .map(|record| record.topic.as_ref().map(|b| b.name.clone()))
            .ok_or_else(|| PubSubError::not_found(ResourceKind::Subscription))
    }

    pub(crate) fn delete_subscription(&self, name: &str) -> Result<()> {
        let full = self.resolve_own(name, ResourceKind::Subscription)?;
        let record = self
            .write()?
            .subscriptions
            .remove(&full)
            .ok_or_else(|| PubSubError::not_found(ResourceKind::Subscription))?;

        record.core.mark_deleted();
        tracing::info!(subscription = %full, "Subscription deleted");
        Ok(())
    }

    /// Full names of subscriptions in creation order, optionally only those
    /// attached to `topic`
    pub(crate) fn subscription_names(&self, topic: Option<&str>) -> Result<Vec<String>> {
        let topic_full = match topic {
            Some(topic) => Some(self.resolve_own(topic, ResourceKind::Topic)?),
            None => None,
        };

        let state = self.read()?;
        let binding = match &topic_full {
            Some(full) => {
                let record = state
                    .topics
                    .get(full)
                    .ok_or_else(|| PubSubError::not_found(ResourceKind::Topic))?;
                Some(TopicBinding {
                    name: full.clone(),
                    seq: record.seq,
                })
            }
            None => None,
        };

        let mut subscriptions: Vec<(u64, &String)> = state
            .subscriptions
            .iter()
            .filter(|(_, record)| binding.is_none() || record.topic == binding)
            .map(|(name, record)| (record.seq, name))
            .collect();
        subscriptions.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(subscriptions.into_iter().map(|(_, name)| name.clone()).collect())
    }

    // ─── Publish ───

    /// Enqueue one message into every subscription attached to `topic`
    ///
    /// Returns once the message sits in every queue; no listener runs on the
    /// caller's stack.
    pub(crate) fn publish(&self, topic: &str, data: Bytes, attributes: Attributes) -> Result<String> {
        let full = self.resolve_own(topic, ResourceKind::Topic)?;
        let max = self.config.max_message_bytes;
        if data.len() > max {
            return Err(PubSubError::InvalidArgument(format!(
                "Request payload size exceeds the limit: {} bytes.",
                max
            )));
        }
        if data.is_empty() && attributes.is_empty() {
            return Err(PubSubError::InvalidArgument(
                "Message must contain data or at least one attribute".to_string(),
            ));
        }

        let state = self.read()?;
        let record = state
            .topics
            .get(&full)
            .ok_or_else(|| PubSubError::not_found(ResourceKind::Topic))?;
        let binding = TopicBinding {
            name: full.clone(),
            seq: record.seq,
        };

        let _fanout = record.fanout.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed).to_string();
        let message = Arc::new(PublishedMessage {
            id: id.clone(),
            data,
            attributes,
            publish_time: Utc::now(),
        });

        let mut fanout = 0usize;
        for subscription in state.subscriptions.values() {
            if subscription.topic.as_ref() == Some(&binding) {
                subscription.core.enqueue(message.clone());
                fanout += 1;
            }
        }
        tracing::debug!(
            topic = %full,
            message_id = %id,
            bytes = message.data.len(),
            subscriptions = fanout,
            "Message published"
        );
        Ok(id)
    }

    /// Delete every topic, then every subscription
    pub(crate) fn clear(&self) -> Result<()> {
        let (topics, cores) = {
            let mut state = self.write()?;
            let topics = state.topics.len();
            state.topics.clear();
            let cores: Vec<Arc<SubscriptionCore>> = state
                .subscriptions
                .drain()
                .map(|(_, record)| record.core)
                .collect();
            (topics, cores)
        };

        for core in &cores {
            core.mark_deleted();
        }
        tracing::info!(
            project = %self.project_id(),
            topics,
            subscriptions = cores.len(),
            "Registry cleared"
        );
        Ok(())
    }
}
