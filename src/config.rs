//! Client configuration

use crate::error::{PubSubError, Result};
use serde::{Deserialize, Serialize};

/// Project used when none is configured
pub const DEFAULT_PROJECT_ID: &str = "local-project";

/// Payload limit of the managed service (10 MiB)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Environment variables consulted by [`PubSubConfig::from_env`], in order
pub const PROJECT_ENV_VARS: [&str; 2] = ["PUBSUB_PROJECT_ID", "GCP_PROJECT_ID"];

/// Configuration for one project-scoped [`PubSub`](crate::PubSub) client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubConfig {
    /// Project every resource name is scoped to
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Largest accepted message payload in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Seed for the random listener selection of every subscription
    ///
    /// `None` seeds from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_seed: Option<u64>,
}

fn default_project_id() -> String {
    DEFAULT_PROJECT_ID.to_string()
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            dispatch_seed: None,
        }
    }
}

impl PubSubConfig {
    /// Default configuration for the given project
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Read the project id from `PUBSUB_PROJECT_ID` or `GCP_PROJECT_ID`
    pub fn from_env() -> Self {
        let project_id = PROJECT_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty());

        match project_id {
            Some(project_id) => Self::new(project_id),
            None => Self::default(),
        }
    }

    /// Override the payload size limit
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Seed listener selection for reproducible dispatch
    pub fn with_dispatch_seed(mut self, seed: u64) -> Self {
        self.dispatch_seed = Some(seed);
        self
    }

    /// Check the configuration before a client is built from it
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(PubSubError::InvalidArgument(
                "Project ID cannot be empty".to_string(),
            ));
        }
        if self.project_id.contains('/') {
            return Err(PubSubError::InvalidArgument(format!(
                "Project ID cannot contain '/': {}",
                self.project_id
            )));
        }
        if self.max_message_bytes == 0 {
            return Err(PubSubError::InvalidArgument(
                "Maximum message size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
