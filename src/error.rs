//! Error types for a3s-pubsub
//!
//! Every error carries the numeric status code the managed Pub/Sub API
//! would return, and its `Display` output matches the service's
//! `"<code> <NAME>: <detail>"` message shape.

use crate::name::ResourceKind;
use std::fmt;
use thiserror::Error;

/// Status codes surfaced by the emulated API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    /// Malformed name, oversized payload, bad JSON
    InvalidArgument = 3,
    /// Topic or subscription does not exist
    NotFound = 5,
    /// Topic or subscription already exists
    AlreadyExists = 6,
    /// Internal failure (poisoned lock)
    Internal = 13,
}

impl StatusCode {
    /// Numeric value of the code
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Canonical upper-case name (e.g. `NOT_FOUND`)
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_i32(), self.name())
    }
}

/// Errors that can occur in the Pub/Sub emulator
#[derive(Debug, Error)]
pub enum PubSubError {
    /// A resource with the same full name already exists
    #[error("{}: {} already exists", StatusCode::AlreadyExists, .kind)]
    AlreadyExists { kind: ResourceKind },

    /// The named resource does not exist
    #[error("{}: {}", StatusCode::NotFound, .kind.not_found_detail())]
    NotFound { kind: ResourceKind },

    /// A name that cannot be resolved for the expected resource kind
    #[error("{}: Invalid [{}] name: (name={})", StatusCode::InvalidArgument, .kind.collection(), .name)]
    InvalidName { kind: ResourceKind, name: String },

    /// Any other rejected argument (payload size, empty message, config)
    #[error("{}: {0}", StatusCode::InvalidArgument)]
    InvalidArgument(String),

    /// A JSON payload could not be serialized or decoded
    #[error("{}: JSON payload error: {0}", StatusCode::InvalidArgument)]
    Serialization(#[from] serde_json::Error),

    /// Internal state could not be accessed
    #[error("{}: {0}", StatusCode::Internal)]
    Internal(String),
}

impl PubSubError {
    /// Status code of this error
    pub fn code(&self) -> StatusCode {
        match self {
            PubSubError::AlreadyExists { .. } => StatusCode::AlreadyExists,
            PubSubError::NotFound { .. } => StatusCode::NotFound,
            PubSubError::InvalidName { .. }
            | PubSubError::InvalidArgument(_)
            | PubSubError::Serialization(_) => StatusCode::InvalidArgument,
            PubSubError::Internal(_) => StatusCode::Internal,
        }
    }

    pub(crate) fn not_found(kind: ResourceKind) -> Self {
        PubSubError::NotFound { kind }
    }

    pub(crate) fn already_exists(kind: ResourceKind) -> Self {
        PubSubError::AlreadyExists { kind }
    }

    pub(crate) fn invalid_name(kind: ResourceKind, name: impl Into<String>) -> Self {
        PubSubError::InvalidName {
            kind,
            name: name.into(),
        }
    }
}

/// Result type alias for Pub/Sub operations
pub type Result<T> = std::result::Result<T, PubSubError>;
