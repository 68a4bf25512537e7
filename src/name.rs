//! Resource name formatting and resolution
//!
//! Names arrive short (`orders`) or fully qualified
//! (`projects/{project}/topics/orders`). Handles keep the formatted name
//! and resolve it only when an action runs, the same way the managed
//! client defers validation to the server.

use crate::error::{PubSubError, Result};
use std::fmt;

/// Longest accepted short name
pub const MAX_NAME_LEN: usize = 255;

/// The two kinds of named resources in a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A topic (`projects/{project}/topics/{name}`)
    Topic,
    /// A subscription (`projects/{project}/subscriptions/{name}`)
    Subscription,
}

impl ResourceKind {
    /// Collection segment used in fully-qualified names
    pub fn collection(self) -> &'static str {
        match self {
            ResourceKind::Topic => "topics",
            ResourceKind::Subscription => "subscriptions",
        }
    }

    pub(crate) fn not_found_detail(self) -> &'static str {
        match self {
            ResourceKind::Topic => "Topic not found",
            ResourceKind::Subscription => "Subscription does not exist",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Topic => f.write_str("Topic"),
            ResourceKind::Subscription => f.write_str("Subscription"),
        }
    }
}

/// A validated resource name scoped to one project
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    kind: ResourceKind,
    project: String,
    short_name: String,
}

impl ResourceName {
    /// Resolve a short or fully-qualified name
    ///
    /// Short names land in `project_id`. Fully-qualified input must have
    /// exactly four non-empty segments, start with `projects` and use the
    /// collection of `kind`; it keeps the project it names. Anything else is
    /// `INVALID_ARGUMENT` carrying the input as given.
    pub fn resolve(input: &str, kind: ResourceKind, project_id: &str) -> Result<Self> {
        let invalid = || PubSubError::invalid_name(kind, input);

        if !input.contains('/') {
            if !is_valid_short_name(input) {
                return Err(invalid());
            }
            return Ok(Self {
                kind,
                project: project_id.to_string(),
                short_name: input.to_string(),
            });
        }

        let parts: Vec<&str> = input.split('/').collect();
        match parts.as_slice() {
            ["projects", project, collection, short]
                if *collection == kind.collection()
                    && !project.is_empty()
                    && is_valid_short_name(short) =>
            {
                Ok(Self {
                    kind,
                    project: project.to_string(),
                    short_name: short.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }

    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Owning project id
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Last segment of the name
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// `projects/{project}/{collection}/{short_name}`
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/{}/{}",
            self.project,
            self.kind.collection(),
            self.short_name
        )
    }
}

/// Format a name for a handle without validating it
///
/// Short names are expanded into the project; anything containing a slash
/// is kept verbatim so a malformed name surfaces when an action runs.
pub fn format_name(input: &str, kind: ResourceKind, project_id: &str) -> String {
    if input.contains('/') {
        input.to_string()
    } else {
        format!("projects/{}/{}/{}", project_id, kind.collection(), input)
    }
}

fn is_valid_short_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN && !name.contains('/')
}
