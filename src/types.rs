//! Core identifiers for workflow graphs.
//!
//! [`NodeKind`] names the nodes of a workflow graph. `Start` and `End` are
//! virtual endpoints: they are never executed and exist only so edges can
//! describe where execution enters and leaves the graph. Everything that runs
//! is a `Custom` node named after the stage it implements (`"safety_check"`,
//! `"suggest_tweets"`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// Supports serialization for checkpointing through both serde and the
/// [`encode`](Self::encode)/[`decode`](Self::decode) string form, which is the
/// shape stored in the persistence layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry point. Has no implementation; the edge out of `Start`
    /// determines the first node to run.
    Start,
    /// Virtual terminal. Routing to `End` completes the invocation.
    End,
    /// An executable stage, identified by a unique name within the graph.
    Custom(String),
}

impl NodeKind {
    /// Encode into the persisted string form.
    ///
    /// - `Start` → `"Start"`
    /// - `End` → `"End"`
    /// - `Custom("x")` → `"Custom:x"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => "Start".to_string(),
            NodeKind::End => "End".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode a persisted string form.
    ///
    /// Unrecognized formats fall back to `Custom(s)` so older checkpoints keep
    /// loading after a rename.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            NodeKind::Start
        } else if s == "End" {
            NodeKind::End
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    /// Returns `true` for the virtual terminal.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns `true` for the virtual entry point.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

// Allow string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}
