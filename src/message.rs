//! Conversational turns flowing through a workflow.
//!
//! A [`Message`] is one turn of the conversation: a role plus text content.
//! The message channel is append-only: nodes add turns, nothing reorders or
//! rewrites history.

use serde::{Deserialize, Serialize};

/// One conversational turn.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The sender role; use the constants on [`Message`] for the standard ones.
    pub role: String,
    /// The text content of the turn.
    pub content: String,
}

impl Message {
    /// User input role.
    pub const USER: &'static str = "user";
    /// Assistant response role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System instruction role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a message with an arbitrary role.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns `true` if this message carries the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}
