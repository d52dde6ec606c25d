//! Structured error events carried on the state's error channel.
//!
//! Node agents fold recoverable failures into their domain record; the error
//! channel is for events the runtime itself records; most importantly the
//! synthetic marker appended when a node agent fails outright and the
//! invocation aborts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an error event originated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    /// Raised while executing a node; `kind` is the encoded node identifier.
    Node { kind: String, step: u64 },
    /// Raised by the runner outside any node (routing, persistence).
    Runner { session: String, step: u64 },
    /// No narrower scope applies.
    App,
}

impl Default for ErrorScope {
    fn default() -> Self {
        Self::App
    }
}

/// One recorded error, with enough context to diagnose it after resume.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(default = "Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl ErrorEvent {
    /// Create a node-scoped event.
    pub fn node(kind: impl Into<String>, step: u64, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node {
                kind: kind.into(),
                step,
            },
            message: message.into(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a runner-scoped event.
    pub fn runner(session: impl Into<String>, step: u64, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Runner {
                session: session.into(),
                step,
            },
            message: message.into(),
            context: serde_json::Value::Null,
        }
    }

    /// Attach structured context.
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_serializes_tagged() {
        let event = ErrorEvent::node("Custom:bill_analyst", 2, "fetch failed")
            .with_context(json!({"url": "https://example.gov/bill"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["scope"]["scope"], "node");
        assert_eq!(value["scope"]["kind"], "Custom:bill_analyst");
        assert_eq!(value["message"], "fetch failed");
    }

    #[test]
    fn default_scope_is_app() {
        let event: ErrorEvent = serde_json::from_value(json!({"message": "boom"})).unwrap();
        assert_eq!(event.scope, ErrorScope::App);
    }
}
