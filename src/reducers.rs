//! Merge discipline for node partial updates.
//!
//! Each channel has exactly one merge rule:
//!
//! - **messages**: append in order, never replacing prior history
//! - **domain**: wholesale replacement with the node's copy
//! - **errors**: append in order
//!
//! Versions bump only when a channel actually changed, so checkpoint diffs
//! stay meaningful.

use crate::node::NodePartial;
use crate::state::{Domain, WorkflowState};

/// Channels touched by a merge, reported for logging and checkpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub messages_updated: bool,
    pub domain_updated: bool,
    pub errors_updated: bool,
}

impl MergeOutcome {
    pub fn updated_channels(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.messages_updated {
            out.push("messages");
        }
        if self.domain_updated {
            out.push("domain");
        }
        if self.errors_updated {
            out.push("errors");
        }
        out
    }
}

/// Apply a node's partial update to the session state.
pub fn apply_partial<S: Domain>(
    state: &mut WorkflowState<S>,
    partial: NodePartial<S>,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    if let Some(messages) = partial.messages
        && !messages.is_empty()
    {
        state.messages.get_mut().extend(messages);
        state.messages.bump();
        outcome.messages_updated = true;
    }

    if let Some(domain) = partial.domain {
        *state.domain.get_mut() = domain;
        state.domain.bump();
        outcome.domain_updated = true;
    }

    if let Some(errors) = partial.errors
        && !errors.is_empty()
    {
        state.errors.get_mut().extend(errors);
        state.errors.bump();
        outcome.errors_updated = true;
    }

    outcome
}
