//! The compiled, executable workflow graph.
//!
//! An [`App`] is the immutable product of [`GraphBuilder::compile`]
//! (topology + runtime configuration). Execution state lives in the
//! [`AppRunner`](crate::runtime::AppRunner), which owns sessions,
//! checkpointing, and the per-session locks; one `App` can be shared by any
//! number of runners.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::graph::EdgePredicate;
use crate::node::Node;
use crate::runtime::RuntimeConfig;
use crate::state::Domain;
use crate::types::NodeKind;

/// A compiled workflow graph.
pub struct App<S> {
    nodes: FxHashMap<NodeKind, Arc<dyn Node<S>>>,
    edges: FxHashMap<NodeKind, NodeKind>,
    conditional_edges: FxHashMap<NodeKind, EdgePredicate<S>>,
    runtime_config: RuntimeConfig,
}

impl<S> std::fmt::Debug for App<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field(
                "conditional_edges",
                &self.conditional_edges.keys().collect::<Vec<_>>(),
            )
            .field("runtime_config", &self.runtime_config)
            .finish()
    }
}

impl<S: Domain> App<S> {
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, Arc<dyn Node<S>>>,
        edges: FxHashMap<NodeKind, NodeKind>,
        conditional_edges: FxHashMap<NodeKind, EdgePredicate<S>>,
        runtime_config: RuntimeConfig,
    ) -> Self {
        Self {
            nodes,
            edges,
            conditional_edges,
            runtime_config,
        }
    }

    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node<S>>> {
        &self.nodes
    }

    pub fn edges(&self) -> &FxHashMap<NodeKind, NodeKind> {
        &self.edges
    }

    pub fn conditional_edges(&self) -> &FxHashMap<NodeKind, EdgePredicate<S>> {
        &self.conditional_edges
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    /// The first node to execute: the target of the edge out of `Start`,
    /// or the conditional route out of `Start` evaluated against `snapshot`.
    pub(crate) fn entry_for(&self, snapshot: &crate::state::StateSnapshot<S>) -> Option<NodeKind> {
        if let Some(predicate) = self.conditional_edges.get(&NodeKind::Start) {
            return Some(predicate(snapshot));
        }
        self.edges.get(&NodeKind::Start).cloned()
    }

    /// The route out of `from` after it has run: conditional if registered,
    /// otherwise the unconditional edge.
    pub(crate) fn route_from(
        &self,
        from: &NodeKind,
        snapshot: &crate::state::StateSnapshot<S>,
    ) -> Option<NodeKind> {
        if let Some(predicate) = self.conditional_edges.get(from) {
            return Some(predicate(snapshot));
        }
        self.edges.get(from).cloned()
    }
}
