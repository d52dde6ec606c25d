//! Graph definition and compilation.
//!
//! [`GraphBuilder`] assembles nodes, unconditional edges, and conditional
//! edges, then validates the topology and compiles it into an executable
//! [`App`](crate::app::App). `Start` and `End` are virtual: execution enters
//! through the single edge out of `Start` and completes when routing reaches
//! `End`.
//!
//! The engine is strictly sequential (each node's output feeds the next),
//! so every executable node must have exactly one way forward: either a
//! conditional edge (a pure router over the state snapshot) or a single
//! unconditional edge. When both are present the conditional edge wins.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::app::App;
use crate::node::Node;
use crate::runtime::RuntimeConfig;
use crate::state::{Domain, StateSnapshot};
use crate::types::NodeKind;

/// Routing predicate for conditional edges.
///
/// Must be pure (state in, target out) and total over every state the source
/// node can produce: each reachable status maps to exactly one target node or
/// `NodeKind::End`.
pub type EdgePredicate<S> = Arc<dyn Fn(&StateSnapshot<S>) -> NodeKind + Send + Sync + 'static>;

/// A conditional edge: dynamic routing out of `from` based on current state.
#[derive(Clone)]
pub struct ConditionalEdge<S> {
    from: NodeKind,
    predicate: EdgePredicate<S>,
}

impl<S> ConditionalEdge<S> {
    pub fn new(from: impl Into<NodeKind>, predicate: EdgePredicate<S>) -> Self {
        Self {
            from: from.into(),
            predicate,
        }
    }

    pub fn from(&self) -> &NodeKind {
        &self.from
    }

    pub fn predicate(&self) -> &EdgePredicate<S> {
        &self.predicate
    }
}

/// Errors raised when compiling a graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphCompileError {
    #[error("no edge out of Start; the graph has no entry point")]
    #[diagnostic(
        code(civicflow::graph::no_entry),
        help("Add an edge (or conditional edge) from NodeKind::Start to the first node.")
    )]
    NoEntry,

    #[error("edge target `{target}` (from `{from}`) is not a registered node")]
    #[diagnostic(
        code(civicflow::graph::unknown_target),
        help("Register the node with add_node, or route to NodeKind::End.")
    )]
    UnknownTarget { from: String, target: String },

    #[error("node `{from}` has {count} unconditional edges; the engine is sequential")]
    #[diagnostic(
        code(civicflow::graph::ambiguous_edge),
        help("Keep a single unconditional edge per node, or use a conditional edge.")
    )]
    AmbiguousEdge { from: String, count: usize },

    #[error("node `{node}` has no way forward (no edge and no conditional edge)")]
    #[diagnostic(
        code(civicflow::graph::dead_end),
        help("Every registered node needs an edge to another node or to End.")
    )]
    DeadEnd { node: String },
}

/// Builder for workflow graphs.
///
/// # Example
///
/// ```ignore
/// let app = GraphBuilder::new()
///     .add_node("screen", ScreenNode::new(extractor))
///     .add_node("analyze", AnalyzeNode::new(services))
///     .add_edge(NodeKind::Start, "screen")
///     .add_conditional_edge("screen", Arc::new(route_after_screen))
///     .add_edge("analyze", NodeKind::End)
///     .compile()?;
/// ```
pub struct GraphBuilder<S> {
    nodes: FxHashMap<NodeKind, Arc<dyn Node<S>>>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    conditional_edges: Vec<ConditionalEdge<S>>,
    runtime_config: RuntimeConfig,
}

impl<S: Domain> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Domain> GraphBuilder<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Register an executable node.
    ///
    /// `Start` and `End` are virtual endpoints; attempts to register them are
    /// ignored with a warning.
    #[must_use]
    pub fn add_node(mut self, id: impl Into<NodeKind>, node: impl Node<S> + 'static) -> Self {
        let id = id.into();
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(?id, "ignoring registration of a virtual node kind");
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Add an unconditional edge.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<NodeKind>, to: impl Into<NodeKind>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Add a conditional edge; takes precedence over an unconditional edge
    /// from the same node.
    #[must_use]
    pub fn add_conditional_edge(
        mut self,
        from: impl Into<NodeKind>,
        predicate: EdgePredicate<S>,
    ) -> Self {
        self.conditional_edges
            .push(ConditionalEdge::new(from, predicate));
        self
    }

    /// Configure runtime settings for the compiled application.
    #[must_use]
    pub fn with_runtime_config(mut self, runtime_config: RuntimeConfig) -> Self {
        self.runtime_config = runtime_config;
        self
    }

    /// Validate the topology and produce an executable [`App`].
    pub fn compile(self) -> Result<App<S>, GraphCompileError> {
        let conditional_sources: Vec<NodeKind> = self
            .conditional_edges
            .iter()
            .map(|ce| ce.from().clone())
            .collect();

        // Entry: Start must have a route out.
        let start_has_route = self.edges.contains_key(&NodeKind::Start)
            || conditional_sources.iter().any(|k| k.is_start());
        if !start_has_route {
            return Err(GraphCompileError::NoEntry);
        }

        let mut flat_edges: FxHashMap<NodeKind, NodeKind> = FxHashMap::default();
        for (from, targets) in &self.edges {
            // A conditional edge overrides unconditional fan-out ambiguity checks
            // only in the sense that the conditional route is authoritative.
            if targets.len() > 1 && !conditional_sources.contains(from) {
                return Err(GraphCompileError::AmbiguousEdge {
                    from: from.to_string(),
                    count: targets.len(),
                });
            }
            for target in targets {
                match target {
                    NodeKind::End => {}
                    NodeKind::Start => {
                        return Err(GraphCompileError::UnknownTarget {
                            from: from.to_string(),
                            target: target.to_string(),
                        });
                    }
                    custom => {
                        if !self.nodes.contains_key(custom) {
                            return Err(GraphCompileError::UnknownTarget {
                                from: from.to_string(),
                                target: target.to_string(),
                            });
                        }
                    }
                }
            }
            if let Some(first) = targets.first() {
                flat_edges.insert(from.clone(), first.clone());
            }
        }

        // Every registered node needs a way forward.
        for node in self.nodes.keys() {
            let routed = flat_edges.contains_key(node) || conditional_sources.contains(node);
            if !routed {
                return Err(GraphCompileError::DeadEnd {
                    node: node.to_string(),
                });
            }
        }

        let mut conditional: FxHashMap<NodeKind, EdgePredicate<S>> = FxHashMap::default();
        for ce in self.conditional_edges {
            conditional.insert(ce.from.clone(), ce.predicate);
        }

        Ok(App::from_parts(
            self.nodes,
            flat_edges,
            conditional,
            self.runtime_config,
        ))
    }
}
