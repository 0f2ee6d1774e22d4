//! Fact Graph - lazily evaluated, memoized computations over the context.
//!
//! A graph maps node ids to computations. Evaluation resolves the wanted
//! nodes and everything they depend on:
//! 1. **Memo**: A node already computed in this run is returned as-is
//! 2. **Guard**: A node met again while still being resolved is a cycle
//! 3. **Dependencies**: Declared dependencies are resolved first
//! 4. **Compute**: The node's function runs with its inputs and an ad hoc accessor
//! 5. **Trace**: One audit record and its deduplicated edges per computed node
//!
//! Resolution never recurses. Declared dependencies are pushed on an explicit
//! stack; an ad hoc lookup of a node that is not computed yet suspends the
//! computation, pushes that node, and reruns the computation once it is ready.
//! Computations are pure, so only the completed run is observable in the
//! results and trace.
//!
//! All evaluation state lives for a single [`evaluate_graph`] call.

mod trace;

pub use trace::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::Context;
use crate::error::{GraphError, GraphResult};
use crate::value::{FactPath, Value};

/// Identifier of a graph node. Ids double as fact paths once results are published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fact path this node's result is published under.
    pub fn as_path(&self) -> FactPath {
        FactPath::new(self.0.clone())
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node's computation. Must be pure: same context and inputs, same output.
pub type ComputeFn =
    Arc<dyn Fn(&Context, &mut NodeInputs<'_, '_>) -> GraphResult<Value> + Send + Sync>;

/// A named computation in the fact graph.
#[derive(Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub deps: Vec<NodeId>,
    /// Human-readable formula, copied into the trace.
    pub formula: String,
    /// Explanation of what the node means, copied into the trace.
    pub explain: String,
    compute: ComputeFn,
}

impl GraphNode {
    /// Create a node with no dependencies.
    pub fn new<F>(id: impl Into<NodeId>, compute: F) -> Self
    where
        F: Fn(&Context, &mut NodeInputs<'_, '_>) -> GraphResult<Value> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            deps: Vec::new(),
            formula: String::new(),
            explain: String::new(),
            compute: Arc::new(compute),
        }
    }

    /// A node that reads a seeded fact from the context.
    pub fn from_context(id: impl Into<NodeId>, path: impl Into<FactPath>) -> Self {
        let path = path.into();
        let formula = format!("ctx.{}", path);
        Self::new(id, move |ctx, _| Ok(ctx.get(&path))).with_formula(formula)
    }

    /// Set the declared dependencies.
    pub fn with_deps<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the formula text.
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = formula.into();
        self
    }

    /// Set the explanation text.
    pub fn with_explain(mut self, explain: impl Into<String>) -> Self {
        self.explain = explain.into();
        self
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("deps", &self.deps)
            .field("formula", &self.formula)
            .field("explain", &self.explain)
            .finish_non_exhaustive()
    }
}

/// A collection of graph nodes keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, GraphNode>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any node with the same id.
    pub fn insert(&mut self, node: GraphNode) -> Option<GraphNode> {
        self.nodes.insert(node.id.clone(), node)
    }

    /// Builder-style [`Graph::insert`].
    pub fn with_node(mut self, node: GraphNode) -> Self {
        self.insert(node);
        self
    }

    pub fn get(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Evaluate the wanted nodes. See [`evaluate_graph`].
    pub fn evaluate<I, T>(&self, ctx: &Context, wanted: I) -> GraphResult<Evaluation>
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        evaluate_graph(self, ctx, wanted)
    }
}

/// Result of one graph evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Every node computed during the run, not only the wanted ones.
    pub results: BTreeMap<NodeId, Value>,
    pub trace: Trace,
}

impl Evaluation {
    pub fn get(&self, id: &NodeId) -> Value {
        self.results.get(id).cloned().unwrap_or_default()
    }

    /// Publish every result into a context at the path named by its node id.
    pub fn write_into(&self, ctx: &mut Context) {
        for (id, value) in &self.results {
            ctx.set(&id.as_path(), value.clone());
        }
    }
}

/// Evaluate the wanted nodes of a graph against a read-only context.
///
/// Each node is computed at most once per call. Unknown ids fail with
/// [`GraphError::UnknownNode`]; a node reached again while it is still being
/// resolved fails with [`GraphError::CycleDetected`].
#[instrument(level = "debug", skip_all, fields(nodes = graph.len()))]
pub fn evaluate_graph<I, T>(graph: &Graph, ctx: &Context, wanted: I) -> GraphResult<Evaluation>
where
    I: IntoIterator<Item = T>,
    T: Into<NodeId>,
{
    let mut run = Run::new(graph, ctx);
    for id in wanted {
        let id = id.into();
        run.resolve(&id)?;
    }

    debug!(
        computed = run.memo.len(),
        edges = run.trace.edges.len(),
        "graph evaluation complete"
    );

    Ok(Evaluation {
        results: run.memo.into_iter().collect(),
        trace: run.trace,
    })
}

/// Inputs handed to a node's computation.
pub struct NodeInputs<'r, 'g> {
    run: &'r mut Run<'g>,
    node: &'g NodeId,
    values: BTreeMap<NodeId, Value>,
    /// Undeclared nodes read successfully, in lookup order.
    ad_hoc: Vec<NodeId>,
}

impl NodeInputs<'_, '_> {
    /// Value of a node: a declared dependency, or any other node resolved on demand.
    ///
    /// On-demand lookups are recorded as inputs and edges like declared ones.
    /// Looking up a node that is not computed yet suspends this computation;
    /// it is run again from the start once that node is resolved.
    pub fn get(&mut self, id: impl Into<NodeId>) -> GraphResult<Value> {
        let id = id.into();
        if let Some(value) = self.values.get(&id) {
            return Ok(value.clone());
        }

        let value = self.run.lookup(&id)?;
        self.ad_hoc.push(id.clone());
        self.values.insert(id, value.clone());
        Ok(value)
    }

    /// Like [`NodeInputs::get`], requiring a number.
    pub fn number(&mut self, id: impl Into<NodeId>) -> GraphResult<f64> {
        let id = id.into();
        let value = self.get(id.clone())?;
        value.as_number().ok_or_else(|| {
            GraphError::compute(
                self.node.clone(),
                format!("input '{}' is {}, expected a number", id, value.type_name()),
            )
        })
    }
}

/// One frame of the explicit resolution stack.
struct Frame<'g> {
    node: &'g GraphNode,
    next_dep: usize,
    /// Node an on-demand lookup of this frame is waiting for.
    awaiting: Option<NodeId>,
}

impl<'g> Frame<'g> {
    fn new(node: &'g GraphNode) -> Self {
        Self {
            node,
            next_dep: 0,
            awaiting: None,
        }
    }
}

/// Outcome of running one node's computation.
enum Step {
    Done,
    Waiting(NodeId),
}

/// Per-call evaluation state.
struct Run<'g> {
    graph: &'g Graph,
    ctx: &'g Context,
    memo: HashMap<NodeId, Value>,
    /// Nodes whose on-demand resolution failed, with the error their callers see.
    failed: HashMap<NodeId, GraphError>,
    in_progress: HashSet<NodeId>,
    seen_edges: HashSet<(NodeId, NodeId)>,
    /// First unresolved node looked up by the running computation.
    deferred: Option<NodeId>,
    trace: Trace,
}

impl<'g> Run<'g> {
    fn new(graph: &'g Graph, ctx: &'g Context) -> Self {
        Self {
            graph,
            ctx,
            memo: HashMap::new(),
            failed: HashMap::new(),
            in_progress: HashSet::new(),
            seen_edges: HashSet::new(),
            deferred: None,
            trace: Trace::default(),
        }
    }

    fn node(&self, id: &NodeId) -> GraphResult<&'g GraphNode> {
        self.graph
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))
    }

    fn record_edge(&mut self, from: &NodeId, to: &NodeId) {
        if self.seen_edges.insert((from.clone(), to.clone())) {
            self.trace.edges.push(TraceEdge {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }

    /// Resolve a node with an explicit stack so deep chains never recurse.
    fn resolve(&mut self, id: &NodeId) -> GraphResult<Value> {
        if let Some(value) = self.memo.get(id) {
            tracing::trace!(node = %id, "memo hit");
            return Ok(value.clone());
        }

        if let Some(root) = self.enter(id)? {
            let mut stack = vec![root];
            self.drive(&mut stack)?;
        }

        self.memo
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::compute(id.clone(), "node produced no result"))
    }

    /// A frame for a node that still has to be computed, or `None` if it is memoized.
    fn enter(&mut self, id: &NodeId) -> GraphResult<Option<Frame<'g>>> {
        if self.memo.contains_key(id) {
            return Ok(None);
        }
        if let Some(err) = self.failed.get(id) {
            return Err(err.clone());
        }
        if self.in_progress.contains(id) {
            return Err(GraphError::CycleDetected(id.clone()));
        }
        let node = self.node(id)?;
        self.in_progress.insert(id.clone());
        Ok(Some(Frame::new(node)))
    }

    /// On-demand lookup from inside a computation. Never descends: an
    /// unresolved node is handed back to [`Run::drive`] through `deferred`.
    fn lookup(&mut self, id: &NodeId) -> GraphResult<Value> {
        if let Some(value) = self.memo.get(id) {
            return Ok(value.clone());
        }
        if let Some(err) = self.failed.get(id) {
            return Err(err.clone());
        }
        if self.in_progress.contains(id) {
            return Err(GraphError::CycleDetected(id.clone()));
        }
        self.node(id)?;

        self.deferred.get_or_insert_with(|| id.clone());
        Err(GraphError::Deferred(id.clone()))
    }

    fn drive(&mut self, stack: &mut Vec<Frame<'g>>) -> GraphResult<()> {
        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            let next = match node.deps.get(frame.next_dep) {
                Some(dep) => {
                    frame.next_dep += 1;
                    self.enter(dep)
                }
                None => {
                    frame.awaiting = None;
                    match self.compute(node) {
                        Ok(Step::Done) => {
                            self.in_progress.remove(&node.id);
                            stack.pop();
                            continue;
                        }
                        Ok(Step::Waiting(target)) => {
                            frame.awaiting = Some(target.clone());
                            self.enter(&target)
                        }
                        Err(err) => Err(err),
                    }
                }
            };

            match next {
                Ok(Some(frame)) => stack.push(frame),
                Ok(None) => {}
                Err(err) => self.unwind(stack, err)?,
            }
        }
        Ok(())
    }

    /// Pop failed frames until one that was waiting on the failed node.
    ///
    /// That frame runs again and its lookup returns the error. With no such
    /// frame the error ends the resolution. No markers are left behind either way.
    fn unwind(&mut self, stack: &mut Vec<Frame<'g>>, err: GraphError) -> GraphResult<()> {
        while let Some(frame) = stack.pop() {
            self.in_progress.remove(&frame.node.id);
            let waiter = stack
                .last()
                .is_some_and(|w| w.awaiting.as_ref() == Some(&frame.node.id));
            if waiter {
                debug!(node = %frame.node.id, error = %err, "on-demand lookup failed");
                self.failed.insert(frame.node.id.clone(), err);
                return Ok(());
            }
        }
        Err(err)
    }

    fn compute(&mut self, node: &'g GraphNode) -> GraphResult<Step> {
        let ctx = self.ctx;
        let values = node
            .deps
            .iter()
            .map(|dep| (dep.clone(), self.memo.get(dep).cloned().unwrap_or_default()))
            .collect();

        self.deferred = None;
        let mut inputs = NodeInputs {
            run: &mut *self,
            node: &node.id,
            values,
            ad_hoc: Vec::new(),
        };
        let outcome = (node.compute)(ctx, &mut inputs);
        let NodeInputs {
            values: input,
            ad_hoc,
            ..
        } = inputs;

        // Whatever the computation returned, a suspended run is discarded.
        if let Some(target) = self.deferred.take() {
            tracing::trace!(node = %node.id, waiting_on = %target, "suspended");
            return Ok(Step::Waiting(target));
        }
        let output = outcome?;

        for dep in node.deps.iter().chain(&ad_hoc) {
            self.record_edge(dep, &node.id);
        }

        debug!(node = %node.id, output = %output, "computed node");
        self.memo.insert(node.id.clone(), output.clone());
        self.trace.nodes.push(TraceNode {
            id: node.id.clone(),
            deps: node.deps.clone(),
            formula: node.formula.clone(),
            explain: node.explain.clone(),
            input,
            output,
        });
        Ok(Step::Done)
    }
}
