//! Arena holding the nodes and contexts of one computation graph.

use super::context::{BinaryOp, Context};
use super::operand::Operand;
use crate::error::AutogradError;
use log::trace;
use std::cell::RefCell;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

fn next_generation() -> u32 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a node in a [`Graph`].
///
/// Carries the generation of the graph it was allocated in, so handles from
/// another graph or from before a [`Graph::clear`] are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation of the graph this handle was allocated in.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Handle to a context in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId {
    index: usize,
    generation: u32,
}

impl ContextId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation of the graph this handle was allocated in.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A differentiable scalar in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) data: f64,
    pub(crate) grad: f64,
    is_leaf: bool,
    requires_grad: bool,
    context: ContextId,
}

impl Node {
    /// Forward value.
    pub fn data(&self) -> f64 {
        self.data
    }

    /// Accumulated gradient.
    pub fn grad(&self) -> f64 {
        self.grad
    }

    /// True for nodes created directly rather than produced by an operation.
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Check if this node takes part in gradient propagation.
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// The context that produced this node (its Accumulate context for leaves).
    pub fn context(&self) -> ContextId {
        self.context
    }
}

/// Arena owning every node and context of one logical graph.
///
/// Nodes and contexts refer to each other by handle; the arena owns
/// everything and nothing is freed until [`Graph::clear`] or drop.
pub struct Graph {
    nodes: Vec<Node>,
    contexts: Vec<Context>,
    generation: u32,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            contexts: Vec::new(),
            generation: next_generation(),
        }
    }

    /// Current generation; stamped into every handle allocated from now on.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of contexts.
    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Drop every node and context. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.contexts.clear();
        self.generation = next_generation();
    }

    /// Get node by handle.
    pub fn node(&self, id: NodeId) -> Result<&Node, AutogradError> {
        if id.generation != self.generation {
            return Err(stale_node(id));
        }
        self.nodes.get(id.index).ok_or_else(|| stale_node(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, AutogradError> {
        if id.generation != self.generation {
            return Err(stale_node(id));
        }
        self.nodes.get_mut(id.index).ok_or_else(|| stale_node(id))
    }

    /// Get context by handle.
    pub fn context(&self, id: ContextId) -> Result<&Context, AutogradError> {
        if id.generation != self.generation {
            return Err(stale_context(id));
        }
        self.contexts.get(id.index).ok_or_else(|| stale_context(id))
    }

    /// Create a leaf node together with its Accumulate context.
    pub fn leaf(&mut self, data: f64, requires_grad: bool) -> NodeId {
        let node = NodeId {
            index: self.nodes.len(),
            generation: self.generation,
        };
        let context = self.push_context(Context::Accumulate(node));
        self.nodes.push(Node {
            data,
            grad: 0.0,
            is_leaf: true,
            requires_grad,
            context,
        });
        trace!("leaf node {} = {data} (requires_grad={requires_grad})", node.index);
        node
    }

    /// Create a leaf holding the same value as `id` that does not require
    /// gradient. Nothing flows back through it.
    pub fn detach(&mut self, id: NodeId) -> Result<NodeId, AutogradError> {
        let data = self.node(id)?.data;
        Ok(self.leaf(data, false))
    }

    /// Turn an operand into a node handle.
    ///
    /// Numbers become fresh leaves that do not require gradient; node handles
    /// are checked against this graph.
    ///
    /// # Errors
    /// `TypeMismatch` for a NaN number, `StaleNode` for a handle
    /// that does not belong to this graph.
    pub fn coerce(&mut self, operand: Operand) -> Result<NodeId, AutogradError> {
        match operand {
            Operand::Number(value) if value.is_nan() => Err(AutogradError::TypeMismatch {
                reason: "operand is NaN".to_string(),
            }),
            Operand::Number(value) => Ok(self.leaf(value, false)),
            Operand::Node(id) => self.node(id).map(|_| id),
        }
    }

    /// Apply a binary operation: build its context over the coerced operands
    /// and run forward once.
    pub fn apply(
        &mut self,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<NodeId, AutogradError> {
        let lhs = self.coerce(lhs.into())?;
        let rhs = self.coerce(rhs.into())?;
        let ctx = self.push_context(Context::binary(op, lhs, rhs));
        self.forward(ctx)
    }

    /// `lhs + rhs`
    pub fn add(
        &mut self,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<NodeId, AutogradError> {
        self.apply(BinaryOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`
    pub fn sub(
        &mut self,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<NodeId, AutogradError> {
        self.apply(BinaryOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`
    pub fn mul(
        &mut self,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<NodeId, AutogradError> {
        self.apply(BinaryOp::Mul, lhs, rhs)
    }

    /// `base ** exponent`
    pub fn pow(
        &mut self,
        base: impl Into<Operand>,
        exponent: impl Into<Operand>,
    ) -> Result<NodeId, AutogradError> {
        self.apply(BinaryOp::Pow, base, exponent)
    }

    /// `lhs / rhs`, built as `lhs * rhs ** -1`.
    ///
    /// # Errors
    /// A zero divisor fails with a domain error at the `rhs ** -1` step.
    pub fn div(
        &mut self,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<NodeId, AutogradError> {
        let lhs = self.coerce(lhs.into())?;
        let rhs = self.coerce(rhs.into())?;
        let reciprocal = self.apply(BinaryOp::Pow, rhs, -1.0)?;
        self.apply(BinaryOp::Mul, lhs, reciprocal)
    }

    /// Run a context's forward step.
    ///
    /// An Accumulate context returns its own leaf. A binary context computes
    /// its value, wires its predecessors to the operands' contexts and returns
    /// a new derived node. Operators call this exactly once per context;
    /// calling it again on a binary context yields another derived node.
    pub fn forward(&mut self, ctx: ContextId) -> Result<NodeId, AutogradError> {
        let (op, binary) = match *self.context(ctx)? {
            Context::Accumulate(node) => return self.node(node).map(|_| node),
            Context::Op(op, binary) => (op, binary),
        };
        let lhs = self.node(binary.lhs)?;
        let rhs = self.node(binary.rhs)?;
        let data = op.evaluate(lhs.data, rhs.data)?;
        let next = [lhs.context, rhs.context];

        self.contexts[ctx.index].wire(next);
        let out = NodeId {
            index: self.nodes.len(),
            generation: self.generation,
        };
        self.nodes.push(Node {
            data,
            grad: 0.0,
            is_leaf: false,
            requires_grad: true,
            context: ctx,
        });
        trace!("{op} context {} -> node {} = {data}", ctx.index, out.index);
        Ok(out)
    }

    fn push_context(&mut self, context: Context) -> ContextId {
        let id = ContextId {
            index: self.contexts.len(),
            generation: self.generation,
        };
        self.contexts.push(context);
        id
    }

    /// Push a binary context without running forward.
    #[cfg(test)]
    pub(crate) fn push_unwired_for_test(&mut self, lhs: NodeId, rhs: NodeId) -> ContextId {
        self.push_context(Context::binary(BinaryOp::Add, lhs, rhs))
    }
}

fn stale_node(id: NodeId) -> AutogradError {
    AutogradError::StaleNode {
        index: id.index,
        generation: id.generation,
    }
}

fn stale_context(id: ContextId) -> AutogradError {
    AutogradError::StaleContext {
        index: id.index,
        generation: id.generation,
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("num_nodes", &self.nodes.len())
            .field("num_contexts", &self.contexts.len())
            .field("generation", &self.generation)
            .finish()
    }
}

// Thread-local default graph backing the Tensor API
thread_local! {
    static GRAPH: RefCell<Graph> = RefCell::new(Graph::new());
}

/// Access the thread-local graph.
///
/// # Panics
/// If called re-entrantly from inside another `with_graph` closure.
///
/// # Example
///
/// ```
/// use tnn::autodiff::with_graph;
///
/// let sum = with_graph(|g| {
///     let a = g.leaf(3.0, true);
///     g.add(a, 5.0)
/// })
/// .unwrap();
/// assert_eq!(with_graph(|g| g.node(sum).map(|n| n.data())), Ok(8.0));
/// ```
pub fn with_graph<R>(f: impl FnOnce(&mut Graph) -> R) -> R {
    GRAPH.with(|g| f(&mut g.borrow_mut()))
}

/// Like [`with_graph`] with shared access; `None` if the graph is already
/// borrowed mutably on this thread.
pub(crate) fn try_peek_graph<R>(f: impl FnOnce(&Graph) -> R) -> Option<R> {
    GRAPH.with(|g| g.try_borrow().ok().map(|g| f(&g)))
}

/// Clear the thread-local graph. Every existing [`Tensor`](super::Tensor) becomes stale.
pub fn clear_graph() {
    with_graph(Graph::clear);
}
