//! Tensor - scalar handle into the thread-local computation graph.

use super::Pow;
use super::context::ContextKind;
use super::graph::{ContextId, Node, NodeId, try_peek_graph, with_graph};
use super::operand::Operand;
use crate::config::{StepConfig, Traversal};
use crate::error::AutogradError;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// A differentiable scalar living in the thread-local graph.
///
/// This is the main user-facing type. It is a copyable handle; the value,
/// gradient and graph wiring live in the graph. Handles go stale after
/// [`clear_graph`](super::clear_graph).
///
/// # Example
///
/// ```
/// use tnn::autodiff::{Pow, Tensor};
///
/// let a = Tensor::leaf(5.0);
/// let b = Tensor::new(2.0);
/// let loss = (a - b).unwrap().pow(2).unwrap();
/// loss.grad_ctx().unwrap().backward(1.0).unwrap();
/// assert_eq!(a.grad().unwrap(), 6.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tensor {
    id: NodeId,
}

impl Tensor {
    /// Create a leaf that does not require gradient.
    pub fn new(data: f64) -> Self {
        Self::with_requires_grad(data, false)
    }

    /// Create a leaf that requires gradient.
    pub fn leaf(data: f64) -> Self {
        Self::with_requires_grad(data, true)
    }

    /// Create a leaf with an explicit requires_grad flag.
    pub fn with_requires_grad(data: f64, requires_grad: bool) -> Self {
        Self {
            id: with_graph(|g| g.leaf(data, requires_grad)),
        }
    }

    /// Wrap a node handle of the thread-local graph.
    pub fn from_id(id: NodeId) -> Self {
        Self { id }
    }

    /// Get node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn read<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R, AutogradError> {
        with_graph(|g| g.node(self.id).map(f))
    }

    /// Forward value.
    pub fn data(&self) -> Result<f64, AutogradError> {
        self.read(Node::data)
    }

    /// Accumulated gradient.
    pub fn grad(&self) -> Result<f64, AutogradError> {
        self.read(Node::grad)
    }

    /// Check if this tensor was created directly rather than by an operator.
    pub fn is_leaf(&self) -> Result<bool, AutogradError> {
        self.read(Node::is_leaf)
    }

    /// Check if this tensor requires gradient.
    pub fn requires_grad(&self) -> Result<bool, AutogradError> {
        self.read(Node::requires_grad)
    }

    /// The context that produced this tensor.
    pub fn grad_ctx(&self) -> Result<GradContext, AutogradError> {
        self.read(|n| GradContext { id: n.context() })
    }

    /// Backward from this tensor with an upstream gradient of 1.
    pub fn backward(&self) -> Result<(), AutogradError> {
        self.grad_ctx()?.backward(1.0)
    }

    /// Detach from computation graph.
    ///
    /// Returns a new leaf with the same value that does not require grad.
    pub fn detach(&self) -> Result<Self, AutogradError> {
        with_graph(|g| g.detach(self.id)).map(Self::from_id)
    }

    fn binary(
        self,
        rhs: impl Into<Operand>,
        f: impl FnOnce(&mut super::Graph, NodeId, Operand) -> Result<NodeId, AutogradError>,
    ) -> Result<Self, AutogradError> {
        let rhs = rhs.into();
        with_graph(|g| f(g, self.id, rhs)).map(Self::from_id)
    }
}

impl From<Tensor> for Operand {
    fn from(t: Tensor) -> Self {
        Operand::Node(t.id)
    }
}

impl<R: Into<Operand>> Add<R> for Tensor {
    type Output = Result<Tensor, AutogradError>;

    fn add(self, rhs: R) -> Self::Output {
        self.binary(rhs, |g, lhs, rhs| g.add(lhs, rhs))
    }
}

impl<R: Into<Operand>> Sub<R> for Tensor {
    type Output = Result<Tensor, AutogradError>;

    fn sub(self, rhs: R) -> Self::Output {
        self.binary(rhs, |g, lhs, rhs| g.sub(lhs, rhs))
    }
}

impl<R: Into<Operand>> Mul<R> for Tensor {
    type Output = Result<Tensor, AutogradError>;

    fn mul(self, rhs: R) -> Self::Output {
        self.binary(rhs, |g, lhs, rhs| g.mul(lhs, rhs))
    }
}

impl<R: Into<Operand>> Div<R> for Tensor {
    type Output = Result<Tensor, AutogradError>;

    fn div(self, rhs: R) -> Self::Output {
        self.binary(rhs, |g, lhs, rhs| g.div(lhs, rhs))
    }
}

impl<R: Into<Operand>> Pow<R> for Tensor {
    type Output = Result<Tensor, AutogradError>;

    fn pow(self, exp: R) -> Self::Output {
        self.binary(exp, |g, base, exp| g.pow(base, exp))
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match try_peek_graph(|g| g.node(self.id).map(|n| (n.data(), n.grad()))) {
            Some(Ok((data, grad))) => write!(f, "data: {data}\ngrad: {grad}"),
            Some(Err(e)) => write!(f, "<{e}>"),
            None => f.write_str("<graph busy>"),
        }
    }
}

/// Handle to a context of the thread-local graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GradContext {
    id: ContextId,
}

impl GradContext {
    /// Get context ID.
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn kind(&self) -> Result<ContextKind, AutogradError> {
        with_graph(|g| g.context(self.id).map(|c| c.kind()))
    }

    /// Operand tensors in order.
    pub fn operands(&self) -> Result<Vec<Tensor>, AutogradError> {
        with_graph(|g| {
            g.context(self.id)
                .map(|c| c.operands().into_iter().map(Tensor::from_id).collect())
        })
    }

    /// Predecessor contexts in order.
    pub fn next(&self) -> Result<Vec<GradContext>, AutogradError> {
        with_graph(|g| {
            g.context(self.id)
                .map(|c| c.next().into_iter().map(|id| GradContext { id }).collect())
        })
    }

    /// Run forward. See [`Graph::forward`](super::Graph::forward).
    pub fn forward(&self) -> Result<Tensor, AutogradError> {
        with_graph(|g| g.forward(self.id)).map(Tensor::from_id)
    }

    /// See [`Graph::backward`](super::Graph::backward).
    pub fn backward(&self, grad: f64) -> Result<(), AutogradError> {
        with_graph(|g| g.backward(self.id, grad))
    }

    /// One gradient-descent step with [`StepConfig::default`].
    pub fn update(&self) -> Result<(), AutogradError> {
        self.update_with(&StepConfig::default())
    }

    /// See [`Graph::update`](super::Graph::update).
    pub fn update_with(&self, config: &StepConfig) -> Result<(), AutogradError> {
        with_graph(|g| g.update(self.id, config))
    }

    /// Reset gradients with the default traversal.
    pub fn zero_grad(&self) -> Result<(), AutogradError> {
        self.zero_grad_with(Traversal::default())
    }

    /// See [`Graph::zero_grad`](super::Graph::zero_grad).
    pub fn zero_grad_with(&self, traversal: Traversal) -> Result<(), AutogradError> {
        with_graph(|g| g.zero_grad(self.id, traversal))
    }
}
