//! Reverse-mode automatic differentiation over scalar values.
//!
//! Applying an operator pushes an operation context into the graph arena and
//! runs its forward step, which produces a derived node and wires the context
//! to the contexts of its operands. Backward starts from any context and
//! recursively hands gradient contributions down to the Accumulate contexts
//! of the leaves.
//!
//! # Architecture
//!
//! ```text
//! Tensor ──handle──►  Graph (thread_local)
//!                        │
//!             ┌──────────┴──────────┐
//!             ▼                     ▼
//!        Vec<Node>  ◄──NodeId──  Vec<Context>
//!             │                     │
//!             └──────ContextId──────┘
//!
//! Context = Accumulate(leaf) | Op(Add | Sub | Mul | Pow, lhs, rhs, next)
//! ```
//!
//! # Example
//!
//! ```
//! use tnn::autodiff::{Tensor, clear_graph};
//!
//! clear_graph();
//!
//! let a = Tensor::leaf(3.0);
//! let b = Tensor::leaf(5.0);
//! let c = (a * b).unwrap();
//! let ctx = c.grad_ctx().unwrap();
//!
//! ctx.backward(1.0).unwrap();
//! assert_eq!(a.grad().unwrap(), 5.0);
//! assert_eq!(b.grad().unwrap(), 3.0);
//!
//! ctx.zero_grad().unwrap();
//! assert_eq!(a.grad().unwrap(), 0.0);
//! ```
//!
//! # Design Notes
//!
//! - Nodes and contexts live in one arena and refer to each other by
//!   generation-checked handles; a leaf and its Accumulate context point at
//!   each other without any shared ownership.
//! - Gradients accumulate (`+=`) at leaves, so a leaf reached along several
//!   paths gets the sum of its contributions.
//! - `update` and `zero_grad` default to a walk that does not remember
//!   visited nodes; see [`Traversal`](crate::Traversal).
//! - Every traversal keeps an explicit work stack, so graph depth is limited
//!   by memory and not by the thread's stack.

mod backward;
mod context;
mod graph;
mod operand;
mod step;
mod tensor;

pub use context::{Binary, BinaryOp, Context, ContextKind};
pub use graph::{ContextId, Graph, Node, NodeId, clear_graph, with_graph};
pub use operand::Operand;
pub use tensor::{GradContext, Tensor};

/// Raise to a power with gradient tracking (e.g. `a.pow(2)`).
pub trait Pow<Rhs> {
    /// Result of the power operation.
    type Output;

    /// Returns `self ** exp`.
    #[must_use]
    fn pow(self, exp: Rhs) -> Self::Output;
}
