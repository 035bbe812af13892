//! Backward pass: recursive gradient propagation through the context graph.

use super::context::{BinaryOp, Context};
use super::graph::{ContextId, Graph, NodeId};
use crate::error::AutogradError;
use log::{debug, trace, warn};

impl Graph {
    /// Propagate `grad` from `ctx` down to every reachable leaf.
    ///
    /// The walk keeps its own work stack, so graph depth is bounded by memory
    /// rather than by the thread's call stack.
    ///
    /// Each binary context multiplies `grad` by its local partial derivative
    /// for every operand that requires gradient and recurses into that
    /// operand's context; operands that do not require gradient are skipped
    /// without evaluating their partial. Accumulate contexts add the incoming
    /// value to their leaf's gradient, so a leaf reached along several paths
    /// receives the sum.
    ///
    /// # Errors
    /// Returns the first error hit. The walk stops there and gradients
    /// already accumulated on earlier branches are left in place.
    ///
    /// # Example
    ///
    /// ```
    /// use tnn::autodiff::Graph;
    ///
    /// let mut g = Graph::new();
    /// let a = g.leaf(3.0, true);
    /// let b = g.leaf(5.0, true);
    /// let c = g.mul(a, b).unwrap();
    /// let ctx = g.node(c).unwrap().context();
    /// g.backward(ctx, 1.0).unwrap();
    /// assert_eq!(g.node(a).unwrap().grad(), 5.0);
    /// assert_eq!(g.node(b).unwrap().grad(), 3.0);
    /// ```
    pub fn backward(&mut self, ctx: ContextId, grad: f64) -> Result<(), AutogradError> {
        debug!("backward from context {} with gradient {grad}", ctx.index());
        self.propagate(ctx, grad)
            .inspect_err(|e| warn!("backward from context {} aborted: {e}", ctx.index()))
    }

    fn propagate(&mut self, root: ContextId, grad: f64) -> Result<(), AutogradError> {
        let mut stack = vec![Pending::Visit(root, grad)];
        while let Some(item) = stack.pop() {
            let (ctx, grad) = match item {
                Pending::Visit(ctx, grad) => (ctx, grad),
                Pending::Rhs {
                    op,
                    x,
                    y,
                    grad,
                    next,
                } => {
                    stack.push(Pending::Visit(next, op.partial_rhs(x, y)? * grad));
                    continue;
                }
            };
            let (op, binary) = match *self.context(ctx)? {
                Context::Accumulate(node) => {
                    self.accumulate(node, grad)?;
                    continue;
                }
                Context::Op(op, binary) => (op, binary),
            };
            let [next_lhs, next_rhs] = binary.next.ok_or(AutogradError::NotForwarded {
                index: ctx.index(),
            })?;
            trace!("{op} context {} receives {grad}", ctx.index());

            let lhs = self.node(binary.lhs)?;
            let rhs = self.node(binary.rhs)?;
            let (x, y) = (lhs.data, rhs.data);
            let (lhs_flows, rhs_flows) = (lhs.requires_grad(), rhs.requires_grad());

            // the rhs partial waits until the whole lhs subtree has been handled
            if rhs_flows {
                stack.push(Pending::Rhs {
                    op,
                    x,
                    y,
                    grad,
                    next: next_rhs,
                });
            }
            if lhs_flows {
                stack.push(Pending::Visit(next_lhs, op.partial_lhs(x, y)? * grad));
            }
        }
        Ok(())
    }

    fn accumulate(&mut self, id: NodeId, grad: f64) -> Result<(), AutogradError> {
        let node = self.node_mut(id)?;
        if node.requires_grad() {
            node.grad += grad;
            trace!("leaf {} grad += {grad} -> {}", id.index(), node.grad);
        }
        Ok(())
    }
}

/// Work item of the backward walk.
enum Pending {
    /// Hand `grad` to a context.
    Visit(ContextId, f64),
    /// Evaluate the rhs partial of a binary context, then visit `next`.
    Rhs {
        op: BinaryOp,
        x: f64,
        y: f64,
        grad: f64,
        next: ContextId,
    },
}
