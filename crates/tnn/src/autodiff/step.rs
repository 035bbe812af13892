//! Gradient-descent update and gradient reset walks.

use super::graph::{ContextId, Graph, Node, NodeId};
use crate::config::{StepConfig, Traversal};
use crate::error::AutogradError;
use log::{debug, trace};
use std::collections::HashSet;

impl Graph {
    /// Apply one gradient-descent step from `ctx`: every operand node of every
    /// visited context gets `data -= learning_rate * grad`.
    ///
    /// With [`Traversal::EveryPath`] nothing is remembered between visits, so
    /// a node is stepped each time it is reached. A leaf consumed by a binary
    /// operation is stepped once by that operation and once more by its own
    /// Accumulate context. [`Traversal::Once`] steps every reachable node
    /// exactly once. Both walks keep their own work stack, so deep graphs do
    /// not grow the call stack.
    pub fn update(&mut self, ctx: ContextId, config: &StepConfig) -> Result<(), AutogradError> {
        debug!(
            "update from context {} (learning_rate={}, traversal={})",
            ctx.index(),
            config.learning_rate,
            config.traversal
        );
        let lr = config.learning_rate;
        self.walk(ctx, config.traversal, &mut |node: &mut Node| {
            node.data -= lr * node.grad;
        })
    }

    /// Reset the gradient of every node reachable from `ctx` to zero.
    pub fn zero_grad(&mut self, ctx: ContextId, traversal: Traversal) -> Result<(), AutogradError> {
        debug!("zero_grad from context {} (traversal={traversal})", ctx.index());
        self.walk(ctx, traversal, &mut |node: &mut Node| node.grad = 0.0)
    }

    fn walk<F>(
        &mut self,
        root: ContextId,
        traversal: Traversal,
        visit: &mut F,
    ) -> Result<(), AutogradError>
    where
        F: FnMut(&mut Node),
    {
        let mut seen = match traversal {
            Traversal::EveryPath => None,
            Traversal::Once => Some(Seen::default()),
        };
        let mut stack = vec![root];
        while let Some(ctx) = stack.pop() {
            if let Some(seen) = seen.as_mut() {
                if !seen.contexts.insert(ctx) {
                    continue;
                }
            }
            let context = *self.context(ctx)?;
            trace!("visit context {}", ctx.index());
            for id in context.operands() {
                let first_visit = seen.as_mut().is_none_or(|seen| seen.nodes.insert(id));
                if first_visit {
                    visit(self.node_mut(id)?);
                }
            }
            // reversed so predecessors are walked in operand order
            stack.extend(context.next().into_iter().rev());
        }
        Ok(())
    }
}

#[derive(Default)]
struct Seen {
    contexts: HashSet<ContextId>,
    nodes: HashSet<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn node(g: &Graph, id: NodeId) -> &Node {
        g.node(id).unwrap()
    }

    #[test]
    fn test_zero_grad_resets_leaves() {
        let mut g = Graph::new();
        let a = g.leaf(3.0, true);
        let b = g.leaf(5.0, true);
        let c = g.mul(a, b).unwrap();
        let ctx = node(&g, c).context();
        g.backward(ctx, 1.0).unwrap();
        g.backward(ctx, 1.0).unwrap();
        assert_eq!(node(&g, a).grad(), 10.0);

        g.zero_grad(ctx, Traversal::EveryPath).unwrap();
        assert_eq!(node(&g, a).grad(), 0.0);
        assert_eq!(node(&g, b).grad(), 0.0);
        // values untouched
        assert_eq!(node(&g, a).data(), 3.0);
    }

    #[test]
    fn test_zero_grad_once_matches_every_path() {
        let mut g = Graph::new();
        let a = g.leaf(2.0, true);
        let sq = g.mul(a, a).unwrap();
        let c = g.add(sq, a).unwrap();
        let ctx = node(&g, c).context();
        g.backward(ctx, 1.0).unwrap();
        assert_eq!(node(&g, a).grad(), 5.0);
        g.zero_grad(ctx, Traversal::Once).unwrap();
        assert_eq!(node(&g, a).grad(), 0.0);
    }

    #[test]
    fn test_update_once_steps_each_leaf_by_grad() {
        let mut g = Graph::new();
        let a = g.leaf(3.0, true);
        let b = g.leaf(5.0, true);
        let c = g.mul(a, b).unwrap();
        let ctx = node(&g, c).context();
        g.backward(ctx, 1.0).unwrap();

        let cfg = StepConfig::default().traversal(Traversal::Once);
        g.update(ctx, &cfg).unwrap();
        assert_eq!(node(&g, a).data(), 3.0 - 5.0);
        assert_eq!(node(&g, b).data(), 5.0 - 3.0);
        // derived node has zero grad, so it keeps its value
        assert_eq!(node(&g, c).data(), 15.0);
    }

    #[test]
    fn test_update_once_diamond_steps_once() {
        let mut g = Graph::new();
        let a = g.leaf(3.0, true);
        let c = g.mul(a, a).unwrap();
        let ctx = node(&g, c).context();
        g.backward(ctx, 1.0).unwrap();
        assert_eq!(node(&g, a).grad(), 6.0);

        let cfg = StepConfig::default().traversal(Traversal::Once);
        g.update(ctx, &cfg).unwrap();
        assert_eq!(node(&g, a).data(), -3.0);
    }

    #[test]
    fn test_update_every_path_steps_leaf_per_visit() {
        // c = a * b: a is an operand of the Mul context and of its own
        // Accumulate context, so it is stepped twice.
        let mut g = Graph::new();
        let a = g.leaf(3.0, true);
        let b = g.leaf(5.0, false);
        let c = g.mul(a, b).unwrap();
        let ctx = node(&g, c).context();
        g.backward(ctx, 1.0).unwrap();
        assert_eq!(node(&g, a).grad(), 5.0);

        g.update(ctx, &StepConfig::default()).unwrap();
        assert_eq!(node(&g, a).data(), 3.0 - 2.0 * 5.0);
        // constant leaf has no gradient and does not move
        assert_eq!(node(&g, b).data(), 5.0);
    }

    #[test]
    fn test_update_every_path_diamond() {
        // c = a * a: the Mul context lists a twice and both predecessors are
        // a's Accumulate context, so a is stepped four times.
        let mut g = Graph::new();
        let a = g.leaf(3.0, true);
        let c = g.mul(a, a).unwrap();
        let ctx = node(&g, c).context();
        g.backward(ctx, 1.0).unwrap();
        assert_eq!(node(&g, a).grad(), 6.0);

        g.update(ctx, &StepConfig::default()).unwrap();
        assert_eq!(node(&g, a).data(), 3.0 - 4.0 * 6.0);
    }

    #[test]
    fn test_update_every_path_shared_subexpression() {
        // s = a + b is used by two contexts reachable from the root:
        // d = s * s, then e = d + s.
        let mut g = Graph::new();
        let a = g.leaf(1.0, true);
        let b = g.leaf(2.0, true);
        let s = g.add(a, b).unwrap();
        let d = g.mul(s, s).unwrap();
        let e = g.add(d, s).unwrap();
        let ctx = node(&g, e).context();
        g.backward(ctx, 1.0).unwrap();
        // de/da = 2s + 1 = 7
        assert_eq!(node(&g, a).grad(), 7.0);

        // Visits of a: Add(a, b) is reached three times (twice under d, once
        // directly), each stepping a once through its operands and once
        // through a's Accumulate context.
        g.update(ctx, &StepConfig::default()).unwrap();
        assert_eq!(node(&g, a).data(), 1.0 - 6.0 * 7.0);

        let mut once = Graph::new();
        let a = once.leaf(1.0, true);
        let b = once.leaf(2.0, true);
        let s = once.add(a, b).unwrap();
        let d = once.mul(s, s).unwrap();
        let e = once.add(d, s).unwrap();
        let ctx = node(&once, e).context();
        once.backward(ctx, 1.0).unwrap();
        let cfg = StepConfig::default().traversal(Traversal::Once);
        once.update(ctx, &cfg).unwrap();
        assert_eq!(node(&once, a).data(), 1.0 - 7.0);
    }

    #[test]
    fn test_update_learning_rate() {
        let mut g = Graph::new();
        let a = g.leaf(3.0, true);
        let c = g.mul(a, 2.0).unwrap();
        let ctx = node(&g, c).context();
        g.backward(ctx, 1.0).unwrap();

        let cfg = StepConfig::with_learning_rate(0.1).traversal(Traversal::Once);
        g.update(ctx, &cfg).unwrap();
        assert_relative_eq!(node(&g, a).data(), 2.8, epsilon = 1e-12);
    }

    #[test]
    fn test_update_stale_context() {
        let mut g = Graph::new();
        let a = g.leaf(3.0, true);
        let ctx = node(&g, a).context();
        g.clear();
        assert!(g.update(ctx, &StepConfig::default()).is_err());
        assert!(g.zero_grad(ctx, Traversal::Once).is_err());
    }

    fn add_chain(g: &mut Graph, depth: usize) -> (NodeId, NodeId) {
        let start = g.leaf(1.0, true);
        let mut x = start;
        for _ in 0..depth {
            x = g.add(x, 1.0).unwrap();
        }
        (start, x)
    }

    #[test]
    fn test_update_deep_chain() {
        const DEPTH: usize = 100_000;

        let mut g = Graph::new();
        let (start, end) = add_chain(&mut g, DEPTH);
        let ctx = node(&g, end).context();
        g.backward(ctx, 1.0).unwrap();
        assert_eq!(node(&g, start).grad(), 1.0);

        // operand of the first Add and of its own Accumulate context
        g.update(ctx, &StepConfig::default()).unwrap();
        assert_eq!(node(&g, start).data(), -1.0);

        g.zero_grad(ctx, Traversal::EveryPath).unwrap();
        assert_eq!(node(&g, start).grad(), 0.0);

        let mut g = Graph::new();
        let (start, end) = add_chain(&mut g, DEPTH);
        let ctx = node(&g, end).context();
        g.backward(ctx, 1.0).unwrap();
        let cfg = StepConfig::default().traversal(Traversal::Once);
        g.update(ctx, &cfg).unwrap();
        assert_eq!(node(&g, start).data(), 0.0);

        g.zero_grad(ctx, Traversal::Once).unwrap();
        assert_eq!(node(&g, start).grad(), 0.0);
    }
}
