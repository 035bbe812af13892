//! Right-hand sides accepted by the operators.

use super::graph::NodeId;

/// Either a raw number or an existing node.
///
/// Numbers, infinities included, are promoted to constant leaves by
/// [`Graph::coerce`](super::Graph::coerce). NaN is rejected there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Number(f64),
    Node(NodeId),
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<NodeId> for Operand {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}
