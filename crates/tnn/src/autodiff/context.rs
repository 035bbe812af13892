//! Operation contexts: the graph nodes that record how a value was produced.

use super::graph::{ContextId, NodeId};
use crate::error::AutogradError;
use smallvec::{SmallVec, smallvec};
use std::fmt;

/// The four differentiable binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Pow,
}

impl BinaryOp {
    /// Lowercase operation name, used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Pow => "pow",
        }
    }

    /// Forward value of `x op y`.
    ///
    /// # Errors
    /// Pow fails for a negative base with a non-integer exponent and for a
    /// zero base with a negative exponent.
    pub fn evaluate(self, x: f64, y: f64) -> Result<f64, AutogradError> {
        match self {
            Self::Add => Ok(x + y),
            Self::Sub => Ok(x - y),
            Self::Mul => Ok(x * y),
            Self::Pow => {
                if x < 0.0 && y.fract() != 0.0 {
                    return Err(AutogradError::domain(
                        "pow",
                        format!("negative base {x} with non-integer exponent {y}"),
                    ));
                }
                if x == 0.0 && y < 0.0 {
                    return Err(AutogradError::domain(
                        "pow",
                        format!("zero base with negative exponent {y} (division by zero)"),
                    ));
                }
                Ok(x.powf(y))
            }
        }
    }

    /// Local partial derivative with respect to the left operand.
    pub fn partial_lhs(self, x: f64, y: f64) -> Result<f64, AutogradError> {
        match self {
            Self::Add | Self::Sub => Ok(1.0),
            Self::Mul => Ok(y),
            Self::Pow => {
                if x == 0.0 && y < 1.0 {
                    return Err(AutogradError::domain(
                        "pow",
                        format!("derivative of 0^{y} with respect to the base is not finite"),
                    ));
                }
                Ok(y * x.powf(y - 1.0))
            }
        }
    }

    /// Local partial derivative with respect to the right operand.
    pub fn partial_rhs(self, x: f64, y: f64) -> Result<f64, AutogradError> {
        match self {
            Self::Add => Ok(1.0),
            Self::Sub => Ok(-1.0),
            Self::Mul => Ok(x),
            Self::Pow => {
                if x <= 0.0 {
                    return Err(AutogradError::domain(
                        "pow",
                        format!("derivative with respect to the exponent needs ln({x})"),
                    ));
                }
                Ok(x.powf(y) * x.ln())
            }
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand handles of a binary context plus its predecessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binary {
    pub(crate) lhs: NodeId,
    pub(crate) rhs: NodeId,
    /// Contexts of `lhs` and `rhs`; `None` until forward has run.
    pub(crate) next: Option<[ContextId; 2]>,
}

impl Binary {
    /// Left operand.
    pub fn lhs(&self) -> NodeId {
        self.lhs
    }

    /// Right operand.
    pub fn rhs(&self) -> NodeId {
        self.rhs
    }

    /// Predecessor contexts, once wired.
    pub fn next(&self) -> Option<[ContextId; 2]> {
        self.next
    }
}

/// Kind of a context, without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Accumulate,
    Add,
    Sub,
    Mul,
    Pow,
}

/// A graph node representing one operation, or the accumulation terminal of a leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Context {
    /// Terminal context of a leaf; owns that leaf.
    Accumulate(NodeId),
    /// Binary operation over two operand nodes.
    Op(BinaryOp, Binary),
}

impl Context {
    pub(crate) fn binary(op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Self {
        Self::Op(
            op,
            Binary {
                lhs,
                rhs,
                next: None,
            },
        )
    }

    pub fn kind(&self) -> ContextKind {
        match self {
            Self::Accumulate(_) => ContextKind::Accumulate,
            Self::Op(BinaryOp::Add, _) => ContextKind::Add,
            Self::Op(BinaryOp::Sub, _) => ContextKind::Sub,
            Self::Op(BinaryOp::Mul, _) => ContextKind::Mul,
            Self::Op(BinaryOp::Pow, _) => ContextKind::Pow,
        }
    }

    /// Nodes this context operates on, in operand order.
    pub fn operands(&self) -> SmallVec<[NodeId; 2]> {
        match self {
            Self::Accumulate(node) => smallvec![*node],
            Self::Op(_, b) => smallvec![b.lhs, b.rhs],
        }
    }

    /// Predecessor contexts, one per operand. Empty for leaves and for
    /// contexts whose forward has not run.
    pub fn next(&self) -> SmallVec<[ContextId; 2]> {
        match self {
            Self::Op(_, Binary { next: Some(next), .. }) => SmallVec::from_buf(*next),
            _ => SmallVec::new(),
        }
    }

    pub(crate) fn wire(&mut self, next: [ContextId; 2]) {
        if let Self::Op(_, b) = self {
            b.next = Some(next);
        }
    }
}
