//! tnn - minimal reverse-mode automatic differentiation over scalars
//!
//! This crate builds a dynamic computation graph out of scalar nodes and
//! differentiates through it.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Operators and losses (Tensor, loss)
//!     → + - * / pow, mse
//!
//! Level 2: Graph arena (autodiff::Graph)
//!     → leaf, apply, forward, backward, update, zero_grad
//!
//! Level 3: Local derivative rules (autodiff::BinaryOp)
//!     → evaluate, partial_lhs, partial_rhs
//! ```
//!
//! # Example
//!
//! ```
//! use tnn::{StepConfig, Tensor, Traversal, loss};
//!
//! let w = Tensor::leaf(0.0);
//! let config = StepConfig::with_learning_rate(0.1).traversal(Traversal::Once);
//!
//! for _ in 0..50 {
//!     let prediction = (w * 2.0).unwrap();
//!     let l = loss::mse(prediction, 6.0).unwrap();
//!     let ctx = l.grad_ctx().unwrap();
//!     ctx.backward(1.0).unwrap();
//!     ctx.update_with(&config).unwrap();
//!     ctx.zero_grad().unwrap();
//! }
//! assert!((w.data().unwrap() - 3.0).abs() < 1e-6);
//! ```

pub mod autodiff;
pub mod config;
pub mod error;
pub mod loss;

pub use autodiff::{GradContext, Graph, Operand, Pow, Tensor};
pub use config::{StepConfig, Traversal};
pub use error::{AutogradError, ConfigError};
