//! Error types for tnn.

use thiserror::Error;

/// Errors that can occur while building or differentiating a graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutogradError {
    /// Real-valued operation applied outside its domain.
    #[error("domain error in {op}: {reason}")]
    Domain { op: &'static str, reason: String },

    /// Operand that cannot take part in arithmetic.
    #[error("type mismatch: {reason}")]
    TypeMismatch { reason: String },

    /// Node handle from another graph or from before a clear.
    #[error("stale node handle: index {index}, generation {generation}")]
    StaleNode { index: usize, generation: u32 },

    /// Context handle from another graph or from before a clear.
    #[error("stale context handle: index {index}, generation {generation}")]
    StaleContext { index: usize, generation: u32 },

    /// Backward requested on a context whose forward never ran.
    #[error("context {index} has no predecessors wired; forward has not run")]
    NotForwarded { index: usize },
}

impl AutogradError {
    pub(crate) fn domain(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Domain {
            op,
            reason: reason.into(),
        }
    }
}

/// Errors produced when building or validating a [`StepConfig`](crate::StepConfig).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Configuration values are out of range.
    #[error("config validation: {0}")]
    Validation(String),

    /// An environment variable was set but could not be read.
    #[error("env var {key}: {message}")]
    EnvVar { key: String, message: String },

    /// An environment variable was set but could not be parsed.
    #[error("env var {key}={value:?}: {message}")]
    Parse {
        key: String,
        value: String,
        message: String,
    },
}
