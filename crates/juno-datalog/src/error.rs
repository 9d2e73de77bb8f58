//! Error types for rule compilation and evaluation.

use thiserror::Error;

use crate::term::Constant;

/// Errors that can occur in datalog operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatalogError {
    /// Malformed input at the boundary.
    #[error("parse error: {0}")]
    Parse(String),

    /// Structurally invalid rule (unknown builtin, wrong builtin arity).
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// A variable is not bound where the rule needs it.
    #[error("unsafe rule `{rule}`: variable {variable} is not bound by the body")]
    UnsafeRule { rule: String, variable: String },

    /// A builtin received constants of kinds it cannot compare or compute with.
    #[error("type mismatch in {builtin}: cannot combine {left} and {right}")]
    TypeMismatch {
        builtin: String,
        left: Constant,
        right: Constant,
    },

    /// The fixpoint exceeded a configured bound.
    #[error(
        "resource limit exceeded: {bound} reached {limit} (largest relation: {predicate} with {count} tuples)"
    )]
    ResourceExceeded {
        bound: ResourceBound,
        limit: usize,
        predicate: String,
        count: usize,
    },

    /// Cancellation or deadline observed between rounds.
    #[error("evaluation cancelled")]
    Cancelled,

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Which configured bound a runaway evaluation hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBound {
    Rounds,
    Tuples,
}

impl std::fmt::Display for ResourceBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceBound::Rounds => write!(f, "round count"),
            ResourceBound::Tuples => write!(f, "tuple count"),
        }
    }
}
