//! Error types for the authorization core.

use thiserror::Error;

/// Main error type for core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Two symbol tables shared a string during disjoint composition.
    #[error("symbol table overlap on {0:?}")]
    SymbolTableOverlap(Vec<String>),

    /// A block or envelope carried an unsupported version, or the wire
    /// format used an unknown expression opcode.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// A `Term::Set` violated a set constraint: empty, heterogeneously
    /// typed, containing a variable, or containing a nested set.
    #[error("invalid term: {0}")]
    InvalidTerm(String),

    /// A rule's head (or one of its expressions) referenced a variable
    /// that does not appear in any body predicate.
    #[error("unbound head variable: {0}")]
    UnboundHeadVariable(String),

    /// A `run` exceeded its fact, iteration, or wall-clock budget.
    #[error("evaluation limit exceeded: {0}")]
    EvaluationLimitExceeded(String),

    /// One or more checks failed to verify; messages are aggregated in
    /// authorizer-check, block-0-check, block-i-check order.
    #[error("verification failed: {0:?}")]
    VerificationFailed(Vec<String>),

    /// A deny policy matched first.
    #[error("policy denied (policy #{0})")]
    PolicyDenied(usize),

    /// No policy matched.
    #[error("no matching policy")]
    NoMatchingPolicy,

    /// `serialize_policies` was invoked on a dirty authorizer.
    #[error("serialize_policies invoked after run/query/authorize; call reset() first")]
    SerializeAfterRun,
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
