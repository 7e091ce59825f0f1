//! Error taxonomy surfaced by the core.

use thiserror::Error;

/// Errors the core surfaces to callers.
///
/// The evaluator and catalogue dispatch only ever surface errors for
/// malformed inputs and unknown rewrite rule ids; a scorer backend
/// failure is absorbed by [`dataguard-risk`] and never reaches this
/// type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataGuardError {
    /// Schema/validation failure at construction of a proposal, context,
    /// or policy document. Maps to HTTP 422 in an external adapter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A policy rule referenced a rewrite rule id absent from the
    /// catalogue. Indicates misconfiguration; maps to HTTP 500.
    #[error("unknown rewrite rule: {0}")]
    UnknownRewriteRule(String),

    /// `resolve_approval` was called with an id that is not (or is no
    /// longer) pending. Callers typically match on `Option` instead of
    /// this variant; it exists for adapters that prefer a typed error
    /// (maps to HTTP 404).
    #[error("no pending decision for id: {0}")]
    PendingNotFound(String),

    /// The evaluation was cancelled before the risk scorer returned. A
    /// cancelled evaluation is equivalent to never having been submitted:
    /// no decision is produced and nothing is left pending.
    #[error("evaluation cancelled")]
    Cancelled,
}
