//! Shared data model for DataGuard: proposals, ambient context, policy
//! documents, and decisions.
//!
//! This crate has no knowledge of how proposals are scored, matched, or
//! rewritten — it only defines the types those components pass between
//! each other, plus the error taxonomy all of them surface.

mod decision;
mod error;
mod ids;
mod policy;
mod tool_call;

pub use decision::{DecisionVerdict, GuardianDecision, RewrittenCall, RiskScore};
pub use error::DataGuardError;
pub use ids::{new_id, next_ordinal, now};
pub use policy::{
    ArgsContainsCondition, FieldCheckCondition, FieldCheckKind, MatchCondition, PolicyAction,
    PolicyRule, PolicySpec, RiskThresholds, StringCondition,
};
pub use tool_call::{
    serialize_args_sorted, ToolArgs, ToolCallContext, ToolCallProposal, ToolCategory, ToolResponse,
};
