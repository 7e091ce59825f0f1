//! The decision produced by evaluating a proposal against a policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool_call::ToolArgs;

/// The outcome of evaluating a [`crate::tool_call::ToolCallProposal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionVerdict {
    /// The call may proceed unchanged.
    Allow,
    /// The call is blocked outright.
    Deny,
    /// The call was rewritten to a safer equivalent and may proceed.
    Rewrite,
    /// The call is held pending human approval.
    RequireApproval,
}

/// The risk score a call was assigned, and how it was derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    /// Score from the heuristic scorer, 0-100, if computed.
    pub deterministic_score: Option<u8>,
    /// Score from an external/LLM assessor, 0-100, if one ran.
    pub llm_score: Option<u8>,
    /// The score actually used to derive the verdict.
    pub final_score: u8,
    /// Human-readable explanation of how `final_score` was reached.
    pub explanation: String,
}

impl RiskScore {
    /// A score with no external assessment, `final_score` equal to the
    /// heuristic score.
    #[must_use]
    pub fn heuristic_only(score: u8, explanation: impl Into<String>) -> Self {
        Self {
            deterministic_score: Some(score),
            llm_score: None,
            final_score: score,
            explanation: explanation.into(),
        }
    }

    /// A blended score combining a heuristic and an external score, the
    /// higher of the two winning.
    #[must_use]
    pub fn blended(deterministic: u8, llm: u8, explanation: impl Into<String>) -> Self {
        Self {
            deterministic_score: Some(deterministic),
            llm_score: Some(llm),
            final_score: deterministic.max(llm),
            explanation: explanation.into(),
        }
    }
}

/// The result of applying a rewrite rule to a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewrittenCall {
    /// Tool name before rewriting.
    pub original_tool_name: String,
    /// Arguments before rewriting.
    pub original_tool_args: ToolArgs,
    /// Tool name after rewriting (usually unchanged).
    pub rewritten_tool_name: String,
    /// Arguments after rewriting.
    pub rewritten_tool_args: ToolArgs,
    /// Id of the rewrite rule that was applied.
    pub rewrite_rule_id: String,
    /// Human-readable description of what changed.
    pub description: String,
}

/// The terminal record produced for every evaluated proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianDecision {
    /// Unique id for this decision.
    pub decision_id: Uuid,
    /// The proposal this decision was made for.
    pub proposal_id: Uuid,
    /// The resulting verdict.
    pub verdict: DecisionVerdict,
    /// The risk score backing this verdict.
    pub risk_score: RiskScore,
    /// The policy rule that produced this verdict, if any (`None` means
    /// the verdict came from the threshold fallback).
    pub matched_rule_id: Option<String>,
    /// Human-readable explanation surfaced to the caller.
    pub reason: String,
    /// The rewritten call, present only when `verdict == Rewrite`.
    pub rewritten_call: Option<RewrittenCall>,
    /// Whether this decision is currently awaiting human input.
    pub requires_human: bool,
    /// When this decision was produced.
    pub timestamp: DateTime<Utc>,
}

impl GuardianDecision {
    /// Whether this decision currently permits execution. `Rewrite`
    /// counts as permitting (the rewritten call, not the original).
    #[must_use]
    pub fn permits_execution(&self) -> bool {
        matches!(self.verdict, DecisionVerdict::Allow | DecisionVerdict::Rewrite)
    }
}
