//! Risk scoring for tool call proposals that no policy rule matched.
//!
//! [`HeuristicScorer`] is deterministic and has no external
//! dependencies — safe as the sole scorer in a v1 deployment.
//! [`BlendedScorer`] wraps any [`ExternalAssessor`] (an LLM call, a
//! dedicated classifier service, ...) and blends its score with the
//! heuristic one, falling back to heuristics alone if the assessor
//! errors or exceeds its deadline.

mod heuristics;

#[cfg(feature = "anthropic")]
mod anthropic;
#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicAssessor;

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use dataguard_core::{ToolCallContext, ToolCallProposal};

/// The result of scoring a proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// 0-100 risk score.
    pub final_score: u8,
    /// Human-readable rationale.
    pub explanation: String,
    /// Risk flags raised, e.g. `"pii_detected"`.
    pub flags: Vec<String>,
}

/// Scores a proposal's risk given its ambient context.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    /// Produce a risk assessment for `proposal`.
    async fn score(&self, proposal: &ToolCallProposal, context: &ToolCallContext) -> RiskAssessment;
}

/// A deterministic, regex-based scorer with no external calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    /// Construct a new heuristic scorer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RiskScorer for HeuristicScorer {
    async fn score(&self, proposal: &ToolCallProposal, context: &ToolCallContext) -> RiskAssessment {
        let (score, flags) = heuristics::heuristic_score(proposal, context);

        if score == 0 {
            return RiskAssessment {
                final_score: 10,
                explanation: "No risk indicators detected by heuristics.".to_string(),
                flags,
            };
        }

        let mut explanations = Vec::new();
        if flags.iter().any(|f| f == heuristics::PII_DETECTED) {
            explanations.push("Possible PII found in tool arguments.".to_string());
        }
        if flags.iter().any(|f| f == heuristics::PROMPT_INJECTION_SUSPECTED) {
            explanations.push("Potential prompt injection pattern detected.".to_string());
        }
        if flags.iter().any(|f| f == heuristics::HIGH_IMPACT_CATEGORY) {
            explanations.push(format!(
                "Tool category '{}' is high-impact.",
                proposal.tool_category
            ));
        }

        RiskAssessment {
            final_score: score,
            explanation: explanations.join(" "),
            flags,
        }
    }
}

/// An external risk assessment backend (an LLM call, a hosted
/// classifier, ...). Implementations should do their own retrying;
/// [`BlendedScorer`] applies only a single deadline per call.
#[async_trait]
pub trait ExternalAssessor: Send + Sync {
    /// Assess `proposal`, returning `(score, explanation, flags)`.
    async fn assess(
        &self,
        proposal: &ToolCallProposal,
        context: &ToolCallContext,
    ) -> anyhow::Result<(u8, String, Vec<String>)>;
}

/// Blends [`HeuristicScorer`] with an [`ExternalAssessor`], taking the
/// higher of the two scores. Falls back to heuristics alone if the
/// assessor errors or does not respond within `timeout`.
pub struct BlendedScorer<A: ExternalAssessor> {
    assessor: A,
    timeout: Duration,
}

impl<A: ExternalAssessor> BlendedScorer<A> {
    /// Wrap `assessor`, bounding every call to `timeout`.
    #[must_use]
    pub fn new(assessor: A, timeout: Duration) -> Self {
        Self { assessor, timeout }
    }
}

#[async_trait]
impl<A: ExternalAssessor> RiskScorer for BlendedScorer<A> {
    async fn score(&self, proposal: &ToolCallProposal, context: &ToolCallContext) -> RiskAssessment {
        let (heuristic_score, heuristic_flags) = heuristics::heuristic_score(proposal, context);

        let outcome = tokio::time::timeout(self.timeout, self.assessor.assess(proposal, context)).await;

        match outcome {
            Ok(Ok((llm_score, llm_explanation, llm_flags))) => {
                let combined_score = heuristic_score.max(llm_score).min(100);
                let combined_flags: Vec<String> = heuristic_flags
                    .into_iter()
                    .chain(llm_flags)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                RiskAssessment {
                    final_score: combined_score,
                    explanation: llm_explanation,
                    flags: combined_flags,
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "external risk assessor failed, falling back to heuristics");
                Self::heuristic_fallback(heuristic_score, heuristic_flags)
            }
            Err(_elapsed) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis(), "external risk assessor timed out, falling back to heuristics");
                Self::heuristic_fallback(heuristic_score, heuristic_flags)
            }
        }
    }
}

impl<A: ExternalAssessor> BlendedScorer<A> {
    fn heuristic_fallback(heuristic_score: u8, heuristic_flags: Vec<String>) -> RiskAssessment {
        RiskAssessment {
            final_score: heuristic_score.max(10),
            explanation: format!(
                "Heuristic-only (LLM unavailable). {}",
                heuristic_flags.join("; ")
            ),
            flags: heuristic_flags,
        }
    }
}
