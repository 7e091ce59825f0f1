//! Merges deterministic policy evaluation with risk scoring into a
//! single [`GuardianDecision`] per proposal.
//!
//! Decision flow:
//!
//! 1. [`dataguard_policy::PolicyEvaluator`] walks the active policy's
//!    rules top-to-bottom.
//! 2. If a rule matched, its action maps directly to a verdict.
//! 3. Otherwise the proposal goes to the injected risk scorer, and the
//!    resulting score is mapped to a verdict via the policy's
//!    thresholds, attempting a rewrite before falling back to human
//!    approval in the middle band.
//!
//! The policy is held in an [`ArcSwap`] so [`DecisionOrchestrator::update_policy`]
//! can hot-swap it without ever exposing a torn read to a concurrent
//! [`DecisionOrchestrator::evaluate`] call.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dataguard_core::{
    DataGuardError, DecisionVerdict, GuardianDecision, PolicyAction, PolicySpec, RewrittenCall,
    RiskScore, ToolArgs, ToolCallContext, ToolCallProposal,
};
use dataguard_policy::PolicyEvaluator;
use dataguard_rewrite::RewriteCatalogue;
use dataguard_risk::{RiskAssessment, RiskScorer};
use dataguard_telemetry::{DecisionObserver, NoopObserver};
use uuid::Uuid;

fn action_score(action: PolicyAction) -> u8 {
    match action {
        PolicyAction::Deny => 100,
        PolicyAction::RequireApproval => 80,
        PolicyAction::Rewrite => 50,
        PolicyAction::Allow => 0,
    }
}

fn action_verdict(action: PolicyAction) -> DecisionVerdict {
    match action {
        PolicyAction::Deny => DecisionVerdict::Deny,
        PolicyAction::RequireApproval => DecisionVerdict::RequireApproval,
        PolicyAction::Rewrite => DecisionVerdict::Rewrite,
        PolicyAction::Allow => DecisionVerdict::Allow,
    }
}

fn rewritten_call(
    proposal: &ToolCallProposal,
    catalogue: &RewriteCatalogue,
    rule_id: &str,
) -> Result<RewrittenCall, DataGuardError> {
    catalogue.apply(rule_id, &proposal.tool_name, &proposal.tool_args)
}

/// Merges policy matching, risk scoring, and rewriting into decisions,
/// and tracks decisions currently awaiting human approval.
pub struct DecisionOrchestrator<S: RiskScorer> {
    policy: ArcSwap<PolicySpec>,
    rewrite_catalogue: Arc<RewriteCatalogue>,
    risk_scorer: S,
    evaluator: PolicyEvaluator,
    pending: DashMap<Uuid, GuardianDecision>,
    observer: Box<dyn DecisionObserver>,
}

impl<S: RiskScorer> DecisionOrchestrator<S> {
    /// Build an orchestrator with the default rewrite catalogue and a
    /// no-op observer.
    #[must_use]
    pub fn new(policy: PolicySpec, risk_scorer: S) -> Self {
        Self::with_rewrite_catalogue(policy, risk_scorer, Arc::new(RewriteCatalogue::with_defaults()))
    }

    /// Build an orchestrator with a custom rewrite catalogue and a
    /// no-op observer.
    #[must_use]
    pub fn with_rewrite_catalogue(
        policy: PolicySpec,
        risk_scorer: S,
        rewrite_catalogue: Arc<RewriteCatalogue>,
    ) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            rewrite_catalogue,
            risk_scorer,
            evaluator: PolicyEvaluator::new(),
            pending: DashMap::new(),
            observer: Box::new(NoopObserver),
        }
    }

    /// Replace the decision observer, e.g. with a [`dataguard_telemetry::BroadcastObserver`]
    /// fanning out to metrics and a structured log.
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn DecisionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Hot-swap the active policy. Evaluations already in flight keep
    /// using the snapshot they acquired; nothing in flight observes a
    /// half-updated policy.
    pub fn update_policy(&self, policy: PolicySpec) {
        self.policy.store(Arc::new(policy));
    }

    /// A snapshot of the currently active policy.
    #[must_use]
    pub fn current_policy(&self) -> Arc<PolicySpec> {
        self.policy.load_full()
    }

    /// Evaluate a proposal, producing a decision and, if it requires
    /// human input, recording it as pending.
    #[tracing::instrument(skip_all, fields(tool_name = %proposal.tool_name, agent_id = %context.agent_id))]
    pub async fn evaluate(
        &self,
        proposal: &ToolCallProposal,
        context: &ToolCallContext,
    ) -> GuardianDecision {
        let policy = self.policy.load_full();

        let decision = match self.evaluator.evaluate(proposal, &policy) {
            Some(rule_match) => self.build_deterministic_decision(proposal, rule_match),
            None => {
                let assessment = self.risk_scorer.score(proposal, context).await;
                self.build_threshold_decision(proposal, assessment, &policy)
            }
        };

        if decision.requires_human {
            self.pending.insert(decision.decision_id, decision.clone());
            tracing::info!(decision_id = %decision.decision_id, "decision pending human approval");
        }

        self.observer.on_decision(&decision);
        decision
    }

    /// Resolve a pending decision. Returns `None` if `decision_id` is
    /// not (or is no longer) pending.
    pub fn resolve_approval(
        &self,
        decision_id: Uuid,
        approved: bool,
        reviewer: &str,
    ) -> Option<GuardianDecision> {
        let (_, decision) = self.pending.remove(&decision_id)?;
        let (verdict, reason) = if approved {
            (
                DecisionVerdict::Allow,
                format!("Approved by {reviewer}. Original: {}", decision.reason),
            )
        } else {
            (
                DecisionVerdict::Deny,
                format!("Rejected by {reviewer}. Original: {}", decision.reason),
            )
        };
        Some(GuardianDecision {
            decision_id: decision.decision_id,
            proposal_id: decision.proposal_id,
            verdict,
            risk_score: decision.risk_score,
            matched_rule_id: decision.matched_rule_id,
            reason,
            rewritten_call: decision.rewritten_call,
            requires_human: false,
            timestamp: dataguard_core::now(),
        })
    }

    /// How many decisions are currently awaiting human approval.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn build_deterministic_decision(
        &self,
        proposal: &ToolCallProposal,
        rule_match: dataguard_policy::PolicyMatchResult,
    ) -> GuardianDecision {
        let score = action_score(rule_match.action);
        let verdict = action_verdict(rule_match.action);

        let rewritten = if rule_match.action == PolicyAction::Rewrite {
            rule_match
                .rewrite_rule_id
                .as_deref()
                .and_then(|rule_id| rewritten_call(proposal, &self.rewrite_catalogue, rule_id).ok())
        } else {
            None
        };

        GuardianDecision {
            decision_id: dataguard_core::new_id(),
            proposal_id: proposal.proposal_id,
            verdict,
            risk_score: RiskScore {
                deterministic_score: Some(score),
                llm_score: None,
                final_score: score,
                explanation: format!("Matched rule: {}", rule_match.rule_id),
            },
            matched_rule_id: Some(rule_match.rule_id),
            reason: rule_match.reason,
            rewritten_call: rewritten,
            requires_human: rule_match.action == PolicyAction::RequireApproval,
            timestamp: dataguard_core::now(),
        }
    }

    fn build_threshold_decision(
        &self,
        proposal: &ToolCallProposal,
        assessment: RiskAssessment,
        policy: &PolicySpec,
    ) -> GuardianDecision {
        let score = assessment.final_score;
        let thresholds = &policy.risk_thresholds;

        let applicable_rule = self
            .rewrite_catalogue
            .find_applicable(&proposal.tool_name, &proposal.tool_args);

        let (verdict, requires_human) = if score <= thresholds.allow_max {
            (DecisionVerdict::Allow, false)
        } else if score <= thresholds.rewrite_confirm_max {
            if applicable_rule.is_some() {
                (DecisionVerdict::Rewrite, false)
            } else {
                (DecisionVerdict::RequireApproval, true)
            }
        } else {
            (DecisionVerdict::RequireApproval, true)
        };

        let rewritten_call = if verdict == DecisionVerdict::Rewrite {
            applicable_rule.and_then(|rule| {
                self.rewrite_catalogue
                    .apply(rule.rule_id, &proposal.tool_name, &proposal.tool_args)
                    .ok()
            })
        } else {
            None
        };

        GuardianDecision {
            decision_id: dataguard_core::new_id(),
            proposal_id: proposal.proposal_id,
            verdict,
            risk_score: RiskScore {
                deterministic_score: None,
                llm_score: Some(score),
                final_score: score,
                explanation: assessment.explanation.clone(),
            },
            matched_rule_id: None,
            reason: assessment.explanation,
            rewritten_call,
            requires_human,
            timestamp: dataguard_core::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dataguard_core::{
        ArgsContainsCondition, MatchCondition, PolicyRule, RiskThresholds, StringCondition,
        ToolCategory,
    };
    use dataguard_risk::{ExternalAssessor, HeuristicScorer};
    use serde_json::json;

    fn default_policy() -> PolicySpec {
        PolicySpec {
            policy_id: "test".into(),
            version: 1,
            description: String::new(),
            scope: vec!["tool_call".into()],
            parent_policy_id: None,
            rules: vec![PolicyRule {
                rule_id: "deny-sudo".into(),
                match_condition: MatchCondition {
                    tool_args_contains: Some(ArgsContainsCondition {
                        pattern: "DROP TABLE".into(),
                    }),
                    ..Default::default()
                },
                action: PolicyAction::Deny,
                reason: "destructive SQL blocked".into(),
                rewrite_rule_id: None,
            }],
            risk_thresholds: RiskThresholds::default(),
        }
    }

    fn proposal(tool_name: &str, args: &[(&str, serde_json::Value)]) -> ToolCallProposal {
        let mut tool_args = ToolArgs::new();
        for (k, v) in args {
            tool_args.insert((*k).to_string(), v.clone());
        }
        ToolCallProposal::new(tool_name, tool_args, ToolCategory::Database, "").unwrap()
    }

    #[tokio::test]
    async fn deterministic_deny_short_circuits_risk_scoring() {
        let orchestrator = DecisionOrchestrator::new(default_policy(), HeuristicScorer::new());
        let context = ToolCallContext::new("agent-1").unwrap();
        let p = proposal("sql", &[("query", json!("DROP TABLE users;"))]);
        let decision = orchestrator.evaluate(&p, &context).await;
        assert_eq!(decision.verdict, DecisionVerdict::Deny);
        assert_eq!(decision.matched_rule_id.as_deref(), Some("deny-sudo"));
    }

    #[tokio::test]
    async fn clean_call_falls_through_to_allow() {
        let orchestrator = DecisionOrchestrator::new(default_policy(), HeuristicScorer::new());
        let context = ToolCallContext::new("agent-1").unwrap();
        let p = proposal("sql", &[("query", json!("SELECT 1"))]);
        let decision = orchestrator.evaluate(&p, &context).await;
        assert_eq!(decision.verdict, DecisionVerdict::Allow);
        assert!(decision.matched_rule_id.is_none());
    }

    struct FixedAssessor(u8);

    #[async_trait]
    impl ExternalAssessor for FixedAssessor {
        async fn assess(
            &self,
            _proposal: &ToolCallProposal,
            _context: &ToolCallContext,
        ) -> anyhow::Result<(u8, String, Vec<String>)> {
            Ok((self.0, "fixed score for test".to_string(), vec![]))
        }
    }

    #[tokio::test]
    async fn mid_band_score_rewrites_when_a_rule_applies() {
        let scorer = dataguard_risk::BlendedScorer::new(FixedAssessor(45), std::time::Duration::from_secs(1));
        let orchestrator = DecisionOrchestrator::new(default_policy(), scorer);
        let context = ToolCallContext::new("agent-1").unwrap();
        let p = proposal("bash", &[("command", json!("rm --force /tmp/x"))]);
        let decision = orchestrator.evaluate(&p, &context).await;
        assert_eq!(decision.verdict, DecisionVerdict::Rewrite);
        assert!(decision.rewritten_call.is_some());
    }

    #[tokio::test]
    async fn mid_band_score_requires_approval_without_a_rewrite() {
        let scorer = dataguard_risk::BlendedScorer::new(FixedAssessor(45), std::time::Duration::from_secs(1));
        let orchestrator = DecisionOrchestrator::new(default_policy(), scorer);
        let context = ToolCallContext::new("agent-1").unwrap();
        let p = proposal("bash", &[("command", json!("echo hello"))]);
        let decision = orchestrator.evaluate(&p, &context).await;
        assert_eq!(decision.verdict, DecisionVerdict::RequireApproval);
        assert!(decision.requires_human);
        assert_eq!(orchestrator.pending_count(), 1);
    }

    #[tokio::test]
    async fn resolve_approval_approving_overturns_to_allow() {
        let scorer = dataguard_risk::BlendedScorer::new(FixedAssessor(90), std::time::Duration::from_secs(1));
        let orchestrator = DecisionOrchestrator::new(default_policy(), scorer);
        let context = ToolCallContext::new("agent-1").unwrap();
        let p = proposal("bash", &[("command", json!("echo hello"))]);
        let decision = orchestrator.evaluate(&p, &context).await;
        assert!(decision.requires_human);

        let resolved = orchestrator
            .resolve_approval(decision.decision_id, true, "alice")
            .unwrap();
        assert_eq!(resolved.verdict, DecisionVerdict::Allow);
        assert!(!resolved.requires_human);
        assert_eq!(orchestrator.pending_count(), 0);
    }

    #[tokio::test]
    async fn resolve_approval_unknown_id_returns_none() {
        let orchestrator = DecisionOrchestrator::new(default_policy(), HeuristicScorer::new());
        assert!(orchestrator
            .resolve_approval(Uuid::new_v4(), true, "alice")
            .is_none());
    }

    #[tokio::test]
    async fn update_policy_is_observed_by_the_next_evaluation() {
        let orchestrator = DecisionOrchestrator::new(default_policy(), HeuristicScorer::new());
        let context = ToolCallContext::new("agent-1").unwrap();
        let p = proposal("sql", &[("query", json!("DROP TABLE users;"))]);
        assert_eq!(
            orchestrator.evaluate(&p, &context).await.verdict,
            DecisionVerdict::Deny
        );

        orchestrator.update_policy(PolicySpec {
            policy_id: "test".into(),
            version: 2,
            description: String::new(),
            scope: vec!["tool_call".into()],
            parent_policy_id: None,
            rules: vec![],
            risk_thresholds: RiskThresholds::default(),
        });

        // No rules left, and the heuristic scorer doesn't flag a bare
        // DROP TABLE string, so this now falls through to threshold scoring.
        let decision = orchestrator.evaluate(&p, &context).await;
        assert!(decision.matched_rule_id.is_none());
    }
}
