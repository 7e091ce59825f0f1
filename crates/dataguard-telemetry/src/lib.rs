//! Structured logging setup and decision observability.
//!
//! Unlike a process-global observer singleton, [`DecisionObserver`]
//! implementations are constructor-injected into the orchestrator that
//! uses them — callers choose and own the instance, so tests and
//! multi-tenant hosts can run several orchestrators with independent
//! observers in the same process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dataguard_core::{DecisionVerdict, GuardianDecision};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize structured JSON logging with an env filter.
///
/// Set `RUST_LOG`, e.g. `"info,dataguard_orchestrator=debug"`. Safe to
/// call more than once; only the first call installs the subscriber.
pub fn init_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Receives every decision an orchestrator produces.
///
/// Implementations must be cheap and non-blocking; this is called
/// synchronously from the evaluation hot path.
pub trait DecisionObserver: Send + Sync {
    /// Called once per evaluated proposal, after the verdict is final.
    fn on_decision(&self, decision: &GuardianDecision);
}

/// An observer that discards every decision. The default for tests and
/// for orchestrators that only need [`DecisionMetrics`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DecisionObserver for NoopObserver {
    fn on_decision(&self, _decision: &GuardianDecision) {}
}

/// Logs every decision as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DecisionObserver for TracingObserver {
    fn on_decision(&self, decision: &GuardianDecision) {
        tracing::info!(
            decision_id = %decision.decision_id,
            proposal_id = %decision.proposal_id,
            verdict = ?decision.verdict,
            final_score = decision.risk_score.final_score,
            matched_rule_id = decision.matched_rule_id.as_deref().unwrap_or(""),
            requires_human = decision.requires_human,
            "guardian decision",
        );
    }
}

/// Lock-free running counters, one per verdict, plus a total.
///
/// Shareable across threads via `Clone` (all fields are `Arc`-backed),
/// the same pattern the reference budget counters use.
#[derive(Debug, Default, Clone)]
pub struct DecisionMetrics {
    allow: Arc<AtomicU64>,
    deny: Arc<AtomicU64>,
    rewrite: Arc<AtomicU64>,
    require_approval: Arc<AtomicU64>,
}

impl DecisionMetrics {
    /// A fresh, zeroed metrics set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for `verdict`.
    fn counter(&self, verdict: DecisionVerdict) -> &AtomicU64 {
        match verdict {
            DecisionVerdict::Allow => &self.allow,
            DecisionVerdict::Deny => &self.deny,
            DecisionVerdict::Rewrite => &self.rewrite,
            DecisionVerdict::RequireApproval => &self.require_approval,
        }
    }

    /// Record one more decision of `verdict`.
    pub fn record(&self, verdict: DecisionVerdict) {
        self.counter(verdict).fetch_add(1, Ordering::Relaxed);
    }

    /// Current `(allow, deny, rewrite, require_approval)` counts.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.allow.load(Ordering::Relaxed),
            self.deny.load(Ordering::Relaxed),
            self.rewrite.load(Ordering::Relaxed),
            self.require_approval.load(Ordering::Relaxed),
        )
    }
}

impl DecisionObserver for DecisionMetrics {
    fn on_decision(&self, decision: &GuardianDecision) {
        self.record(decision.verdict);
    }
}

/// Fan out to multiple observers, e.g. metrics plus a structured log.
pub struct BroadcastObserver {
    observers: Vec<Box<dyn DecisionObserver>>,
}

impl BroadcastObserver {
    /// Wrap a list of observers.
    #[must_use]
    pub fn new(observers: Vec<Box<dyn DecisionObserver>>) -> Self {
        Self { observers }
    }
}

impl DecisionObserver for BroadcastObserver {
    fn on_decision(&self, decision: &GuardianDecision) {
        for observer in &self.observers {
            observer.on_decision(decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataguard_core::RiskScore;
    use uuid::Uuid;

    fn decision(verdict: DecisionVerdict) -> GuardianDecision {
        GuardianDecision {
            decision_id: Uuid::new_v4(),
            proposal_id: Uuid::new_v4(),
            verdict,
            risk_score: RiskScore::heuristic_only(10, "test"),
            matched_rule_id: None,
            reason: "test".into(),
            rewritten_call: None,
            requires_human: false,
            timestamp: dataguard_core::now(),
        }
    }

    #[test]
    fn metrics_count_by_verdict() {
        let metrics = DecisionMetrics::new();
        metrics.record(DecisionVerdict::Allow);
        metrics.record(DecisionVerdict::Allow);
        metrics.record(DecisionVerdict::Deny);
        assert_eq!(metrics.snapshot(), (2, 1, 0, 0));
    }

    #[test]
    fn metrics_observer_updates_on_decision() {
        let metrics = DecisionMetrics::new();
        metrics.on_decision(&decision(DecisionVerdict::Rewrite));
        assert_eq!(metrics.snapshot(), (0, 0, 1, 0));
    }

    #[test]
    fn broadcast_observer_reaches_every_child() {
        let metrics_a = DecisionMetrics::new();
        let metrics_b = DecisionMetrics::new();
        let broadcast = BroadcastObserver::new(vec![
            Box::new(metrics_a.clone()),
            Box::new(metrics_b.clone()),
        ]);
        broadcast.on_decision(&decision(DecisionVerdict::Deny));
        assert_eq!(metrics_a.snapshot().1, 1);
        assert_eq!(metrics_b.snapshot().1, 1);
    }
}
