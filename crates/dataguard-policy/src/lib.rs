//! Stateless, deterministic JSON rule matcher. First-match-wins.

use dataguard_core::{
    FieldCheckCondition, FieldCheckKind, MatchCondition, PolicyAction, PolicySpec, StringCondition,
    ToolArgs, ToolCallProposal,
};
use regex::Regex;
use serde_json::Value;
use url::Url;

/// The rule that matched a proposal, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyMatchResult {
    /// Id of the matched rule.
    pub rule_id: String,
    /// The action the rule prescribes.
    pub action: PolicyAction,
    /// The rule's explanation.
    pub reason: String,
    /// The rewrite rule to apply, present when `action == Rewrite`.
    pub rewrite_rule_id: Option<String>,
}

/// Evaluates a [`ToolCallProposal`] against a [`PolicySpec`].
///
/// Holds no state: every call is a pure function of its inputs, so a
/// single evaluator instance can be shared across concurrent
/// evaluations without synchronization.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Construct a new evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Walk `policy`'s rules top-to-bottom and return the first match.
    #[must_use]
    pub fn evaluate(
        &self,
        proposal: &ToolCallProposal,
        policy: &PolicySpec,
    ) -> Option<PolicyMatchResult> {
        policy.rules.iter().find_map(|rule| {
            rule_matches(proposal, &rule.match_condition).then(|| PolicyMatchResult {
                rule_id: rule.rule_id.clone(),
                action: rule.action,
                reason: rule.reason.clone(),
                rewrite_rule_id: rule.rewrite_rule_id.clone(),
            })
        })
    }
}

fn rule_matches(proposal: &ToolCallProposal, cond: &MatchCondition) -> bool {
    if !cond.has_clauses() {
        return false;
    }
    let mut all_matched = true;
    if let Some(tool_name) = &cond.tool_name {
        all_matched &= tool_name.matches(&proposal.tool_name);
    }
    if let Some(tool_category) = &cond.tool_category {
        all_matched &= tool_category.matches(proposal.tool_category.as_str());
    }
    if let Some(args_contains) = &cond.tool_args_contains {
        all_matched &= match_args_contains(&proposal.tool_args, &args_contains.pattern);
    }
    if let Some(field_check) = &cond.tool_args_field_check {
        all_matched &= match_field_check(&proposal.tool_args, field_check);
    }
    all_matched
}

fn match_args_contains(args: &ToolArgs, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let Ok(regex) = Regex::new(pattern) else {
        return false;
    };
    regex.is_match(&dataguard_core::serialize_args_sorted(args))
}

fn match_field_check(args: &ToolArgs, cond: &FieldCheckCondition) -> bool {
    let Some(field_val) = args.get(&cond.field) else {
        return false;
    };
    match cond.condition {
        FieldCheckKind::LengthGt => compare_length(field_val, &cond.value, |a, b| a > b),
        FieldCheckKind::LengthLt => compare_length(field_val, &cond.value, |a, b| a < b),
        FieldCheckKind::Eq => field_val == &cond.value,
        FieldCheckKind::Gt => compare_numeric(field_val, &cond.value, |a, b| a > b),
        FieldCheckKind::Lt => compare_numeric(field_val, &cond.value, |a, b| a < b),
        FieldCheckKind::Contains => match (field_val.as_str(), cond.value.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        FieldCheckKind::Matches => match (field_val.as_str(), cond.value.as_str()) {
            (Some(text), Some(pattern)) => Regex::new(pattern).is_ok_and(|re| re.is_match(text)),
            _ => false,
        },
        FieldCheckKind::DomainIn => field_val
            .as_str()
            .is_some_and(|url| domain_in(url, &cond.value)),
        FieldCheckKind::DomainNotIn => field_val
            .as_str()
            .is_some_and(|url| domain_not_in(url, &cond.value)),
    }
}

fn compare_length(field_val: &Value, threshold: &Value, cmp: impl Fn(usize, usize) -> bool) -> bool {
    match (field_val.as_array(), threshold.as_u64()) {
        (Some(list), Some(n)) => cmp(list.len(), n as usize),
        _ => false,
    }
}

fn compare_numeric(field_val: &Value, threshold: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (field_val.as_f64(), threshold.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Extract a URL's hostname, distinguishing "parsed but hostless" from
/// "failed to parse" the way the reference evaluator's `urlparse` call
/// distinguishes them.
fn hostname(url: &str) -> Result<Option<String>, ()> {
    Url::parse(url)
        .map(|u| u.host_str().map(str::to_string))
        .map_err(|_| ())
}

fn domain_in(url: &str, allowed: &Value) -> bool {
    let Some(list) = allowed.as_array() else {
        return false;
    };
    match hostname(url) {
        Err(()) | Ok(None) => false,
        Ok(Some(host)) => list.iter().any(|v| v.as_str() == Some(host.as_str())),
    }
}

fn domain_not_in(url: &str, disallowed: &Value) -> bool {
    let Some(list) = disallowed.as_array() else {
        return true;
    };
    match hostname(url) {
        // Malformed or hostless URLs are treated as a match — flag them.
        Err(()) | Ok(None) => true,
        Ok(Some(host)) => !list.iter().any(|v| v.as_str() == Some(host.as_str())),
    }
}
