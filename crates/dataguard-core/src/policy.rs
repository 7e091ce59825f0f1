//! The policy document schema.

use serde::{Deserialize, Serialize};

use crate::error::DataGuardError;

/// The action a matched [`PolicyRule`] prescribes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Permit the call unchanged.
    Allow,
    /// Block the call.
    Deny,
    /// Hold the call for human review.
    RequireApproval,
    /// Apply a named rewrite rule and permit the rewritten call.
    Rewrite,
}

/// A string-valued match clause: exactly one of `eq`, `in`, `not_in`.
///
/// When more than one is present, `in` takes precedence over `eq`, which
/// takes precedence over `not_in` — this mirrors the original
/// evaluator's dict-lookup order and is preserved for compatibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StringCondition {
    /// Match if the value equals any entry in this list.
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub in_list: Option<Vec<String>>,
    /// Match if the value equals this string exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<String>,
    /// Match if the value does not equal any entry in this list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_in: Option<Vec<String>>,
}

impl StringCondition {
    /// Evaluate this clause against `value`.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        if let Some(list) = &self.in_list {
            return list.iter().any(|v| v == value);
        }
        if let Some(eq) = &self.eq {
            return eq == value;
        }
        if let Some(list) = &self.not_in {
            return !list.iter().any(|v| v == value);
        }
        false
    }
}

/// `tool_args_contains`: a regex evaluated against the key-sorted JSON
/// serialization of `tool_args`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgsContainsCondition {
    /// Regex pattern.
    pub pattern: String,
}

/// The comparison kind for a [`FieldCheckCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCheckKind {
    /// List field length greater than `value`.
    LengthGt,
    /// List field length less than `value`.
    LengthLt,
    /// Scalar field equals `value`.
    Eq,
    /// Numeric field greater than `value`.
    Gt,
    /// Numeric field less than `value`.
    Lt,
    /// String field contains `value` as a substring.
    Contains,
    /// String field matches `value` as a regex.
    Matches,
    /// String field is a URL whose host is in the `value` list.
    DomainIn,
    /// String field is a URL whose host is not in the `value` list.
    DomainNotIn,
}

/// `tool_args_field_check`: a typed comparison against one field of
/// `tool_args`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCheckCondition {
    /// Field name within `tool_args` (top-level key only).
    pub field: String,
    /// Comparison kind.
    pub condition: FieldCheckKind,
    /// Comparison operand.
    pub value: serde_json::Value,
}

/// A set of match clauses within a rule. All present clauses must
/// match (AND), and a condition with zero clauses never matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchCondition {
    /// Match on the normalized tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<StringCondition>,
    /// Match on the tool category's wire string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_category: Option<StringCondition>,
    /// Match on a regex over the serialized arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args_contains: Option<ArgsContainsCondition>,
    /// Match on a single typed field comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args_field_check: Option<FieldCheckCondition>,
}

impl MatchCondition {
    /// Whether this condition has at least one active clause.
    #[must_use]
    pub fn has_clauses(&self) -> bool {
        self.tool_name.is_some()
            || self.tool_category.is_some()
            || self.tool_args_contains.is_some()
            || self.tool_args_field_check.is_some()
    }
}

/// One deterministic rule in a [`PolicySpec`]'s ruleset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Unique (within the policy) rule identifier.
    pub rule_id: String,
    /// Match clauses; the rule fires when all present clauses match.
    #[serde(rename = "match")]
    pub match_condition: MatchCondition,
    /// The action to take when this rule matches.
    pub action: PolicyAction,
    /// Human-readable explanation surfaced on the resulting decision.
    #[serde(default)]
    pub reason: String,
    /// Which rewrite rule to apply; required when `action == Rewrite`.
    #[serde(default)]
    pub rewrite_rule_id: Option<String>,
}

/// Thresholds mapping a risk score to a verdict when no policy rule
/// matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Scores at or below this are allowed outright.
    #[serde(default = "default_allow_max")]
    pub allow_max: u8,
    /// Lower bound of the rewrite/confirm band (informational; the
    /// evaluator actually branches on `allow_max`/`rewrite_confirm_max`).
    #[serde(default = "default_rewrite_confirm_min")]
    pub rewrite_confirm_min: u8,
    /// Scores at or below this (and above `allow_max`) attempt a
    /// rewrite before falling back to approval.
    #[serde(default = "default_rewrite_confirm_max")]
    pub rewrite_confirm_max: u8,
    /// Lower bound of the always-require-approval band (informational).
    #[serde(default = "default_block_approval_min")]
    pub block_approval_min: u8,
}

fn default_allow_max() -> u8 {
    30
}
fn default_rewrite_confirm_min() -> u8 {
    31
}
fn default_rewrite_confirm_max() -> u8 {
    60
}
fn default_block_approval_min() -> u8 {
    61
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            allow_max: default_allow_max(),
            rewrite_confirm_min: default_rewrite_confirm_min(),
            rewrite_confirm_max: default_rewrite_confirm_max(),
            block_approval_min: default_block_approval_min(),
        }
    }
}

/// A complete policy document. Rules are evaluated top-to-bottom; the
/// first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Policy document id.
    pub policy_id: String,
    /// Monotonically increasing version, at least 1.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Which interaction types this policy governs.
    #[serde(default = "default_scope")]
    pub scope: Vec<String>,
    /// Optional parent policy to inherit rules from (org-level).
    #[serde(default)]
    pub parent_policy_id: Option<String>,
    /// Ordered ruleset.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Thresholds used when no rule matches.
    #[serde(default)]
    pub risk_thresholds: RiskThresholds,
}

fn default_version() -> u32 {
    1
}

fn default_scope() -> Vec<String> {
    vec!["tool_call".to_string(), "message_send".to_string()]
}

impl PolicySpec {
    /// Parse and validate a policy document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DataGuardError::InvalidInput`] if the document is
    /// malformed JSON, has `version < 1`, has a rule with an empty
    /// `rule_id`, or has a rule with `action == Rewrite` and no
    /// `rewrite_rule_id`.
    pub fn from_json_str(text: &str) -> Result<Self, DataGuardError> {
        let spec: Self = serde_json::from_str(text)
            .map_err(|e| DataGuardError::InvalidInput(format!("malformed policy JSON: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), DataGuardError> {
        if self.version < 1 {
            return Err(DataGuardError::InvalidInput(
                "policy version must be >= 1".into(),
            ));
        }
        for rule in &self.rules {
            if rule.rule_id.trim().is_empty() {
                return Err(DataGuardError::InvalidInput(
                    "rule_id must not be empty".into(),
                ));
            }
            if rule.action == PolicyAction::Rewrite && rule.rewrite_rule_id.is_none() {
                return Err(DataGuardError::InvalidInput(format!(
                    "rule '{}' has action=rewrite but no rewrite_rule_id",
                    rule.rule_id
                )));
            }
        }
        Ok(())
    }
}
