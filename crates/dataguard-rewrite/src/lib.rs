//! Deterministic rewrite transforms for unsafe tool calls.
//!
//! Each rule is a pure function pair: `applies_to` decides whether the
//! rule fires for a given `(tool_name, tool_args)`, and `transform`
//! produces the rewritten call. Rules are looked up by id and invoked
//! by the orchestrator when a policy action is `rewrite`.

mod args;
mod rules;

use dataguard_core::{DataGuardError, RewrittenCall, ToolArgs};
use indexmap::IndexMap;

/// A named, pure deterministic rewrite transform.
pub struct RewriteRule {
    /// Stable identifier referenced by policy rules.
    pub rule_id: &'static str,
    /// Human-readable description surfaced on the resulting decision.
    pub description: &'static str,
    applies_to: fn(&str, &ToolArgs) -> bool,
    transform: fn(&str, &ToolArgs) -> (String, ToolArgs),
}

impl RewriteRule {
    /// Whether this rule applies to the given call.
    #[must_use]
    pub fn applies_to(&self, tool_name: &str, tool_args: &ToolArgs) -> bool {
        (self.applies_to)(tool_name, tool_args)
    }
}

/// The catalogue of registered rewrite rules, keyed by id.
///
/// Backed by an order-preserving map so [`RewriteCatalogue::find_applicable`]
/// always considers rules in registration order and returns the first
/// match, independent of hashing.
pub struct RewriteCatalogue {
    rules: IndexMap<&'static str, RewriteRule>,
}

impl Default for RewriteCatalogue {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RewriteCatalogue {
    /// An empty catalogue with no registered rules.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: IndexMap::new(),
        }
    }

    /// The catalogue pre-populated with the eleven canonical rules.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalogue = Self::empty();
        for rule in rules::default_rules() {
            catalogue.register(rule);
        }
        catalogue
    }

    /// Register a rule, replacing any existing rule with the same id.
    pub fn register(&mut self, rule: RewriteRule) {
        self.rules.insert(rule.rule_id, rule);
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, rule_id: &str) -> Option<&RewriteRule> {
        self.rules.get(rule_id)
    }

    /// Find the first registered rule (in registration order) that
    /// applies to this call.
    #[must_use]
    pub fn find_applicable(&self, tool_name: &str, tool_args: &ToolArgs) -> Option<&RewriteRule> {
        self.rules
            .values()
            .find(|rule| rule.applies_to(tool_name, tool_args))
    }

    /// Apply a rule by id to a call.
    ///
    /// # Errors
    ///
    /// Returns [`DataGuardError::UnknownRewriteRule`] if `rule_id` is
    /// not registered.
    pub fn apply(
        &self,
        rule_id: &str,
        tool_name: &str,
        tool_args: &ToolArgs,
    ) -> Result<RewrittenCall, DataGuardError> {
        let rule = self
            .get(rule_id)
            .ok_or_else(|| DataGuardError::UnknownRewriteRule(rule_id.to_string()))?;
        let (rewritten_tool_name, rewritten_tool_args) = (rule.transform)(tool_name, tool_args);
        Ok(RewrittenCall {
            original_tool_name: tool_name.to_string(),
            original_tool_args: tool_args.clone(),
            rewritten_tool_name,
            rewritten_tool_args,
            rewrite_rule_id: rule_id.to_string(),
            description: rule.description.to_string(),
        })
    }
}
