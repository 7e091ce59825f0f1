//! Tool call proposals and their ambient context.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DataGuardError;
use crate::ids;

/// String-keyed JSON-like argument map for a proposed tool call.
///
/// Backed by `serde_json::Map`, which (absent the `preserve_order`
/// feature) is a `BTreeMap` — serializing it already yields the
/// key-sorted representation required for `tool_args_contains`
/// matching and for the audit-log args hash.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Serialize `args` to its stable, key-sorted JSON text form.
///
/// Shared by `tool_args_contains` matching (`dataguard-policy`) and by
/// `collect_all_text_fields` (`dataguard-detectors`), so both components
/// scan the exact same byte-for-byte representation of the arguments.
#[must_use]
pub fn serialize_args_sorted(args: &ToolArgs) -> String {
    serde_json::to_string(args).unwrap_or_default()
}

/// Coarse category used for policy matching and risk scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Filesystem reads/writes.
    FileSystem,
    /// Database queries/mutations.
    Database,
    /// Outbound HTTP calls.
    HttpRequest,
    /// Arbitrary code execution.
    CodeExecution,
    /// Outbound messaging (email, chat, SMS).
    MessageSend,
    /// Payment/financial transactions.
    Payment,
    /// Authentication/authorization operations.
    Auth,
    /// Anything not otherwise classified.
    Unknown,
}

impl ToolCategory {
    /// The wire-format string for this category, matching the JSON
    /// `snake_case` encoding used throughout the policy and audit schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileSystem => "file_system",
            Self::Database => "database",
            Self::HttpRequest => "http_request",
            Self::CodeExecution => "code_execution",
            Self::MessageSend => "message_send",
            Self::Payment => "payment",
            Self::Auth => "auth",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ToolCategory {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A proposed tool invocation an agent wishes to perform.
///
/// Immutable after construction; [`ToolCallProposal::new`] normalizes
/// `tool_name` and validates length constraints, returning
/// [`DataGuardError::InvalidInput`] on violation rather than panicking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallProposal {
    /// Unique id for this proposal.
    pub proposal_id: Uuid,
    /// Canonical tool name, normalized to trimmed lower-case.
    pub tool_name: String,
    /// Arguments the agent wants to pass to the tool.
    #[serde(default)]
    pub tool_args: ToolArgs,
    /// Coarse category for policy matching.
    #[serde(default)]
    pub tool_category: ToolCategory,
    /// The agent's stated purpose for this call.
    #[serde(default)]
    pub intended_outcome: String,
}

impl ToolCallProposal {
    const MAX_TOOL_NAME_LEN: usize = 256;
    const MAX_INTENDED_OUTCOME_LEN: usize = 1024;

    /// Build a new proposal, normalizing `tool_name` and validating
    /// length bounds.
    ///
    /// # Errors
    ///
    /// Returns [`DataGuardError::InvalidInput`] if `tool_name` is empty
    /// or exceeds 256 characters after trimming, or if
    /// `intended_outcome` exceeds 1024 characters.
    pub fn new(
        tool_name: impl Into<String>,
        tool_args: ToolArgs,
        tool_category: ToolCategory,
        intended_outcome: impl Into<String>,
    ) -> Result<Self, DataGuardError> {
        let tool_name = tool_name.into().trim().to_lowercase();
        if tool_name.is_empty() {
            return Err(DataGuardError::InvalidInput(
                "tool_name must not be empty".into(),
            ));
        }
        if tool_name.len() > Self::MAX_TOOL_NAME_LEN {
            return Err(DataGuardError::InvalidInput(format!(
                "tool_name must be at most {} characters",
                Self::MAX_TOOL_NAME_LEN
            )));
        }
        let intended_outcome = intended_outcome.into();
        if intended_outcome.len() > Self::MAX_INTENDED_OUTCOME_LEN {
            return Err(DataGuardError::InvalidInput(format!(
                "intended_outcome must be at most {} characters",
                Self::MAX_INTENDED_OUTCOME_LEN
            )));
        }
        Ok(Self {
            proposal_id: ids::new_id(),
            tool_name,
            tool_args,
            tool_category,
            intended_outcome,
        })
    }
}

/// Ambient context around a tool call proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallContext {
    /// Id of the calling agent.
    pub agent_id: String,
    /// Conversation/session id.
    #[serde(default = "ids::new_id")]
    pub session_id: Uuid,
    /// Tenant/project identifier for multi-tenancy.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    /// End-user on whose behalf the agent acts, if known.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Short summary of the conversation so far.
    #[serde(default)]
    pub conversation_summary: String,
    /// Ids of previous `GuardianDecision`s in this session.
    #[serde(default)]
    pub prior_decisions: Vec<Uuid>,
    /// Context construction time.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_tenant() -> String {
    "default".to_string()
}

impl ToolCallContext {
    const MAX_SUMMARY_LEN: usize = 4096;

    /// Build a new context, validating `conversation_summary` length.
    ///
    /// # Errors
    ///
    /// Returns [`DataGuardError::InvalidInput`] if `conversation_summary`
    /// exceeds 4096 characters.
    pub fn new(agent_id: impl Into<String>) -> Result<Self, DataGuardError> {
        Ok(Self {
            agent_id: agent_id.into(),
            session_id: ids::new_id(),
            tenant_id: default_tenant(),
            user_id: None,
            conversation_summary: String::new(),
            prior_decisions: Vec::new(),
            timestamp: ids::now(),
        })
    }

    /// Set the conversation summary, validating its length.
    pub fn with_conversation_summary(
        mut self,
        summary: impl Into<String>,
    ) -> Result<Self, DataGuardError> {
        let summary = summary.into();
        if summary.len() > Self::MAX_SUMMARY_LEN {
            return Err(DataGuardError::InvalidInput(format!(
                "conversation_summary must be at most {} characters",
                Self::MAX_SUMMARY_LEN
            )));
        }
        self.conversation_summary = summary;
        Ok(self)
    }

    /// Set the tenant id.
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }
}

/// Post-execution outcome reported back for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Links back to the original proposal.
    pub proposal_id: Uuid,
    /// Tool name the outcome pertains to.
    pub tool_name: String,
    /// Whether the tool call succeeded.
    pub success: bool,
    /// Structured response data, if any.
    #[serde(default)]
    pub response_data: Option<serde_json::Value>,
    /// Error message, if the call failed.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Execution duration in milliseconds, if measured.
    #[serde(default)]
    pub execution_duration_ms: Option<u64>,
    /// When this outcome was reported.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}
