//! The eleven canonical rewrite rules, in registration order.

use dataguard_core::ToolArgs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::args::{map_strings_in_args, str_field, with_field};
use crate::RewriteRule;

fn is_shell_tool(tool_name: &str) -> bool {
    matches!(tool_name, "bash" | "shell" | "code_execution")
}

// -- Rule 1: strip-force-flags ----------------------------------------------

static FORCE_FLAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s--force\b|\s-f\b").unwrap());

fn strip_force_applies(tool_name: &str, args: &ToolArgs) -> bool {
    is_shell_tool(tool_name) && FORCE_FLAG.is_match(str_field(args, "command"))
}

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn strip_force_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    let cmd = str_field(args, "command");
    let cmd = Regex::new(r"\s--force\b").unwrap().replace_all(cmd, " ");
    let cmd = Regex::new(r"\s-f\b").unwrap().replace_all(&cmd, " ");
    let cmd = WHITESPACE_RUN.replace_all(cmd.trim(), " ");
    (
        tool_name.to_string(),
        with_field(args, "command", json!(cmd.into_owned())),
    )
}

// -- Rule 2: sandbox-code-exec -----------------------------------------------

fn sandbox_applies(tool_name: &str, _args: &ToolArgs) -> bool {
    matches!(tool_name, "code_execution" | "exec" | "run_code")
}

fn sandbox_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    let mut out = args.clone();
    out.insert("sandbox".to_string(), json!(true));
    out.insert("read_only".to_string(), json!(true));
    (tool_name.to_string(), out)
}

// -- Rule 3: truncate-recipients ---------------------------------------------

fn truncate_recipients_applies(tool_name: &str, args: &ToolArgs) -> bool {
    if !matches!(tool_name, "send_email" | "message_send" | "email") {
        return false;
    }
    args.get("recipients")
        .and_then(Value::as_array)
        .is_some_and(|r| r.len() > 5)
}

fn truncate_recipients_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    let recipients = args
        .get("recipients")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let original_len = recipients.len();
    let truncated: Vec<Value> = recipients.into_iter().take(5).collect();
    let mut out = args.clone();
    out.insert("recipients".to_string(), json!(truncated));
    out.insert(
        "_guardian_note".to_string(),
        json!(format!("Truncated from {original_len} to 5 recipients.")),
    );
    (tool_name.to_string(), out)
}

// -- Rule 4: redact-secrets-in-args -------------------------------------------

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(password|passwd|pwd)\s*[=:]\s*\S+").unwrap(),
        Regex::new(r"(?i)(api[_-]?key|apikey)\s*[=:]\s*\S+").unwrap(),
        Regex::new(r"(?i)(secret|token|bearer)\s*[=:]\s*\S+").unwrap(),
        Regex::new(r"(?i)(authorization)\s*[=:]\s*\S+").unwrap(),
        Regex::new(r"\b(sk-[a-zA-Z0-9]{20,})\b").unwrap(),
        Regex::new(r"\b(ghp_[a-zA-Z0-9]{36,})\b").unwrap(),
        Regex::new(r"\b(xoxb-[a-zA-Z0-9\-]+)\b").unwrap(),
    ]
});

fn redact_secrets_in(text: &str) -> String {
    let mut result = text.to_string();
    for pattern in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[REDACTED]").into_owned();
    }
    result
}

fn redact_secrets_applies(_tool_name: &str, args: &ToolArgs) -> bool {
    let serialized = dataguard_core::serialize_args_sorted(args);
    SECRET_PATTERNS.iter().any(|p| p.is_match(&serialized))
}

fn redact_secrets_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    (tool_name.to_string(), map_strings_in_args(args, &redact_secrets_in))
}

// -- Rule 5: downgrade-write-to-dryrun ----------------------------------------

static WRITE_COMMANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(mv|cp|rm|mkdir|touch|chmod|chown|git\s+push|git\s+reset)\b").unwrap());
static GIT_PUSH_RESET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bgit\s+(push|reset)\b").unwrap());
static GIT_PUSH_RESET_CAPTURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(git\s+(?:push|reset))").unwrap());

fn dryrun_applies(tool_name: &str, args: &ToolArgs) -> bool {
    if !matches!(tool_name, "bash" | "shell" | "file_system") {
        return false;
    }
    WRITE_COMMANDS.is_match(str_field(args, "command"))
}

fn dryrun_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    let cmd = str_field(args, "command");
    let new_cmd = if GIT_PUSH_RESET.is_match(cmd) {
        GIT_PUSH_RESET_CAPTURE
            .replace(cmd, "$1 --dry-run")
            .into_owned()
    } else {
        format!("echo '[DRY RUN] Would execute:' && echo '{cmd}'")
    };
    (tool_name.to_string(), with_field(args, "command", json!(new_cmd)))
}

// -- Rule 6: replace-wildcard-delete ------------------------------------------

static WILDCARD_RM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brm\s+.*\*").unwrap());
static DELETE_FROM_UNBOUNDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)delete\s+from\s+\S+\s*$").unwrap());
static RM_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brm\b").unwrap());

fn wildcard_delete_applies(tool_name: &str, args: &ToolArgs) -> bool {
    match tool_name {
        "bash" | "shell" => WILDCARD_RM.is_match(str_field(args, "command")),
        "database" | "sql" => DELETE_FROM_UNBOUNDED.is_match(str_field(args, "query").trim()),
        _ => false,
    }
}

fn wildcard_delete_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    match tool_name {
        "bash" | "shell" => {
            let cmd = RM_WORD.replace_all(str_field(args, "command"), "ls").into_owned();
            let mut out = args.clone();
            out.insert("command".to_string(), json!(cmd));
            out.insert(
                "_guardian_note".to_string(),
                json!("Wildcard delete converted to ls preview."),
            );
            (tool_name.to_string(), out)
        }
        "database" | "sql" => {
            let query = str_field(args, "query").trim_end().trim_end_matches(';');
            let query = format!("{query} LIMIT 1;");
            (tool_name.to_string(), with_field(args, "query", json!(query)))
        }
        _ => (tool_name.to_string(), args.clone()),
    }
}

// -- Rule 7: cap-http-timeout --------------------------------------------------

const MAX_TIMEOUT_MS: u64 = 30_000;

fn is_http_tool(tool_name: &str) -> bool {
    matches!(tool_name, "http_request" | "http_fetch" | "curl")
}

fn cap_timeout_applies(tool_name: &str, args: &ToolArgs) -> bool {
    if !is_http_tool(tool_name) {
        return false;
    }
    match args.get("timeout") {
        None => true,
        Some(v) => v.as_f64().is_some_and(|t| t > MAX_TIMEOUT_MS as f64),
    }
}

fn cap_timeout_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    (
        tool_name.to_string(),
        with_field(args, "timeout", json!(MAX_TIMEOUT_MS)),
    )
}

// -- Rule 8: enforce-https ------------------------------------------------------

fn enforce_https_applies(tool_name: &str, args: &ToolArgs) -> bool {
    if !is_http_tool(tool_name) {
        return false;
    }
    let url = str_field(args, "url");
    url.starts_with("http://") && !url.contains("localhost") && !url.contains("127.0.0.1")
}

fn enforce_https_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    let url = str_field(args, "url").replacen("http://", "https://", 1);
    (tool_name.to_string(), with_field(args, "url", json!(url)))
}

// -- Rule 9: limit-query-rows ----------------------------------------------------

static SELECT_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bSELECT\b").unwrap());
static LIMIT_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+").unwrap());
const DEFAULT_ROW_LIMIT: u32 = 1000;

fn limit_query_applies(tool_name: &str, args: &ToolArgs) -> bool {
    if !matches!(tool_name, "database" | "sql" | "query") {
        return false;
    }
    let query = str_field(args, "query");
    SELECT_KEYWORD.is_match(query) && !LIMIT_KEYWORD.is_match(query)
}

fn limit_query_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    let query = str_field(args, "query").trim_end().trim_end_matches(';');
    let query = format!("{query} LIMIT {DEFAULT_ROW_LIMIT};");
    (tool_name.to_string(), with_field(args, "query", json!(query)))
}

// -- Rule 10: neutralize-sudo ------------------------------------------------------

static SUDO_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsudo\s+").unwrap());
static SUDO_PRESENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsudo\s").unwrap());

fn neutralize_sudo_applies(tool_name: &str, args: &ToolArgs) -> bool {
    is_shell_tool(tool_name) && SUDO_PRESENT.is_match(str_field(args, "command"))
}

fn neutralize_sudo_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    let cmd = SUDO_PREFIX.replace_all(str_field(args, "command"), "").into_owned();
    (tool_name.to_string(), with_field(args, "command", json!(cmd)))
}

// -- Rule 11: redact-pii ------------------------------------------------------------

fn redact_pii_applies(_tool_name: &str, args: &ToolArgs) -> bool {
    dataguard_detectors::scan_for_pii(&dataguard_core::serialize_args_sorted(args)).found
}

fn redact_pii_in(text: &str) -> String {
    dataguard_detectors::redact_pii(text).0
}

fn redact_pii_transform(tool_name: &str, args: &ToolArgs) -> (String, ToolArgs) {
    (tool_name.to_string(), map_strings_in_args(args, &redact_pii_in))
}

/// Build the eleven default rules, in the order the orchestrator
/// should consider them.
pub(crate) fn default_rules() -> Vec<RewriteRule> {
    vec![
        RewriteRule {
            rule_id: "strip-force-flags",
            description: "Remove --force / -f from shell commands",
            applies_to: strip_force_applies,
            transform: strip_force_transform,
        },
        RewriteRule {
            rule_id: "sandbox-code-exec",
            description: "Inject sandbox/read-only flags into code execution",
            applies_to: sandbox_applies,
            transform: sandbox_transform,
        },
        RewriteRule {
            rule_id: "truncate-recipients",
            description: "Cap email recipients at 5",
            applies_to: truncate_recipients_applies,
            transform: truncate_recipients_transform,
        },
        RewriteRule {
            rule_id: "redact-secrets",
            description: "Replace secret values with [REDACTED]",
            applies_to: redact_secrets_applies,
            transform: redact_secrets_transform,
        },
        RewriteRule {
            rule_id: "downgrade-write-to-dryrun",
            description: "Add --dry-run or preview mode to write operations",
            applies_to: dryrun_applies,
            transform: dryrun_transform,
        },
        RewriteRule {
            rule_id: "replace-wildcard-delete",
            description: "Convert wildcard deletes to preview/limited operations",
            applies_to: wildcard_delete_applies,
            transform: wildcard_delete_transform,
        },
        RewriteRule {
            rule_id: "cap-http-timeout",
            description: "Enforce max 30s timeout on HTTP requests",
            applies_to: cap_timeout_applies,
            transform: cap_timeout_transform,
        },
        RewriteRule {
            rule_id: "enforce-https",
            description: "Upgrade http:// to https://",
            applies_to: enforce_https_applies,
            transform: enforce_https_transform,
        },
        RewriteRule {
            rule_id: "limit-query-rows",
            description: "Add LIMIT 1000 to unbounded SELECT queries",
            applies_to: limit_query_applies,
            transform: limit_query_transform,
        },
        RewriteRule {
            rule_id: "neutralize-sudo",
            description: "Strip sudo prefix from commands",
            applies_to: neutralize_sudo_applies,
            transform: neutralize_sudo_transform,
        },
        RewriteRule {
            rule_id: "redact-pii",
            description: "Auto-redact PII (SSNs, emails, phones, etc.) in tool arguments",
            applies_to: redact_pii_applies,
            transform: redact_pii_transform,
        },
    ]
}
