//! Compiled pattern tables for PII and prompt-injection detection.

use once_cell::sync::Lazy;
use regex::Regex;

/// A single named detection pattern.
pub(crate) struct Pattern {
    pub(crate) id: &'static str,
    pub(crate) regex: Regex,
    /// Non-empty only for PII patterns, which are redactable.
    pub(crate) replacement: &'static str,
    /// Literal matches to ignore, for exclusions the `regex` crate can't
    /// express directly (it has no look-around support).
    pub(crate) excludes: &'static [&'static str],
}

impl Pattern {
    /// Whether `matched` is a literal this pattern should ignore.
    pub(crate) fn is_excluded(&self, matched: &str) -> bool {
        self.excludes.contains(&matched)
    }
}

fn compile(id: &'static str, pattern: &str, replacement: &'static str) -> Pattern {
    compile_excluding(id, pattern, replacement, &[])
}

fn compile_excluding(
    id: &'static str,
    pattern: &str,
    replacement: &'static str,
    excludes: &'static [&'static str],
) -> Pattern {
    Pattern {
        id,
        regex: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {id}: {e}")),
        replacement,
        excludes,
    }
}

pub(crate) static PII_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        compile("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "[SSN REDACTED]"),
        compile(
            "email",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            "[EMAIL REDACTED]",
        ),
        compile(
            "credit_card",
            r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
            "[CARD REDACTED]",
        ),
        compile(
            "password_literal",
            r"(?i)\b(?:password|passwd|pwd)\s*[=:]\s*\S+",
            "[PASSWORD REDACTED]",
        ),
        compile(
            "phone_us",
            r"\(?\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b",
            "[PHONE REDACTED]",
        ),
        compile(
            "phone_intl",
            r"\+\d{1,3}[\s.-]\d{3,5}[\s.-]\d{3,8}",
            "[PHONE REDACTED]",
        ),
        compile("aws_key", r"\bAKIA[0-9A-Z]{16}\b", "[AWS KEY REDACTED]"),
        compile(
            "aws_secret",
            r"(?i)aws_secret_access_key\s*[=:]\s*\S+",
            "[AWS SECRET REDACTED]",
        ),
        compile(
            "jwt_token",
            r"\beyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\b",
            "[JWT REDACTED]",
        ),
        compile_excluding(
            "ipv4_address",
            concat!(
                r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}",
                r"(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b",
            ),
            "[IP REDACTED]",
            &["127.0.0.1", "0.0.0.0"],
        ),
        compile("date_of_birth", r"(?i)\bdob\s*[=:]\s*\S+", "[DOB REDACTED]"),
        compile(
            "private_key_header",
            r"-----BEGIN\s[\w\s]*PRIVATE\sKEY-----",
            "[PRIVATE KEY REDACTED]",
        ),
    ]
});

pub(crate) static INJECTION_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        compile(
            "ignore_instructions",
            r"(?i)ignore\s+(?:previous|all|prior|above)\s+(?:instructions?|prompts?)",
            "",
        ),
        compile("role_override", r"(?i)you\s+are\s+now\s+", ""),
        compile(
            "system_prompt_fake",
            r"(?im)^(?:system|assistant)\s*:\s*",
            "",
        ),
        compile(
            "override_instructions",
            r"(?i)override\s+(?:instructions?|policy|rules?|guidelines?)",
            "",
        ),
        compile(
            "forget_instructions",
            r"(?i)forget\s+(?:everything|all|your\s+instructions?)",
            "",
        ),
        compile(
            "do_anything_now",
            r"(?i)\b(?:DAN|do\s+anything\s+now)\b",
            "",
        ),
        compile(
            "delimiter_injection",
            r"(?i)(?:```\s*system|---\s*instruction|###\s*admin)",
            "",
        ),
        compile(
            "pretend_mode",
            r"(?i)pretend\s+you\s+have\s+no\s+(?:rules|restrictions|limits)",
            "",
        ),
        compile(
            "disregard_prompt",
            r"(?i)disregard\s+(?:all\s+)?(?:previous|prior|above)",
            "",
        ),
        compile(
            "reveal_instructions",
            r"(?i)(?:reveal|show|output|print)\s+(?:your\s+)?(?:system\s+prompt|instructions?)",
            "",
        ),
        compile(
            "concatenation_attack",
            r"(?i)concatenate\s+(?:previous\s+)?system\s+output",
            "",
        ),
    ]
});
