//! The quick regex-based score a [`crate::HeuristicScorer`] computes
//! before (or instead of) any external assessment.
//!
//! Reuses `dataguard-detectors`' full pattern tables and
//! `collect_all_text_fields` rather than a smaller private set, so a
//! string that would redact as PII also raises risk as PII.

use dataguard_core::{ToolCallContext, ToolCallProposal};

pub(crate) const PII_DETECTED: &str = "pii_detected";
pub(crate) const PROMPT_INJECTION_SUSPECTED: &str = "prompt_injection_suspected";
pub(crate) const HIGH_IMPACT_CATEGORY: &str = "high_impact_category";

/// Returns the heuristic score (capped at 100) and the flags that fired.
pub(crate) fn heuristic_score(
    proposal: &ToolCallProposal,
    context: &ToolCallContext,
) -> (u8, Vec<String>) {
    let mut score: u32 = 0;
    let mut flags = Vec::new();

    let text = dataguard_detectors::collect_all_text_fields(
        &proposal.tool_args,
        &context.conversation_summary,
        &proposal.intended_outcome,
    );

    let pii = dataguard_detectors::scan_for_pii(&text);
    if pii.found {
        score += 25 + 5 * (pii.pattern_ids.len() as u32 - 1);
        flags.push(PII_DETECTED.to_string());
    }

    let injection = dataguard_detectors::scan_for_injection(&text);
    if injection.found {
        score += 65;
        flags.push(PROMPT_INJECTION_SUSPECTED.to_string());
    }

    if matches!(
        proposal.tool_category,
        dataguard_core::ToolCategory::Payment | dataguard_core::ToolCategory::Auth
    ) {
        score += 15;
        flags.push(HIGH_IMPACT_CATEGORY.to_string());
    }

    (score.min(100) as u8, flags)
}
