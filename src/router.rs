//! Bulk Router (C6): detects when a natural-language instruction describes
//! a bulk operation that should go through the Agent Manager rather than a
//! single extraction tool call.
//!
//! Grounded verbatim in `original_source/src/bulk_operation_router.py`'s
//! `BulkOperationRouter`. The regex patterns and the "3+ four-plus-digit
//! numbers" / keyword heuristics are kept as close to the original as
//! idiomatic Rust allows — this component's whole value is that it agrees
//! with the prototype on what counts as "bulk".

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static EVERY_N_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)every\s+\d+").unwrap());

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:from|start(?:ing)?\s+at)\s+\d+\s+(?:to|through|until)\s+\d+").unwrap()
});

static SKIP_SPACING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:skip|spacing)\b").unwrap());

static ALL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\ball\s+(?:inline|crossline|timeslice)s?\b").unwrap());

static FOUR_DIGIT_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4,}\b").unwrap());

static MULTIPLE_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:multiple|several|various|many)\b").unwrap());

/// Why an instruction was classified as bulk, mirroring
/// `_create_routing_info`'s `detected_pattern` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedPattern {
    EveryN,
    Range,
    SkipOrSpacing,
    AllOfKind,
    ManyExplicitNumbers,
    MultipleKeyword,
}

impl DetectedPattern {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EveryN => "instruction uses an \"every N\" stride pattern",
            Self::Range => "instruction describes a range with from/to or start/through wording",
            Self::SkipOrSpacing => "instruction mentions skip or spacing between extractions",
            Self::AllOfKind => "instruction requests all inlines, crosslines, or timeslices",
            Self::ManyExplicitNumbers => "instruction lists three or more explicit four-plus-digit numbers",
            Self::MultipleKeyword => "instruction uses a multiplicity keyword (multiple/several/various/many)",
        }
    }
}

/// Routing info handed back to the caller instead of executing the
/// original single-extraction tool, matching `_create_routing_info`.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingInfo {
    pub detected_pattern: DetectedPattern,
    pub original_tool: String,
    pub original_arguments: serde_json::Value,
    pub instruction: String,
    pub survey_id: Option<String>,
    pub recommendation: &'static str,
    pub reason: &'static str,
    pub auto_execute: bool,
}

pub struct BulkOperationRouter;

impl BulkOperationRouter {
    /// Checks whether `instruction` describes a bulk extraction pattern,
    /// matching `detect_bulk_pattern`/`_detect_extraction_bulk`. Patterns
    /// are checked in the same priority order as the Python original so
    /// the reported `detected_pattern` is deterministic when more than one
    /// matches.
    #[must_use]
    pub fn detect_bulk_pattern(instruction: &str) -> Option<DetectedPattern> {
        if EVERY_N_PATTERN.is_match(instruction) {
            return Some(DetectedPattern::EveryN);
        }
        if RANGE_PATTERN.is_match(instruction) {
            return Some(DetectedPattern::Range);
        }
        if SKIP_SPACING_PATTERN.is_match(instruction) {
            return Some(DetectedPattern::SkipOrSpacing);
        }
        if ALL_PATTERN.is_match(instruction) {
            return Some(DetectedPattern::AllOfKind);
        }
        if FOUR_DIGIT_NUMBER.find_iter(instruction).count() >= 3 {
            return Some(DetectedPattern::ManyExplicitNumbers);
        }
        if MULTIPLE_KEYWORDS.is_match(instruction) {
            return Some(DetectedPattern::MultipleKeyword);
        }
        None
    }

    /// Whether a single-extraction tool call should be blocked in favor of
    /// routing to the Agent Manager, matching `should_block_single_call`.
    #[must_use]
    pub fn should_block_single_call(instruction: &str) -> bool {
        Self::detect_bulk_pattern(instruction).is_some()
    }

    /// Builds the routing info returned in place of executing
    /// `original_tool`, matching `_create_routing_info`.
    #[must_use]
    pub fn create_routing_info(
        pattern: DetectedPattern,
        original_tool: &str,
        original_arguments: serde_json::Value,
        instruction: &str,
        survey_id: Option<String>,
    ) -> RoutingInfo {
        RoutingInfo {
            reason: pattern.reason(),
            detected_pattern: pattern,
            original_tool: original_tool.to_string(),
            original_arguments,
            instruction: instruction.to_string(),
            survey_id,
            recommendation: "use_agent_start_extraction",
            auto_execute: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_every_n_pattern() {
        let pattern = BulkOperationRouter::detect_bulk_pattern("extract every 10 inline from 1000 to 2000");
        assert_eq!(pattern, Some(DetectedPattern::EveryN));
    }

    #[test]
    fn detects_range_pattern_without_skip_or_spacing() {
        let pattern = BulkOperationRouter::detect_bulk_pattern("extract crosslines from 1000 to 2000");
        assert_eq!(pattern, Some(DetectedPattern::Range));
    }

    #[test]
    fn detects_many_explicit_numbers_with_five_digit_lines() {
        let pattern = BulkOperationRouter::detect_bulk_pattern("inlines 51000, 52000, 53000");
        assert_eq!(pattern, Some(DetectedPattern::ManyExplicitNumbers));
    }

    #[test]
    fn detects_all_of_kind() {
        let pattern = BulkOperationRouter::detect_bulk_pattern("give me all inlines in this survey");
        assert_eq!(pattern, Some(DetectedPattern::AllOfKind));
    }

    #[test]
    fn detects_many_explicit_numbers() {
        let pattern = BulkOperationRouter::detect_bulk_pattern("crosslines 1000, 1050, 1100, 1150");
        assert_eq!(pattern, Some(DetectedPattern::ManyExplicitNumbers));
    }

    #[test]
    fn detects_multiplicity_keyword() {
        let pattern = BulkOperationRouter::detect_bulk_pattern("pull several crosslines near the fault");
        assert_eq!(pattern, Some(DetectedPattern::MultipleKeyword));
    }

    #[test]
    fn single_extraction_instruction_is_not_bulk() {
        let pattern = BulkOperationRouter::detect_bulk_pattern("extract inline 1500 from gulf_mexico_2023");
        assert_eq!(pattern, None);
    }

    #[test]
    fn should_block_single_call_matches_detect_bulk_pattern() {
        assert!(BulkOperationRouter::should_block_single_call("every 5 crosslines"));
        assert!(!BulkOperationRouter::should_block_single_call("inline 1200"));
    }

    #[test]
    fn routing_info_carries_recommendation() {
        let info = BulkOperationRouter::create_routing_info(
            DetectedPattern::EveryN,
            "get_inline_slice",
            serde_json::json!({"inline": 1000}),
            "every 10 inline",
            Some("demo_gulf_mexico_2023".to_string()),
        );
        assert_eq!(info.recommendation, "use_agent_start_extraction");
        assert!(info.auto_execute);
    }
}
