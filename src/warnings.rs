//! Domain Warning System: flags geophysically meaningless interpretations
//! that are nonetheless statistically well-formed, e.g. comparing raw
//! amplitude values across two different surveys.
//!
//! Grounded in `original_source/src/domain_warnings.py`'s
//! `DomainWarningSystem`. spec.md §9's third Open Question notes that the
//! Python original builds this system but never composes it into any
//! response path — it exists only as dead weight next to the tools that
//! could use it. Decision (recorded in DESIGN.md): keep it a linting
//! utility an LLM caller invokes deliberately via [`crate::server`]'s
//! `check_domain_warnings` tool, rather than a silent gate that rewrites or
//! blocks other tools' output. Nothing in spec.md asks any tool to mutate
//! another tool's result, and a gateway whose whole design is "every
//! capability is a named tool call" should not grow one hidden exception.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

static CROSS_SURVEY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(compare|comparison|versus|vs\.?)\b.*\b(survey|surveys)\b").unwrap(),
        Regex::new(r"(?i)\b(higher|lower|greater|less|brighter|stronger)\b.*\bthan\b").unwrap(),
        Regex::new(r"(?i)\b\w+\s+(?:has|shows|displays)\s+(?:higher|lower|greater)\b").unwrap(),
    ]
});

const AMPLITUDE_KEYWORDS: &[&str] = &[
    "amplitude", "amplitudes", "brightness", "brighter", "stronger", "max", "maximum", "min",
    "minimum", "mean", "rms", "value", "values",
];

const SAFE_COMPARISON_KEYWORDS: &[&str] = &[
    "normalized", "normalization", "rms-normalized", "z-score", "snr", "signal-to-noise",
    "frequency", "bandwidth", "continuity", "semblance", "coherence", "quality",
];

/// Severity of a [`DomainWarning`], matching the Python original's free-text
/// `severity` field but closed over a fixed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// A single detected domain warning.
#[derive(Debug, Clone, Serialize)]
pub struct DomainWarning {
    pub warning_type: &'static str,
    pub severity: WarningSeverity,
    pub message: String,
    pub surveys: Vec<String>,
    pub recommendation: &'static str,
}

const SAFE_COMPARISON_RECOMMENDATION: &str = "cross-survey comparisons must use domain-appropriate metrics (SNR, frequency, continuity) or RMS/z-score normalized amplitudes, and must always state units or \"(unitless)\" explicitly — raw amplitude values carry no absolute physical meaning across surveys with different acquisition gain or processing scaling";

/// Detects whether `context` describes a cross-survey raw-amplitude
/// comparison, matching `detect_cross_survey_comparison`. Requires at least
/// two distinct `survey_ids` to be in play, an amplitude-related keyword,
/// and a comparison pattern, with no safe-comparison keyword present —
/// mentioning SNR or a normalization method alongside "higher/lower" is not
/// flagged.
#[must_use]
pub fn detect_cross_survey_comparison(context: &str, survey_ids: &HashSet<String>) -> Option<DomainWarning> {
    if survey_ids.len() < 2 {
        return None;
    }
    let lower = context.to_lowercase();

    let has_amplitude_keyword = AMPLITUDE_KEYWORDS.iter().any(|kw| lower.contains(kw));
    let has_comparison_pattern = CROSS_SURVEY_PATTERNS.iter().any(|re| re.is_match(&lower));
    let has_safe_keyword = SAFE_COMPARISON_KEYWORDS.iter().any(|kw| lower.contains(kw));

    if has_amplitude_keyword && has_comparison_pattern && !has_safe_keyword {
        let mut surveys: Vec<String> = survey_ids.iter().cloned().collect();
        surveys.sort();
        return Some(DomainWarning {
            warning_type: "cross_survey_amplitude_comparison",
            severity: WarningSeverity::Critical,
            message: format!(
                "raw seismic amplitude has no absolute physical unit and cannot be compared between surveys {}",
                surveys.join(", ")
            ),
            surveys,
            recommendation: SAFE_COMPARISON_RECOMMENDATION,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surveys(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_unsafe_raw_amplitude_comparison() {
        let warning = detect_cross_survey_comparison(
            "Sepia has higher amplitudes than BS500",
            &surveys(&["sepia", "bs500"]),
        );
        assert!(warning.is_some());
        assert_eq!(warning.unwrap().severity, WarningSeverity::Critical);
    }

    #[test]
    fn allows_normalized_comparison() {
        let warning = detect_cross_survey_comparison(
            "after RMS normalization, Sepia shows similar amplitude variance to BS500",
            &surveys(&["sepia", "bs500"]),
        );
        assert!(warning.is_none());
    }

    #[test]
    fn allows_snr_comparison() {
        let warning = detect_cross_survey_comparison(
            "Sepia has higher SNR than BS500",
            &surveys(&["sepia", "bs500"]),
        );
        assert!(warning.is_none());
    }

    #[test]
    fn single_survey_is_never_flagged() {
        let warning = detect_cross_survey_comparison(
            "Sepia inline 55000 shows higher amplitude than inline 54000",
            &surveys(&["sepia"]),
        );
        assert!(warning.is_none());
    }

    #[test]
    fn unrelated_text_is_not_flagged() {
        let warning = detect_cross_survey_comparison(
            "extract inline 1000 from Sepia and BS500",
            &surveys(&["sepia", "bs500"]),
        );
        assert!(warning.is_none());
    }
}
