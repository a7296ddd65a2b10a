//! Integrity Engine (C5): independently recomputes and cross-checks claims
//! an agent or upstream tool made about extracted data.
//!
//! Grounded in `original_source/src/data_integrity.py`'s `DataIntegrityAgent`.
//! Every verdict here is *data*, never a [`crate::error::GatewayError`] —
//! a FAIL is a successful tool call that reports a problem, matching
//! spec.md §7's explicit carve-out for `IntegrityViolation`.

use crate::types::{AxisDescriptor, Statistics};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Every numeric field at a tool-server boundary must carry an explicit
/// unit. Dimensionless quantities use this constant rather than an empty
/// string, so "no unit" is never indistinguishable from "unit omitted by
/// mistake".
pub const UNITLESS: &str = "unitless";

/// A pass/fail/unknown verdict, matching `ValidationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub verdict: Verdict,
    pub message: String,
    /// Populated on FAIL: what the statement should have said.
    pub corrected_statement: Option<String>,
}

/// Recomputes statistics from the raw buffer and compares them to a
/// previously claimed [`Statistics`] within a relative tolerance, matching
/// `validate_statistics`.
#[must_use]
pub fn validate_statistics(
    claimed: &Statistics,
    recomputed: &Statistics,
    tolerance: f64,
) -> ValidationResult {
    if recomputed.sample_count == 0 {
        return ValidationResult {
            verdict: Verdict::Unknown,
            message: "no valid samples to validate against".to_string(),
            corrected_statement: None,
        };
    }

    let checks: [(&str, f64, f64); 6] = [
        ("min", claimed.min, recomputed.min),
        ("max", claimed.max, recomputed.max),
        ("mean", claimed.mean, recomputed.mean),
        ("median", claimed.median, recomputed.median),
        ("std", claimed.std, recomputed.std),
        ("rms", claimed.rms, recomputed.rms),
    ];

    let mismatches: Vec<String> = checks
        .iter()
        .filter(|(_, claimed, actual)| !within_tolerance(*claimed, *actual, tolerance))
        .map(|(name, claimed, actual)| format!("{name}: claimed {claimed:.4}, recomputed {actual:.4}"))
        .collect();

    if mismatches.is_empty() {
        ValidationResult {
            verdict: Verdict::Pass,
            message: "claimed statistics match recomputed values within tolerance".to_string(),
            corrected_statement: None,
        }
    } else {
        ValidationResult {
            verdict: Verdict::Fail,
            message: format!("statistics mismatch: {}", mismatches.join("; ")),
            corrected_statement: Some(format!(
                "min={:.4}, max={:.4}, mean={:.4}, median={:.4}, std={:.4}, rms={:.4}",
                recomputed.min, recomputed.max, recomputed.mean, recomputed.median, recomputed.std, recomputed.rms
            )),
        }
    }
}

fn within_tolerance(claimed: f64, actual: f64, tolerance: f64) -> bool {
    let scale = actual.abs().max(1e-9);
    ((claimed - actual) / scale).abs() <= tolerance
}

/// Checks whether claimed inline/crossline/sample coordinates fall within
/// their survey's axis bounds, matching `verify_coordinates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateCheck {
    pub axis_name: String,
    pub value: f64,
    pub in_bounds: bool,
    pub issue: Option<String>,
}

#[must_use]
pub fn verify_coordinates(axes: &[(&str, &AxisDescriptor, f64)]) -> Vec<CoordinateCheck> {
    axes.iter()
        .map(|(label, axis, value)| {
            let in_bounds = *value >= axis.coordinate_min && *value <= axis.coordinate_max;
            let issue = if in_bounds {
                None
            } else {
                Some(format!(
                    "{label} value {value} is outside axis range [{}, {}]",
                    axis.coordinate_min, axis.coordinate_max
                ))
            };
            CoordinateCheck {
                axis_name: (*label).to_string(),
                value: *value,
                in_bounds,
                issue,
            }
        })
        .collect()
}

/// Severity of a failed consistency rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
}

/// Runs the six internal-consistency rules over a statistics block,
/// matching `check_statistical_consistency`: `min <= mean <= max`, `min <=
/// median <= max`, `p25 <= median <= p75`, percentiles monotonic, `std >=
/// 0`, `rms >= 0.9 * |mean|`.
#[must_use]
pub fn check_statistical_consistency(stats: &Statistics) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    if !(stats.min <= stats.mean && stats.mean <= stats.max) {
        issues.push(ConsistencyIssue {
            rule: "min_mean_max_order".to_string(),
            severity: Severity::High,
            message: format!("expected min <= mean <= max, got {} <= {} <= {}", stats.min, stats.mean, stats.max),
        });
    }

    if !(stats.min <= stats.median && stats.median <= stats.max) {
        issues.push(ConsistencyIssue {
            rule: "min_median_max_order".to_string(),
            severity: Severity::High,
            message: format!("expected min <= median <= max, got {} <= {} <= {}", stats.min, stats.median, stats.max),
        });
    }

    if !(stats.p25 <= stats.median && stats.median <= stats.p75) {
        issues.push(ConsistencyIssue {
            rule: "iqr_contains_median".to_string(),
            severity: Severity::High,
            message: format!("expected p25 <= median <= p75, got {} <= {} <= {}", stats.p25, stats.median, stats.p75),
        });
    }

    let percentiles = [stats.p10, stats.p25, stats.p50, stats.p75, stats.p90];
    if !percentiles.windows(2).all(|w| w[0] <= w[1]) {
        issues.push(ConsistencyIssue {
            rule: "percentiles_monotonic".to_string(),
            severity: Severity::High,
            message: format!("percentiles are not monotonically non-decreasing: {percentiles:?}"),
        });
    }

    if stats.std < 0.0 {
        issues.push(ConsistencyIssue {
            rule: "std_non_negative".to_string(),
            severity: Severity::Critical,
            message: format!("std must be >= 0, got {}", stats.std),
        });
    }

    if stats.rms < 0.9 * stats.mean.abs() {
        issues.push(ConsistencyIssue {
            rule: "rms_lower_bound".to_string(),
            severity: Severity::Medium,
            message: format!("rms ({}) is implausibly small relative to |mean| ({})", stats.rms, stats.mean.abs()),
        });
    }

    issues
}

/// Overall severity across a set of consistency issues: the maximum, or
/// `None` if there are no issues.
#[must_use]
pub fn overall_severity(issues: &[ConsistencyIssue]) -> Option<Severity> {
    issues.iter().map(|i| i.severity).max()
}

/// SHA-256 fingerprint of extracted bytes plus the parameters that produced
/// them, matching `create_provenance_record`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFingerprint {
    pub hash: String,
    pub algorithm: &'static str,
    pub shape: Vec<u64>,
    pub dtype: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub extraction_timestamp: chrono::DateTime<chrono::Utc>,
    pub source: String,
    pub extraction_parameters: serde_json::Value,
    pub data_fingerprint: DataFingerprint,
    pub statistics: Statistics,
    pub agent_version: &'static str,
    pub verification_note: &'static str,
}

#[must_use]
pub fn create_provenance_record(
    data: &[f32],
    shape: Vec<u64>,
    source: &str,
    extraction_parameters: serde_json::Value,
    statistics: Statistics,
) -> ProvenanceRecord {
    let mut hasher = Sha256::new();
    for sample in data {
        hasher.update(sample.to_le_bytes());
    }
    let hash = format!("{:x}", hasher.finalize());

    ProvenanceRecord {
        extraction_timestamp: chrono::Utc::now(),
        source: source.to_string(),
        extraction_parameters,
        data_fingerprint: DataFingerprint {
            hash,
            algorithm: "sha256",
            shape,
            dtype: "f32",
        },
        statistics,
        agent_version: env!("CARGO_PKG_VERSION"),
        verification_note: "statistics and fingerprint were computed independently from the raw buffer, not copied from the caller's claim",
    }
}

// ─── Extended metadata claim validation (spec.md §4.5 item 5) ─────────────

/// Status for a single field validated against the known metadata bag.
/// `Partial` covers a resolved field whose value is a near-miss (unit
/// mismatch or fuzzy match below exactness but above the noise floor);
/// `NotFound` covers a claimed field that could not be resolved to any
/// known field at all (as opposed to resolving and disagreeing, which is
/// `Fail`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataStatus {
    Pass,
    Partial,
    Fail,
    NotFound,
}

/// The known metadata for a survey, keyed by canonical field name. Built
/// from a [`crate::volume::Survey`] by the tool server; kept separate from
/// that type so this module has no dependency on volume internals.
#[derive(Debug, Clone, Default)]
pub struct MetadataBag {
    fields: Vec<(&'static str, String)>,
}

impl MetadataBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, canonical: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((canonical, value.into()));
        self
    }
}

/// Known aliases for each canonical field, checked in priority order
/// before falling back to case-insensitive exact-name matching. The CRS
/// field's last alias is the pre-declared "search path" spec.md §4.5
/// singles out for carrying a parsed CRS descriptor rather than a plain
/// string.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("name", &["survey_name", "title", "survey"]),
    ("region", &["area", "location", "geography", "basin"]),
    ("data_type", &["type", "acquisition_type", "survey_type"]),
    ("acquisition_date", &["date", "survey_date", "acquired", "acquisition"]),
    ("sample_unit", &["depth_unit", "time_unit", "vertical_unit", "unit"]),
    ("crs", &["coordinate_reference_system", "projection", "spatial_reference", "wkt"]),
];

/// Unit strings treated as equivalent when comparing a claimed value
/// against a known one, keyed by canonical unit.
const UNIT_EQUIVALENCE: &[(&str, &[&str])] = &[
    ("ms", &["ms", "millisecond", "milliseconds"]),
    ("m", &["m", "meter", "meters", "metre", "metres"]),
    ("ft", &["ft", "foot", "feet"]),
    ("index", &["index", "trace", "traces"]),
];

fn canonical_unit(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_lowercase();
    UNIT_EQUIVALENCE
        .iter()
        .find(|(_, aliases)| aliases.contains(&lower.as_str()))
        .map(|(canonical, _)| *canonical)
}

/// Extracts a bare identifier (e.g. `"EPSG:4326"`) from a CRS descriptor
/// that may be presented as a full WKT string, used when `parse_wkt` is
/// requested so a verbose WKT claim still matches a terse known value.
fn parse_crs_descriptor(raw: &str) -> String {
    if let Some(start) = raw.find("EPSG") {
        let tail = &raw[start + 4..];
        let digits: String = tail
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return format!("EPSG:{digits}");
        }
    }
    raw.trim().to_string()
}

/// Resolves a claimed field name to a canonical field in `bag`, trying (i)
/// direct key, (ii) known aliases, (iii) the same aliases again for
/// pre-declared search paths (aliases already cover this for the fields
/// that have one), (iv) case-insensitive match against every known
/// canonical name. Returns the canonical name and resolved value.
fn resolve_field<'a>(bag: &'a MetadataBag, claimed_field: &str) -> Option<(&'static str, &'a str)> {
    let lower = claimed_field.to_lowercase();

    if let Some((canonical, value)) = bag.fields.iter().find(|(c, _)| c.eq_ignore_ascii_case(&lower)) {
        return Some((*canonical, value.as_str()));
    }

    for (canonical, aliases) in FIELD_ALIASES {
        if aliases.iter().any(|a| a.eq_ignore_ascii_case(&lower)) {
            if let Some((_, value)) = bag.fields.iter().find(|(c, _)| c == canonical) {
                return Some((canonical, value.as_str()));
            }
        }
    }

    None
}

/// Per-field result of extended metadata claim validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldValidation {
    pub field: String,
    pub status: MetadataStatus,
    pub confidence: f64,
    pub source_path: Option<String>,
    pub suggestions: Vec<String>,
}

/// Validates one claimed `{field: value}` pair against `bag`, matching
/// spec.md §4.5 item 5's resolution order and status taxonomy.
/// `parse_wkt` normalizes both sides of a `crs` comparison through
/// [`parse_crs_descriptor`] before comparing.
#[must_use]
pub fn validate_metadata_field(
    bag: &MetadataBag,
    claimed_field: &str,
    claimed_value: &str,
    parse_wkt: bool,
) -> FieldValidation {
    let Some((canonical, known_value)) = resolve_field(bag, claimed_field) else {
        let suggestions: Vec<String> = bag.fields.iter().map(|(c, _)| (*c).to_string()).collect();
        return FieldValidation {
            field: claimed_field.to_string(),
            status: MetadataStatus::NotFound,
            confidence: 0.0,
            source_path: None,
            suggestions,
        };
    };

    let (claimed_cmp, known_cmp) = if canonical == "crs" && parse_wkt {
        (parse_crs_descriptor(claimed_value), parse_crs_descriptor(known_value))
    } else {
        (claimed_value.to_string(), known_value.to_string())
    };

    if claimed_cmp.eq_ignore_ascii_case(&known_cmp) {
        return FieldValidation {
            field: claimed_field.to_string(),
            status: MetadataStatus::Pass,
            confidence: 1.0,
            source_path: Some(canonical.to_string()),
            suggestions: Vec::new(),
        };
    }

    if let (Some(a), Some(b)) = (canonical_unit(&claimed_cmp), canonical_unit(&known_cmp)) {
        if a == b {
            return FieldValidation {
                field: claimed_field.to_string(),
                status: MetadataStatus::Pass,
                confidence: 1.0,
                source_path: Some(canonical.to_string()),
                suggestions: Vec::new(),
            };
        }
    }

    let score = similarity(&claimed_cmp.to_lowercase(), &known_cmp.to_lowercase());
    if score > 0.6 {
        FieldValidation {
            field: claimed_field.to_string(),
            status: MetadataStatus::Partial,
            confidence: score,
            source_path: Some(canonical.to_string()),
            suggestions: vec![known_cmp],
        }
    } else {
        FieldValidation {
            field: claimed_field.to_string(),
            status: MetadataStatus::Fail,
            confidence: score,
            source_path: Some(canonical.to_string()),
            suggestions: vec![known_cmp],
        }
    }
}

/// Weighted aggregate across per-field results: the mean confidence,
/// weighted `PASS=1.0, PARTIAL=1.0, FAIL=1.0, NOT_FOUND=0.0` (an
/// unresolved field, carrying no comparison signal, is excluded from the
/// score rather than presumed a failure) — `None` when every field was
/// unresolved.
#[must_use]
pub fn aggregate_metadata_score(results: &[FieldValidation]) -> Option<f64> {
    let scored: Vec<f64> = results
        .iter()
        .filter(|r| r.status != MetadataStatus::NotFound)
        .map(|r| r.confidence)
        .collect();
    if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f64>() / scored.len() as f64)
    }
}

/// Token-overlap similarity in `[0, 1]`, used only to rank candidate
/// suggestions — not a claim of linguistic rigor.
fn similarity(a: &str, b: &str) -> f64 {
    let ta: Vec<&str> = a.split_whitespace().collect();
    let tb: Vec<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.iter().filter(|t| tb.contains(t)).count();
    (2 * shared) as f64 / (ta.len() + tb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::compute_statistics;

    fn sample_stats() -> Statistics {
        let data: Vec<f32> = (0..100).map(|i| (i as f32) - 50.0).collect();
        compute_statistics(&data)
    }

    #[test]
    fn validate_statistics_passes_on_exact_match() {
        let stats = sample_stats();
        let result = validate_statistics(&stats, &stats, 0.01);
        assert_eq!(result.verdict, Verdict::Pass);
    }

    #[test]
    fn validate_statistics_fails_on_wrong_mean() {
        let recomputed = sample_stats();
        let mut claimed = recomputed;
        claimed.mean = recomputed.mean + 1000.0;
        let result = validate_statistics(&claimed, &recomputed, 0.01);
        assert_eq!(result.verdict, Verdict::Fail);
        assert!(result.corrected_statement.is_some());
    }

    #[test]
    fn verify_coordinates_flags_out_of_bounds() {
        let axis = AxisDescriptor::new("inline", "index", 1000.0, 2000.0, 1001).unwrap();
        let checks = verify_coordinates(&[("inline", &axis, 2500.0), ("inline", &axis, 1500.0)]);
        assert!(!checks[0].in_bounds);
        assert!(checks[1].in_bounds);
    }

    #[test]
    fn consistency_rules_catch_impossible_stats() {
        let mut stats = sample_stats();
        stats.mean = stats.max + 1.0;
        let issues = check_statistical_consistency(&stats);
        assert!(issues.iter().any(|i| i.rule == "min_mean_max_order"));
        assert_eq!(overall_severity(&issues), Some(Severity::High));
    }

    #[test]
    fn consistency_rules_pass_on_well_formed_stats() {
        let stats = sample_stats();
        let issues = check_statistical_consistency(&stats);
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn provenance_record_hash_is_deterministic() {
        let data = vec![1.0f32, 2.0, 3.0];
        let stats = compute_statistics(&data);
        let r1 = create_provenance_record(&data, vec![3], "test", serde_json::json!({}), stats);
        let r2 = create_provenance_record(&data, vec![3], "test", serde_json::json!({}), stats);
        assert_eq!(r1.data_fingerprint.hash, r2.data_fingerprint.hash);
    }

    #[test]
    fn provenance_record_hash_changes_with_data() {
        let stats = compute_statistics(&[1.0, 2.0, 3.0]);
        let r1 = create_provenance_record(&[1.0, 2.0, 3.0], vec![3], "test", serde_json::json!({}), stats);
        let r2 = create_provenance_record(&[1.0, 2.0, 4.0], vec![3], "test", serde_json::json!({}), stats);
        assert_ne!(r1.data_fingerprint.hash, r2.data_fingerprint.hash);
    }

    fn sample_bag() -> MetadataBag {
        MetadataBag::new()
            .with_field("name", "Gulf of Mexico 3D Survey 2023")
            .with_field("region", "Gulf of Mexico")
            .with_field("data_type", "3D Seismic")
            .with_field("acquisition_date", "2023-06-15")
            .with_field("sample_unit", "ms")
            .with_field("crs", "EPSG:4326")
    }

    #[test]
    fn exact_match_passes() {
        let bag = sample_bag();
        let result = validate_metadata_field(&bag, "region", "Gulf of Mexico", false);
        assert_eq!(result.status, MetadataStatus::Pass);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn alias_resolves_to_canonical_field() {
        let bag = sample_bag();
        let result = validate_metadata_field(&bag, "area", "Gulf of Mexico", false);
        assert_eq!(result.status, MetadataStatus::Pass);
        assert_eq!(result.source_path.as_deref(), Some("region"));
    }

    #[test]
    fn unit_equivalence_passes_milliseconds_claim() {
        let bag = sample_bag();
        let result = validate_metadata_field(&bag, "sample_unit", "milliseconds", false);
        assert_eq!(result.status, MetadataStatus::Pass);
    }

    #[test]
    fn close_match_is_partial_with_suggestion() {
        let bag = sample_bag();
        let result = validate_metadata_field(&bag, "region", "gulf mexico", false);
        assert_eq!(result.status, MetadataStatus::Partial);
        assert_eq!(result.suggestions, vec!["Gulf of Mexico".to_string()]);
    }

    #[test]
    fn unrelated_value_fails() {
        let bag = sample_bag();
        let result = validate_metadata_field(&bag, "region", "Atlantis", false);
        assert_eq!(result.status, MetadataStatus::Fail);
    }

    #[test]
    fn unresolvable_field_is_not_found() {
        let bag = sample_bag();
        let result = validate_metadata_field(&bag, "operator_name", "Acme Seismic", false);
        assert_eq!(result.status, MetadataStatus::NotFound);
        assert!(result.source_path.is_none());
    }

    #[test]
    fn parse_wkt_normalizes_verbose_crs_claim() {
        let bag = sample_bag();
        let verbose = r#"GEOGCS["WGS 84",...,AUTHORITY["EPSG","4326"]]"#;
        let without_parsing = validate_metadata_field(&bag, "crs", verbose, false);
        assert_ne!(without_parsing.status, MetadataStatus::Pass);

        let with_parsing = validate_metadata_field(&bag, "crs", "EPSG:4326", true);
        assert_eq!(with_parsing.status, MetadataStatus::Pass);
    }

    #[test]
    fn aggregate_score_excludes_not_found_fields() {
        let bag = sample_bag();
        let results = vec![
            validate_metadata_field(&bag, "region", "Gulf of Mexico", false),
            validate_metadata_field(&bag, "operator_name", "Acme Seismic", false),
        ];
        assert_eq!(aggregate_metadata_score(&results), Some(1.0));
    }

    #[test]
    fn aggregate_score_is_none_when_nothing_resolves() {
        let bag = sample_bag();
        let results = vec![validate_metadata_field(&bag, "operator_name", "Acme Seismic", false)];
        assert_eq!(aggregate_metadata_score(&results), None);
    }
}
