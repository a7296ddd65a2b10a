//! Core domain types for the seismic data access gateway.
//!
//! Newtypes and value types shared across components, following the same
//! shape the grepika teacher used for its own domain primitives: small,
//! `Copy`/`Clone`-friendly where possible, with saturating or fallible
//! constructors that keep invalid states unrepresentable.

use crate::error::GatewayError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique, immutable survey identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurveyId(String);

impl SurveyId {
    /// Creates a survey id, rejecting empty strings.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidArgument` if `id` is empty or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, GatewayError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "survey_id must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SurveyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One named coordinate axis of a survey: `(name, unit, coordinate_min,
/// coordinate_max, sample_count)` with coordinate ↔ index conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisDescriptor {
    pub name: String,
    pub unit: String,
    pub coordinate_min: f64,
    pub coordinate_max: f64,
    pub sample_count: u64,
}

impl AxisDescriptor {
    /// Constructs an axis descriptor, enforcing spec invariants:
    /// `coordinate_min < coordinate_max` and `sample_count >= 2`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidArgument` if either invariant is violated.
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        coordinate_min: f64,
        coordinate_max: f64,
        sample_count: u64,
    ) -> Result<Self, GatewayError> {
        if !(coordinate_min < coordinate_max) {
            return Err(GatewayError::InvalidArgument(format!(
                "axis coordinate_min ({coordinate_min}) must be < coordinate_max ({coordinate_max})"
            )));
        }
        if sample_count < 2 {
            return Err(GatewayError::InvalidArgument(format!(
                "axis sample_count must be >= 2, got {sample_count}"
            )));
        }
        Ok(Self {
            name: name.into(),
            unit: unit.into(),
            coordinate_min,
            coordinate_max,
            sample_count,
        })
    }

    /// Converts a coordinate-space selector to a fractional index, without
    /// clamping or rounding (callers apply the spec's clamp-and-round rule).
    #[must_use]
    pub fn coord_to_index(&self, coord: f64) -> f64 {
        let span = self.coordinate_max - self.coordinate_min;
        if span <= 0.0 {
            return 0.0;
        }
        (coord - self.coordinate_min) / span * (self.sample_count.saturating_sub(1)) as f64
    }

    /// Converts a coordinate to the clamped integer index the spec's
    /// extraction rule uses: `idx = clamp(round(coord_to_index(coord)), 0, n-1)`.
    #[must_use]
    pub fn coord_to_clamped_index(&self, coord: f64) -> u64 {
        let n = self.sample_count;
        let idx = self.coord_to_index(coord).round();
        if idx < 0.0 {
            0
        } else if idx as u64 >= n {
            n - 1
        } else {
            idx as u64
        }
    }

    /// Last valid index on this axis.
    #[must_use]
    pub fn max_index(&self) -> u64 {
        self.sample_count.saturating_sub(1)
    }
}

/// Kind of extraction requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    Inline,
    Crossline,
    Timeslice,
    Subvolume,
}

impl fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inline => "inline",
            Self::Crossline => "crossline",
            Self::Timeslice => "timeslice",
            Self::Subvolume => "subvolume",
        };
        write!(f, "{s}")
    }
}

/// A half-open, clamped index range `[lo, hi)` derived from a user-space
/// inclusive coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub lo: u64,
    pub hi: u64,
}

impl IndexRange {
    /// Builds a half-open range from clamped inclusive bounds, per spec:
    /// "the upper bound is inclusive in user-space and converted to an
    /// exclusive half-open internal `[lo, hi)` with `hi =
    /// clamp(round(upper))+1`. If `lo >= hi` after clamping, fail with
    /// `InvalidRange`."
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRange` if the resulting range is empty.
    pub fn from_inclusive_coords(
        axis: &AxisDescriptor,
        lower: f64,
        upper: f64,
    ) -> Result<Self, GatewayError> {
        let lo = axis.coord_to_clamped_index(lower);
        let hi_inclusive = axis.coord_to_clamped_index(upper);
        let hi = hi_inclusive + 1;
        if lo >= hi {
            return Err(GatewayError::InvalidRange {
                lo: lo as i64,
                hi: hi as i64,
            });
        }
        Ok(Self { lo, hi })
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.hi - self.lo
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }
}

/// `{min, max, mean, median, std, rms, p10, p25, p50, p75, p90,
/// sample_count}` computed over non-null samples. Every numeric field at a
/// tool-server boundary is wrapped with an explicit unit string elsewhere
/// (never a bare number) — see [`crate::integrity::UNITLESS`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub rms: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub sample_count: usize,
}

/// A single piece of tool-result content: either text or inline image bytes.
/// Maps onto `rmcp::model::{Content, RawContent}` at the tool-server
/// boundary (see [`crate::server`]).
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    Image { media_type: &'static str, bytes: Vec<u8> },
}

// Compile-time assertions for thread safety, mirroring the teacher's own
// regression guard for its core newtypes.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SurveyId>();
    assert_send_sync::<AxisDescriptor>();
    assert_send_sync::<ExtractionKind>();
    assert_send_sync::<IndexRange>();
    assert_send_sync::<Statistics>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survey_id_rejects_empty() {
        assert!(SurveyId::new("").is_err());
        assert!(SurveyId::new("   ").is_err());
        assert!(SurveyId::new("gulf_mexico_2023").is_ok());
    }

    #[test]
    fn axis_descriptor_enforces_invariants() {
        assert!(AxisDescriptor::new("inline", "index", 1000.0, 500.0, 100).is_err());
        assert!(AxisDescriptor::new("inline", "index", 0.0, 100.0, 1).is_err());
        assert!(AxisDescriptor::new("inline", "index", 0.0, 100.0, 2).is_ok());
    }

    #[test]
    fn coord_to_clamped_index_respects_bounds() {
        let axis = AxisDescriptor::new("inline", "index", 1000.0, 2000.0, 1001).unwrap();
        assert_eq!(axis.coord_to_clamped_index(1000.0), 0);
        assert_eq!(axis.coord_to_clamped_index(2000.0), axis.max_index());
        assert_eq!(axis.coord_to_clamped_index(500.0), 0); // clamps below
        assert_eq!(axis.coord_to_clamped_index(5000.0), axis.max_index()); // clamps above
    }

    #[test]
    fn index_range_rejects_empty_range() {
        let axis = AxisDescriptor::new("sample", "ms", 0.0, 10.0, 11).unwrap();
        // A degenerate selection where lower > upper collapses to an empty range.
        let result = IndexRange::from_inclusive_coords(&axis, 10.0, 10.0);
        assert!(result.is_ok());
        assert_eq!(result.unwrap().len(), 1);
    }

    #[test]
    fn index_range_full_span() {
        let axis = AxisDescriptor::new("sample", "ms", 0.0, 10.0, 11).unwrap();
        let r = IndexRange::from_inclusive_coords(&axis, 0.0, 10.0).unwrap();
        assert_eq!(r.lo, 0);
        assert_eq!(r.hi, 11);
        assert_eq!(r.len(), 11);
    }
}
