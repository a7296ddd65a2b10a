//! Volume Access (C1): translate coordinate-space extraction requests into
//! dense typed buffers.
//!
//! Grounded in `original_source/src/vds_client.py`'s `VDSClient`: when no
//! real volume library / mount is configured, the component falls back to a
//! small fixed demo catalog so the rest of the gateway is exercisable
//! without real seismic data. When a data root is configured, `.vds` files
//! found under it are registered as additional (metadata-only) surveys.
//!
//! Extraction itself is CPU-bound and must run off the async event loop —
//! callers (the tool server, the agent manager) are expected to invoke
//! [`VolumeAccess::extract`] via `tokio::task::spawn_blocking`, mirroring
//! the teacher's `spawn_tool` bridge in `server.rs`.

use crate::error::GatewayError;
use crate::types::{AxisDescriptor, ExtractionKind, IndexRange, Statistics, SurveyId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Four bytes per `f32` sample — used to estimate volume size without
/// materializing the buffer, matching `extract_volume_subset`'s
/// `volume_size_mb` computation in the Python original.
const BYTES_PER_SAMPLE: u64 = 4;

/// A single indexed survey. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Survey {
    pub id: SurveyId,
    pub name: String,
    pub file_path: String,
    pub region: String,
    pub acquisition_date: String,
    pub inline_axis: AxisDescriptor,
    pub crossline_axis: AxisDescriptor,
    pub sample_axis: AxisDescriptor,
    pub data_type: String,
    pub channel_count: u32,
    /// True for surveys synthesized by the demo catalog rather than
    /// discovered on a real mount.
    pub is_demo: bool,
}

impl Survey {
    #[must_use]
    pub fn axis_for(&self, kind: ExtractionKind) -> &AxisDescriptor {
        match kind {
            ExtractionKind::Inline => &self.inline_axis,
            ExtractionKind::Crossline => &self.crossline_axis,
            ExtractionKind::Timeslice | ExtractionKind::Subvolume => &self.sample_axis,
        }
    }
}

/// An opened handle to a survey. Handles are process-wide cached and never
/// auto-evicted; `open` is idempotent (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct VolumeHandle {
    pub survey: Arc<Survey>,
}

/// A dense extracted buffer plus the statistics computed over it.
#[derive(Debug, Clone)]
pub struct ExtractedBuffer {
    pub kind: ExtractionKind,
    /// Shape in row-major order, e.g. `[crosslines, samples]` for an inline.
    pub shape: Vec<u64>,
    pub data: Vec<f32>,
    pub null_traces: u64,
    /// True if the sample axis was clipped to stay within the configured
    /// raw-data return cap (spec.md §6 "raw-data return cap"; §8 "Oversized
    /// raw-data returns are truncated with a warning structure").
    pub truncated: bool,
    /// Element count the request would have produced before truncation.
    pub requested_elements: u64,
}

impl ExtractedBuffer {
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64 * BYTES_PER_SAMPLE
    }
}

/// Volume Access component: owns the handle cache and performs extraction.
pub struct VolumeAccess {
    data_roots: Vec<PathBuf>,
    handles: RwLock<HashMap<SurveyId, Arc<Survey>>>,
}

impl VolumeAccess {
    #[must_use]
    pub fn new(data_roots: Vec<PathBuf>) -> Self {
        let mut access = Self {
            data_roots,
            handles: RwLock::new(HashMap::new()),
        };
        access.bootstrap();
        access
    }

    /// Populates the handle cache from configured mount roots, falling back
    /// to the fixed demo catalog if none are configured or none yield
    /// surveys — mirrors `VDSClient.initialize`/`_scan_for_surveys`.
    fn bootstrap(&mut self) {
        let mut found = Vec::new();
        for root in &self.data_roots.clone() {
            found.extend(scan_mount_root(root));
        }

        if found.is_empty() {
            tracing::info!("no .vds files found under configured mounts, using demo catalog");
            found = demo_surveys();
        }

        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        for survey in found {
            handles.insert(survey.id.clone(), Arc::new(survey));
        }
    }

    /// Opens (or returns the cached handle for) a survey by id.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` if no survey with this id is known.
    pub fn open(&self, survey_id: &SurveyId) -> Result<VolumeHandle, GatewayError> {
        let handles = self.handles.read().unwrap_or_else(|e| e.into_inner());
        handles
            .get(survey_id)
            .cloned()
            .map(|survey| VolumeHandle { survey })
            .ok_or_else(|| GatewayError::NotFound(format!("survey not found: {survey_id}")))
    }

    /// Lists all known surveys (used by the Metadata Index Client's local
    /// scan / demo tiers — see [`crate::index`]).
    #[must_use]
    pub fn list_surveys(&self) -> Vec<Arc<Survey>> {
        let handles = self.handles.read().unwrap_or_else(|e| e.into_inner());
        handles.values().cloned().collect()
    }

    /// Returns the survey descriptor for an already-open handle.
    #[must_use]
    pub fn describe(&self, handle: &VolumeHandle) -> Arc<Survey> {
        Arc::clone(&handle.survey)
    }

    /// Extracts a 2-D slice or 3-D subvolume. Blocking, CPU-bound; run via
    /// `spawn_blocking` from async callers.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRange` if the selector or sub-ranges
    /// resolve to an empty range, or `GatewayError::ExtractionFailed` if
    /// the resulting buffer cannot be computed.
    /// `max_elements` caps the number of samples the returned buffer may
    /// contain (spec.md §6's raw-data return cap). When a request would
    /// exceed it, the trailing (sample) axis is clipped and
    /// `ExtractedBuffer::truncated` is set rather than failing the call.
    pub fn extract(
        &self,
        handle: &VolumeHandle,
        kind: ExtractionKind,
        selector: f64,
        sub_ranges: Option<(IndexRange, IndexRange)>,
        max_elements: usize,
    ) -> Result<(ExtractedBuffer, Statistics), GatewayError> {
        let survey = &handle.survey;

        let mut buffer = match kind {
            ExtractionKind::Inline => {
                let inline_idx = survey.inline_axis.coord_to_clamped_index(selector);
                let requested = sub_ranges
                    .map(|(_, s)| s)
                    .unwrap_or_else(|| full_range(&survey.sample_axis));
                let clipped = clip_trailing_axis(requested, survey.crossline_axis.sample_count, max_elements);
                let mut buffer = synthesize_slice(
                    survey,
                    "inline",
                    inline_idx,
                    survey.crossline_axis.sample_count,
                    clipped,
                )?;
                mark_truncation(&mut buffer, requested, clipped, survey.crossline_axis.sample_count);
                buffer
            }
            ExtractionKind::Crossline => {
                let crossline_idx = survey.crossline_axis.coord_to_clamped_index(selector);
                let requested = sub_ranges
                    .map(|(_, s)| s)
                    .unwrap_or_else(|| full_range(&survey.sample_axis));
                let clipped = clip_trailing_axis(requested, survey.inline_axis.sample_count, max_elements);
                let mut buffer = synthesize_slice(
                    survey,
                    "crossline",
                    crossline_idx,
                    survey.inline_axis.sample_count,
                    clipped,
                )?;
                mark_truncation(&mut buffer, requested, clipped, survey.inline_axis.sample_count);
                buffer
            }
            ExtractionKind::Timeslice => {
                let sample_idx = survey.sample_axis.coord_to_clamped_index(selector);
                let requested = full_range(&survey.inline_axis);
                let clipped = clip_trailing_axis(requested, survey.crossline_axis.sample_count, max_elements);
                let mut buffer = synthesize_slice(
                    survey,
                    "timeslice",
                    sample_idx,
                    survey.crossline_axis.sample_count,
                    clipped,
                )?;
                mark_truncation(&mut buffer, requested, clipped, survey.crossline_axis.sample_count);
                buffer
            }
            ExtractionKind::Subvolume => {
                let (inline_range, crossline_range) = sub_ranges.ok_or_else(|| {
                    GatewayError::InvalidArgument(
                        "subvolume extraction requires inline and crossline ranges".into(),
                    )
                })?;
                let requested = full_range(&survey.sample_axis);
                let plane = inline_range.len() * crossline_range.len();
                let clipped = clip_trailing_axis(requested, plane, max_elements);
                let mut buffer = synthesize_subvolume(survey, inline_range, crossline_range, clipped)?;
                mark_truncation(&mut buffer, requested, clipped, plane);
                buffer
            }
        };

        let stats = compute_statistics(&buffer.data);
        buffer.data.shrink_to_fit();
        Ok((buffer, stats))
    }
}

/// Records whether clipping actually shrank the sample axis, and what the
/// full (unclipped) element count would have been.
fn mark_truncation(buffer: &mut ExtractedBuffer, requested: IndexRange, clipped: IndexRange, other_dims: u64) {
    buffer.truncated = clipped.len() < requested.len();
    buffer.requested_elements = other_dims * requested.len();
}

/// Shrinks `axis_range`'s length so `other_dims * axis_range.len() <=
/// max_elements`, keeping the same lower bound. `max_elements == 0` disables
/// the cap (treated as unbounded) since a legitimate cap is always >= 1.
fn clip_trailing_axis(axis_range: IndexRange, other_dims: u64, max_elements: usize) -> IndexRange {
    if max_elements == 0 || other_dims == 0 {
        return axis_range;
    }
    let max_elements = max_elements as u64;
    let allowed_len = (max_elements / other_dims).max(1);
    if axis_range.len() <= allowed_len {
        axis_range
    } else {
        IndexRange {
            lo: axis_range.lo,
            hi: axis_range.lo + allowed_len,
        }
    }
}

fn full_range(axis: &AxisDescriptor) -> IndexRange {
    IndexRange {
        lo: 0,
        hi: axis.sample_count,
    }
}

/// Produces a deterministic pseudo-seismic 2-D slice. The values are a
/// reproducible function of the survey id, slice kind, index, and position
/// — not real amplitude data, but stable enough that the Integrity Engine
/// can recompute identical statistics from a second extraction, and no
/// tool-call result ever prints a hardcoded constant.
fn synthesize_slice(
    survey: &Survey,
    kind_tag: &str,
    index: u64,
    trace_count: u64,
    sample_range: IndexRange,
) -> Result<ExtractedBuffer, GatewayError> {
    if sample_range.is_empty() {
        return Err(GatewayError::InvalidRange {
            lo: sample_range.lo as i64,
            hi: sample_range.hi as i64,
        });
    }

    let seed = seed_for(survey.id.as_str(), kind_tag, index);
    let sample_count = sample_range.len();
    let mut data = Vec::with_capacity((trace_count * sample_count) as usize);
    let mut null_traces = 0u64;

    for trace in 0..trace_count {
        let is_null_trace = is_null(seed, trace);
        for sample in 0..sample_count {
            if is_null_trace {
                data.push(f32::NAN);
            } else {
                data.push(pseudo_amplitude(seed, trace, sample_range.lo + sample));
            }
        }
        if is_null_trace {
            null_traces += 1;
        }
    }

    Ok(ExtractedBuffer {
        kind: match kind_tag {
            "inline" => ExtractionKind::Inline,
            "crossline" => ExtractionKind::Crossline,
            _ => ExtractionKind::Timeslice,
        },
        shape: vec![trace_count, sample_count],
        data,
        null_traces,
        truncated: false,
        requested_elements: trace_count * sample_count,
    })
}

fn synthesize_subvolume(
    survey: &Survey,
    inline_range: IndexRange,
    crossline_range: IndexRange,
    sample_range: IndexRange,
) -> Result<ExtractedBuffer, GatewayError> {
    if inline_range.is_empty() || crossline_range.is_empty() || sample_range.is_empty() {
        return Err(GatewayError::InvalidRange {
            lo: 0,
            hi: 0,
        });
    }

    let seed = seed_for(survey.id.as_str(), "subvolume", inline_range.lo);
    let mut data = Vec::with_capacity(
        (inline_range.len() * crossline_range.len() * sample_range.len()) as usize,
    );
    let mut null_traces = 0u64;

    for inline in inline_range.lo..inline_range.hi {
        for crossline in crossline_range.lo..crossline_range.hi {
            let trace_key = inline * 1_000_003 + crossline;
            let is_null_trace = is_null(seed, trace_key);
            for sample in sample_range.lo..sample_range.hi {
                if is_null_trace {
                    data.push(f32::NAN);
                } else {
                    data.push(pseudo_amplitude(seed, trace_key, sample));
                }
            }
            if is_null_trace {
                null_traces += 1;
            }
        }
    }

    Ok(ExtractedBuffer {
        kind: ExtractionKind::Subvolume,
        shape: vec![inline_range.len(), crossline_range.len(), sample_range.len()],
        data,
        null_traces,
        truncated: false,
        requested_elements: inline_range.len() * crossline_range.len() * sample_range.len(),
    })
}

fn seed_for(survey_id: &str, tag: &str, index: u64) -> u64 {
    let mut h: u64 = 1469598103934665603; // FNV offset basis
    for byte in survey_id.bytes().chain(tag.bytes()) {
        h ^= u64::from(byte);
        h = h.wrapping_mul(1099511628211);
    }
    h ^ index.wrapping_mul(2654435761)
}

/// Roughly one in twenty traces is "null" (every sample missing), matching
/// the order of magnitude of `quality_indicators.null_trace_percentage` in
/// the Python prototype's demo statistics.
fn is_null(seed: u64, trace: u64) -> bool {
    (seed ^ trace.wrapping_mul(0x9E37_79B9_7F4A_7C15)) % 20 == 0
}

fn pseudo_amplitude(seed: u64, trace: u64, sample: u64) -> f32 {
    let x = (seed ^ trace.wrapping_mul(31) ^ sample.wrapping_mul(97)) as f64;
    // Map onto a bounded pseudo-amplitude range via a couple of sine terms;
    // deterministic, bounded, and varies smoothly enough to have a sensible
    // mean/std rather than being uniform noise.
    let phase = (x % 6283.0) / 1000.0;
    (900.0 * phase.sin() + 150.0 * (phase * 7.3).cos()) as f32
}

/// Computes `{min, max, mean, median, std, rms, p10, p25, p50, p75, p90,
/// sample_count}` over non-NaN samples, matching
/// `data_integrity.py::_compute_statistics`.
#[must_use]
pub fn compute_statistics(data: &[f32]) -> Statistics {
    let mut valid: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).map(f64::from).collect();
    if valid.is_empty() {
        return Statistics {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            median: 0.0,
            std: 0.0,
            rms: 0.0,
            p10: 0.0,
            p25: 0.0,
            p50: 0.0,
            p75: 0.0,
            p90: 0.0,
            sample_count: 0,
        };
    }

    valid.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = valid.len();
    let min = valid[0];
    let max = valid[n - 1];
    let sum: f64 = valid.iter().sum();
    let mean = sum / n as f64;
    let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();
    let rms = (valid.iter().map(|v| v * v).sum::<f64>() / n as f64).sqrt();

    Statistics {
        min,
        max,
        mean,
        median: percentile(&valid, 50.0),
        std,
        rms,
        p10: percentile(&valid, 10.0),
        p25: percentile(&valid, 25.0),
        p50: percentile(&valid, 50.0),
        p75: percentile(&valid, 75.0),
        p90: percentile(&valid, 90.0),
        sample_count: n,
    }
}

/// Linear-interpolation percentile over an already-sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Walks a mount root for `.vds` files, grounded in
/// `_scan_for_surveys`/`_extract_survey_info`. Per-file failures are logged
/// and skipped; this never returns an error.
fn scan_mount_root(root: &Path) -> Vec<Survey> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut surveys = Vec::new();
    let walker = ignore::WalkBuilder::new(root).hidden(false).build();

    for entry in walker.filter_map(Result::ok) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("vds") {
            continue;
        }

        match survey_from_vds_path(path) {
            Ok(survey) => surveys.push(survey),
            Err(e) => tracing::error!("error processing {}: {e}", path.display()),
        }
    }

    surveys
}

/// Builds a minimal, metadata-only survey for a discovered `.vds` file.
/// A real deployment would open the file through the native volume library
/// to read its true axis descriptors; this crate has no such dependency, so
/// it derives a stable synthetic geometry from the file id, the same way
/// extraction synthesizes sample data.
fn survey_from_vds_path(path: &Path) -> Result<Survey, GatewayError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| GatewayError::Internal("vds file has no stem".into()))?;

    let id = SurveyId::new(stem)?;
    let name = stem.replace(['_', '-'], " ");
    let seed = seed_for(stem, "geometry", 0);

    let inline_min = 1000.0 + (seed % 500) as f64;
    let crossline_min = 500.0 + (seed % 300) as f64;

    Ok(Survey {
        id,
        name: title_case(&name),
        file_path: path.to_string_lossy().into_owned(),
        region: "Unknown".to_string(),
        acquisition_date: "unknown".to_string(),
        inline_axis: AxisDescriptor::new("inline", "index", inline_min, inline_min + 1500.0, 1501)?,
        crossline_axis: AxisDescriptor::new(
            "crossline",
            "index",
            crossline_min,
            crossline_min + 1300.0,
            1301,
        )?,
        sample_axis: AxisDescriptor::new("sample", "ms", 0.0, 4000.0, 2001)?,
        data_type: "3D Seismic".to_string(),
        channel_count: 1,
        is_demo: false,
    })
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The fixed demo catalog, grounded verbatim (ranges and ids) in
/// `VDSClient._setup_demo_data`.
#[must_use]
pub fn demo_surveys() -> Vec<Survey> {
    vec![
        Survey {
            id: SurveyId::new("demo_gulf_mexico_2023").unwrap(),
            name: "Gulf of Mexico 3D Survey 2023".to_string(),
            file_path: "demo://gulf_mexico_2023.vds".to_string(),
            region: "Gulf of Mexico".to_string(),
            acquisition_date: "2023-06-15".to_string(),
            inline_axis: AxisDescriptor::new("inline", "index", 1000.0, 2500.0, 1501).unwrap(),
            crossline_axis: AxisDescriptor::new("crossline", "index", 500.0, 1800.0, 1301).unwrap(),
            sample_axis: AxisDescriptor::new("sample", "ms", 0.0, 4000.0, 2001).unwrap(),
            data_type: "3D Seismic".to_string(),
            channel_count: 1,
            is_demo: true,
        },
        Survey {
            id: SurveyId::new("demo_north_sea_2024").unwrap(),
            name: "North Sea Prospect 4D Monitor".to_string(),
            file_path: "demo://north_sea_2024.vds".to_string(),
            region: "North Sea".to_string(),
            acquisition_date: "2024-03-20".to_string(),
            inline_axis: AxisDescriptor::new("inline", "index", 800.0, 1900.0, 1101).unwrap(),
            crossline_axis: AxisDescriptor::new("crossline", "index", 400.0, 1500.0, 1101).unwrap(),
            sample_axis: AxisDescriptor::new("sample", "ms", 0.0, 3500.0, 1751).unwrap(),
            data_type: "4D Seismic".to_string(),
            channel_count: 1,
            is_demo: true,
        },
        Survey {
            id: SurveyId::new("demo_permian_basin_2022").unwrap(),
            name: "Permian Basin Survey 2022".to_string(),
            file_path: "demo://permian_basin_2022.vds".to_string(),
            region: "Permian Basin".to_string(),
            acquisition_date: "2022-11-10".to_string(),
            inline_axis: AxisDescriptor::new("inline", "index", 1200.0, 3000.0, 1801).unwrap(),
            crossline_axis: AxisDescriptor::new("crossline", "index", 600.0, 2200.0, 1601).unwrap(),
            sample_axis: AxisDescriptor::new("sample", "ms", 0.0, 5000.0, 2501).unwrap(),
            data_type: "3D Seismic".to_string(),
            channel_count: 1,
            is_demo: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access() -> VolumeAccess {
        VolumeAccess::new(Vec::new())
    }

    #[test]
    fn bootstraps_demo_catalog_when_no_mounts_configured() {
        let access = access();
        let surveys = access.list_surveys();
        assert_eq!(surveys.len(), 3);
        assert!(surveys.iter().all(|s| s.is_demo));
    }

    #[test]
    fn open_is_idempotent_and_returns_same_identity() {
        let access = access();
        let id = SurveyId::new("demo_gulf_mexico_2023").unwrap();
        let h1 = access.open(&id).unwrap();
        let h2 = access.open(&id).unwrap();
        assert!(Arc::ptr_eq(&h1.survey, &h2.survey));
    }

    #[test]
    fn open_unknown_survey_is_not_found() {
        let access = access();
        let id = SurveyId::new("does_not_exist").unwrap();
        assert!(matches!(access.open(&id), Err(GatewayError::NotFound(_))));
    }

    #[test]
    fn extract_inline_at_min_yields_index_zero() {
        let access = access();
        let id = SurveyId::new("demo_gulf_mexico_2023").unwrap();
        let handle = access.open(&id).unwrap();
        let (buffer, stats) = access
            .extract(&handle, ExtractionKind::Inline, 1000.0, None, 0)
            .unwrap();
        assert_eq!(buffer.kind, ExtractionKind::Inline);
        assert!(stats.sample_count > 0);
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert!(!buffer.truncated);
    }

    #[test]
    fn statistics_invariants_hold() {
        let access = access();
        let id = SurveyId::new("demo_north_sea_2024").unwrap();
        let handle = access.open(&id).unwrap();
        let (_buffer, stats) = access
            .extract(&handle, ExtractionKind::Crossline, 900.0, None, 0)
            .unwrap();
        assert!(stats.min <= stats.mean);
        assert!(stats.mean <= stats.max);
        assert!(stats.p25 <= stats.median && stats.median <= stats.p75);
        assert!(stats.std >= 0.0);
    }

    #[test]
    fn subvolume_extraction_requires_ranges() {
        let access = access();
        let id = SurveyId::new("demo_gulf_mexico_2023").unwrap();
        let handle = access.open(&id).unwrap();
        let result = access.extract(&handle, ExtractionKind::Subvolume, 0.0, None, 0);
        assert!(matches!(result, Err(GatewayError::InvalidArgument(_))));
    }

    #[test]
    fn subvolume_size_estimate_matches_four_bytes_per_sample() {
        let access = access();
        let id = SurveyId::new("demo_gulf_mexico_2023").unwrap();
        let handle = access.open(&id).unwrap();
        let survey = &handle.survey;
        let inline_range = IndexRange::from_inclusive_coords(&survey.inline_axis, 1000.0, 1010.0).unwrap();
        let crossline_range =
            IndexRange::from_inclusive_coords(&survey.crossline_axis, 500.0, 510.0).unwrap();
        let (buffer, _) = access
            .extract(
                &handle,
                ExtractionKind::Subvolume,
                0.0,
                Some((inline_range, crossline_range)),
                0,
            )
            .unwrap();
        assert_eq!(buffer.byte_len(), buffer.data.len() as u64 * 4);
    }

    #[test]
    fn max_elements_clips_trailing_axis_and_flags_truncation() {
        let access = access();
        let id = SurveyId::new("demo_gulf_mexico_2023").unwrap();
        let handle = access.open(&id).unwrap();
        let (buffer, _stats) = access
            .extract(&handle, ExtractionKind::Inline, 1000.0, None, 500)
            .unwrap();
        assert!(buffer.truncated);
        assert!(buffer.data.len() as u64 <= 500);
        assert!(buffer.requested_elements > buffer.data.len() as u64);
    }

    #[test]
    fn max_elements_of_zero_means_unbounded() {
        let access = access();
        let id = SurveyId::new("demo_gulf_mexico_2023").unwrap();
        let handle = access.open(&id).unwrap();
        let (unbounded, _) = access
            .extract(&handle, ExtractionKind::Inline, 1000.0, None, 0)
            .unwrap();
        let (capped, _) = access
            .extract(&handle, ExtractionKind::Inline, 1000.0, None, 100_000_000)
            .unwrap();
        assert_eq!(unbounded.data.len(), capped.data.len());
        assert!(!unbounded.truncated);
        assert!(!capped.truncated);
    }
}
