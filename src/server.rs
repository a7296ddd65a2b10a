//! Tool Server (C8): MCP server implementation using rmcp.
//!
//! Structurally grounded in the teacher's `GrepikaServer`: the same
//! `#[tool_router]`/`ServerHandler` split, the same `spawn_tool` blocking
//! bridge, the same truncate-then-profile-then-log `call_tool` middleware
//! chain. The dispatch *order* — bulk-route check before running the named
//! tool — is new, required by spec.md §6.

use crate::agent::AgentManager;
use crate::cache::QueryCache;
use crate::chatproxy::{ChatProxyConfig, ImageDeliveryMode};
use crate::index::IndexClient;
use crate::integrity::{self, Severity, Verdict};
use crate::router::BulkOperationRouter;
use crate::types::{AxisDescriptor, ExtractionKind, IndexRange, SurveyId};
use crate::volume::VolumeAccess;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult, LoggingLevel,
    LoggingMessageNotification, LoggingMessageNotificationParam, ProtocolVersion, RawContent,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_router, RoleServer, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum response size in bytes before truncation. Raised relative to the
/// teacher's code-search budget (512KB) because a single subvolume
/// extraction response can legitimately be large; the hard ceiling on
/// *element* count is `Config::max_elements`, enforced before serialization
/// rather than after.
const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Truncates a JSON response string at a clean boundary before the limit,
/// appending a truncation notice. Matches the teacher's
/// `truncate_response`.
fn truncate_response(mut json: String) -> String {
    if json.len() <= MAX_RESPONSE_BYTES {
        return json;
    }
    let original_len = json.len();
    let search_region = &json[..MAX_RESPONSE_BYTES];
    let cut_point = search_region
        .rfind(',')
        .or_else(|| search_region.rfind('\n'))
        .unwrap_or(MAX_RESPONSE_BYTES);
    let safe_cut = json.floor_char_boundary(cut_point + 1);
    json.truncate(safe_cut);
    json.push_str(&format!(
        "...\n[TRUNCATED: response exceeded {original_len} bytes, showing first {safe_cut}]"
    ));
    json
}

fn truncate_call_tool_result(mut result: CallToolResult) -> CallToolResult {
    for content in &mut result.content {
        if let RawContent::Text(ref mut text) = content.raw {
            if text.text.len() > MAX_RESPONSE_BYTES {
                text.text = truncate_response(std::mem::take(&mut text.text));
            }
        }
    }
    result
}

#[cfg(test)]
mod truncate_tests {
    use super::*;

    #[test]
    fn under_limit_is_unchanged() {
        let input = "short string".to_string();
        assert_eq!(truncate_response(input.clone()), input);
    }

    #[test]
    fn over_limit_cuts_at_comma() {
        let segment = "\"x\": 1,";
        let repeats = (MAX_RESPONSE_BYTES / segment.len()) + 10;
        let input = segment.repeat(repeats);
        let result = truncate_response(input);
        assert!(result.contains("[TRUNCATED:"));
    }
}

/// Runs a blocking tool operation and classifies its outcome onto the
/// right MCP channel, matching the teacher's `spawn_tool`.
async fn spawn_tool<T, F>(f: F) -> Result<CallToolResult, rmcp::ErrorData>
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(output)) => {
            let json = serde_json::to_string(&output)
                .map_err(|e| rmcp::ErrorData::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        Ok(Err(e)) => {
            if e.is_client_fixable() {
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            } else {
                Err(e.into())
            }
        }
        Err(e) => Err(rmcp::ErrorData::internal_error(e.to_string(), None)),
    }
}

/// Runs an async (non-blocking) tool operation through the same
/// success/error-channel classification as `spawn_tool`, for operations
/// that are themselves already async (Agent Manager, Mount Health).
async fn run_tool<T, Fut>(fut: Fut) -> Result<CallToolResult, rmcp::ErrorData>
where
    T: Serialize,
    Fut: std::future::Future<Output = crate::error::Result<T>>,
{
    match fut.await {
        Ok(output) => {
            let json = serde_json::to_string(&output)
                .map_err(|e| rmcp::ErrorData::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        Err(e) => {
            if e.is_client_fixable() {
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            } else {
                Err(e.into())
            }
        }
    }
}

// ─── MCP parameter structs ───────────────────────────────────────────────
// Doc comments on fields become the JSON schema descriptions LLMs see.

#[derive(Deserialize, JsonSchema)]
pub struct SearchSurveysParams {
    /// Free-text query over name/region/data type
    pub query: Option<String>,
    pub region: Option<String>,
    pub year: Option<String>,
    #[serde(default)]
    pub offset: usize,
    /// Maximum results per page (default 20, capped at 100)
    pub limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetSurveyInfoParams {
    pub survey_id: String,
    #[serde(default = "default_true")]
    pub include_stats: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, JsonSchema)]
pub struct FacetQueryParams {
    pub region: Option<String>,
    pub year: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ExtractSliceParams {
    pub survey_id: String,
    /// Inline number for `extract_inline`, crossline number for `extract_crossline`
    pub number: f64,
}

#[derive(Deserialize, JsonSchema)]
pub struct ExtractVolumeSubsetParams {
    pub survey_id: String,
    /// `[lower, upper]` inclusive inline coordinates
    pub inline_range: (f64, f64),
    /// `[lower, upper]` inclusive crossline coordinates
    pub crossline_range: (f64, f64),
}

#[derive(Deserialize, JsonSchema)]
pub struct ExtractImageParams {
    pub survey_id: String,
    pub number: f64,
    pub colormap: Option<String>,
    pub clip_percentile: Option<f64>,
    /// Whether to attach the rendered image bytes, or only metadata plus a
    /// privacy-notice text block (spec.md §6, "Envelope the result").
    #[serde(default = "default_true")]
    pub send_to_claude: bool,
}

#[derive(Deserialize, JsonSchema)]
pub struct AgentStartParams {
    pub survey_id: String,
    pub instruction: String,
    #[serde(default = "default_true")]
    pub auto_execute: bool,
}

#[derive(Deserialize, JsonSchema)]
pub struct AgentSessionParams {
    pub session_id: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ValidateStatisticsParams {
    pub survey_id: String,
    pub section_type: ExtractionKind,
    pub section_number: f64,
    pub claimed_statistics: crate::types::Statistics,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    0.05
}

#[derive(Deserialize, JsonSchema)]
pub struct VerifyCoordinatesParams {
    pub survey_id: String,
    /// Map of axis name ("inline"/"crossline"/"sample") to claimed value
    pub claimed_location: std::collections::HashMap<String, f64>,
}

#[derive(Deserialize, JsonSchema)]
pub struct CheckConsistencyParams {
    pub statistics: crate::types::Statistics,
}

#[derive(Deserialize, JsonSchema)]
pub struct ValidateMetadataParams {
    pub survey_id: String,
    pub claimed_metadata: Option<std::collections::HashMap<String, String>>,
    #[serde(default)]
    pub validation_type: String,
    #[serde(default)]
    pub smart_matching: bool,
    /// Normalize `crs` comparisons through a bare EPSG identifier before
    /// comparing, so a verbose WKT claim still matches a terse known value.
    #[serde(default)]
    pub parse_wkt: bool,
    /// Ignore `claimed_metadata` and return every known field, unvalidated —
    /// the superset a later claim-bearing call can be checked against
    /// (spec.md §8).
    #[serde(default)]
    pub discovery_mode: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckDomainWarningsParams {
    /// Free text to scan — a draft assistant response or the user's own
    /// prompt, not a tool argument blob.
    pub context: String,
    /// Surveys the text is discussing. A comparison can only be unsafe
    /// across two or more.
    pub survey_ids: Vec<String>,
}

// ─── MCP server ───────────────────────────────────────────────────────────

/// Tool Server: owns every other component and dispatches `tools/call`
/// through the Bulk Router before the named tool runs.
#[derive(Clone)]
pub struct GatewayServer {
    volume: Arc<VolumeAccess>,
    index: Arc<IndexClient>,
    cache: Arc<QueryCache>,
    agent: Arc<AgentManager>,
    chat_proxy_config: Arc<ChatProxyConfig>,
    max_elements: usize,
    tool_router: ToolRouter<GatewayServer>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(config: &crate::Config) -> Self {
        let volume = Arc::new(VolumeAccess::new(config.data_roots.clone()));
        let index = Arc::new(
            IndexClient::new(Arc::clone(&volume))
                .with_remote(config.index_url.clone())
                .with_container_root(config.container_root.clone()),
        );
        let cache = Arc::new(QueryCache::new());
        let agent = Arc::new(AgentManager::new(Arc::clone(&volume), config.max_elements));

        Self {
            volume,
            index,
            cache,
            agent,
            chat_proxy_config: Arc::new(ChatProxyConfig::default()),
            max_elements: config.max_elements,
            tool_router: Self::tool_router(),
        }
    }

    /// Returns tool schemas without an async MCP context, matching the
    /// teacher's `tool_schemas` (used by the teacher's benches; kept here
    /// as a general-purpose introspection hook).
    #[must_use]
    pub fn tool_schemas(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    fn survey_id(raw: &str) -> Result<SurveyId, rmcp::ErrorData> {
        SurveyId::new(raw).map_err(|e| rmcp::ErrorData::invalid_params(e.to_string(), None))
    }

    /// Builds the `context_text` the Bulk Router inspects: the `instruction`
    /// argument if present, else the serialized arguments, matching
    /// spec.md §6's dispatch-order step 1.
    fn context_text(arguments: &serde_json::Value) -> String {
        arguments
            .get("instruction")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| arguments.to_string())
    }

    /// Checks the Bulk Router before running `tool_name`; if it detects a
    /// bulk pattern, starts an Agent Manager session and returns an
    /// acknowledgment instead of running the original tool (spec.md §6,
    /// dispatch-order step 2).
    async fn maybe_reroute(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
    ) -> Option<Result<CallToolResult, rmcp::ErrorData>> {
        const EXTRACTION_TOOLS: &[&str] = &[
            "extract_inline",
            "extract_crossline",
            "extract_volume_subset",
            "extract_inline_image",
            "extract_crossline_image",
            "extract_timeslice_image",
        ];
        if !EXTRACTION_TOOLS.contains(&tool_name) {
            return None;
        }

        let context_text = Self::context_text(arguments);
        let pattern = BulkOperationRouter::detect_bulk_pattern(&context_text)?;

        let survey_id = arguments
            .get("survey_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let routing_info = BulkOperationRouter::create_routing_info(
            pattern,
            tool_name,
            arguments.clone(),
            &context_text,
            survey_id.clone(),
        );

        let Some(survey_id) = survey_id else {
            return Some(Ok(CallToolResult::error(vec![Content::text(
                "bulk pattern detected but no survey_id was provided to route to the agent manager",
            )])));
        };

        let result = async {
            let id = Self::survey_id(&survey_id)?;
            let agent = Arc::clone(&self.agent);
            let session_id = agent
                .start_extraction(id, context_text.clone(), true)
                .await
                .map_err(rmcp::ErrorData::from)?;

            let json = serde_json::to_string(&serde_json::json!({
                "routed": true,
                "routing_info": routing_info,
                "session_id": session_id,
                "message": format!(
                    "This instruction describes a bulk operation ({}). Routed to the agent manager as session {session_id}. Use agent_get_status(session_id=\"{session_id}\") to check progress.",
                    pattern.reason()
                ),
            }))
            .map_err(|e| rmcp::ErrorData::internal_error(e.to_string(), None))?;

            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        .await;

        Some(result)
    }
}

#[tool_router]
impl GatewayServer {
    #[tool(
        description = "Search the survey catalog by free-text query, region, or year. Paged; returns pagination hints.",
        annotations(title = "Search Surveys", read_only_hint = true, idempotent_hint = true)
    )]
    async fn search_surveys(
        &self,
        Parameters(params): Parameters<SearchSurveysParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let limit = params.limit.unwrap_or(20).min(100);
        let index = Arc::clone(&self.index);
        let query = params.query.clone().unwrap_or_default();
        let cache_key = QueryCache::make_key(&[
            ("query", &query),
            ("region", params.region.as_deref().unwrap_or("")),
            ("year", params.year.as_deref().unwrap_or("")),
            ("offset", &params.offset.to_string()),
            ("limit", &limit.to_string()),
        ]);

        if let Some(cached) = self.cache.search.get(&cache_key) {
            let json = String::from_utf8_lossy(&cached).into_owned();
            return Ok(CallToolResult::success(vec![Content::text(json)]));
        }

        let result = spawn_tool(move || {
            let result = if query.is_empty() {
                index.list(limit, params.offset)
            } else {
                index.search(&query, limit, params.offset)
            };
            Ok(serde_json::json!({
                "surveys": result.entries.iter().map(|e| serde_json::json!({
                    "survey_id": e.id.as_str(),
                    "name": e.name,
                    "region": e.region,
                    "data_type": e.data_type,
                    "acquisition_date": e.acquisition_date,
                })).collect::<Vec<_>>(),
                "total_matched": result.total_matched,
                "offset": params.offset,
                "limit": limit,
                "has_more": params.offset + limit < result.total_matched,
                "tier": result.tier.as_str(),
            }))
        })
        .await;

        if let Ok(ref ok) = result {
            if let Some(RawContent::Text(t)) = ok.content.first().map(|c| &c.raw) {
                self.cache.search.set(cache_key, t.text.clone().into_bytes());
            }
        }
        result
    }

    #[tool(
        description = "Get full metadata for one survey, optionally including summary statistics.",
        annotations(title = "Get Survey Info", read_only_hint = true, idempotent_hint = true)
    )]
    async fn get_survey_info(
        &self,
        Parameters(params): Parameters<GetSurveyInfoParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let index = Arc::clone(&self.index);
        spawn_tool(move || {
            let id = SurveyId::new(params.survey_id)?;
            let survey = index.get(&id)?;
            Ok(serde_json::json!({
                "survey_id": survey.id.as_str(),
                "name": survey.name,
                "region": survey.region,
                "acquisition_date": survey.acquisition_date,
                "data_type": survey.data_type,
                "inline_range": [survey.inline_axis.coordinate_min, survey.inline_axis.coordinate_max],
                "crossline_range": [survey.crossline_axis.coordinate_min, survey.crossline_axis.coordinate_max],
                "sample_range": [survey.sample_axis.coordinate_min, survey.sample_axis.coordinate_max],
                "include_stats": params.include_stats,
            }))
        })
        .await
    }

    #[tool(
        description = "Aggregate survey counts, optionally filtered by region or year.",
        annotations(title = "Get Survey Stats", read_only_hint = true, idempotent_hint = true)
    )]
    async fn get_survey_stats(
        &self,
        Parameters(_params): Parameters<FacetQueryParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let index = Arc::clone(&self.index);
        spawn_tool(move || {
            let stats = index.index_stats();
            Ok(serde_json::json!({
                "total_surveys": stats.total_surveys,
                "by_region": stats.facets.by_region,
                "by_data_type": stats.facets.by_data_type,
                "tier": stats.tier.as_str(),
            }))
        })
        .await
    }

    #[tool(
        description = "Facet counts (region, data type) over the catalog, optionally filtered.",
        annotations(title = "Get Facets", read_only_hint = true, idempotent_hint = true)
    )]
    async fn get_facets(
        &self,
        Parameters(_params): Parameters<FacetQueryParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        if let Some(cached) = self.cache.precomputed_facets_if_fresh() {
            let json = String::from_utf8_lossy(&cached).into_owned();
            return Ok(CallToolResult::success(vec![Content::text(json)]));
        }

        let index = Arc::clone(&self.index);
        let cache = Arc::clone(&self.cache);
        let result = spawn_tool(move || {
            let stats = index.index_stats();
            Ok(serde_json::json!({
                "by_region": stats.facets.by_region,
                "by_data_type": stats.facets.by_data_type,
            }))
        })
        .await;

        if let Ok(ref ok) = result {
            if let Some(RawContent::Text(t)) = ok.content.first().map(|c| &c.raw) {
                cache.set_precomputed_facets(t.text.clone().into_bytes());
            }
        }
        result
    }

    #[tool(
        description = "Cache hit/miss counters for the query cache.",
        annotations(title = "Get Cache Stats", read_only_hint = true, idempotent_hint = true)
    )]
    async fn get_cache_stats(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        let search_stats = self.cache.search.stats();
        let facets_stats = self.cache.facets.stats();
        spawn_tool(move || {
            Ok(serde_json::json!({
                "search_cache": {
                    "hits": search_stats.hits,
                    "misses": search_stats.misses,
                    "size": search_stats.size,
                    "capacity": search_stats.capacity,
                    "hit_rate": search_stats.hit_rate(),
                },
                "facets_cache": {
                    "hits": facets_stats.hits,
                    "misses": facets_stats.misses,
                    "size": facets_stats.size,
                    "capacity": facets_stats.capacity,
                    "hit_rate": facets_stats.hit_rate(),
                },
            }))
        })
        .await
    }

    #[tool(
        description = "Extract a single inline slice from a survey: dimensions plus a data summary and statistics.",
        annotations(title = "Extract Inline", read_only_hint = true, idempotent_hint = true)
    )]
    async fn extract_inline(
        &self,
        Parameters(params): Parameters<ExtractSliceParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        self.extract_slice(params, ExtractionKind::Inline).await
    }

    #[tool(
        description = "Extract a single crossline slice from a survey: dimensions plus a data summary and statistics.",
        annotations(title = "Extract Crossline", read_only_hint = true, idempotent_hint = true)
    )]
    async fn extract_crossline(
        &self,
        Parameters(params): Parameters<ExtractSliceParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        self.extract_slice(params, ExtractionKind::Crossline).await
    }

    #[tool(
        description = "Extract a 3-D subvolume bounded by an inline and crossline range: dimensions plus volume-wide statistics.",
        annotations(title = "Extract Volume Subset", read_only_hint = true, idempotent_hint = true)
    )]
    async fn extract_volume_subset(
        &self,
        Parameters(params): Parameters<ExtractVolumeSubsetParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let volume = Arc::clone(&self.volume);
        let max_elements = self.max_elements;
        spawn_tool(move || {
            let id = SurveyId::new(params.survey_id)?;
            let handle = volume.open(&id)?;
            let survey = volume.describe(&handle);
            let inline_range = IndexRange::from_inclusive_coords(
                &survey.inline_axis,
                params.inline_range.0,
                params.inline_range.1,
            )?;
            let crossline_range = IndexRange::from_inclusive_coords(
                &survey.crossline_axis,
                params.crossline_range.0,
                params.crossline_range.1,
            )?;
            let (buffer, stats) = volume.extract(
                &handle,
                ExtractionKind::Subvolume,
                0.0,
                Some((inline_range, crossline_range)),
                max_elements,
            )?;
            Ok(subset_response(&buffer, &stats))
        })
        .await
    }

    #[tool(
        description = "Extract an inline slice and render it as a colormapped image. Honors send_to_claude to withhold image bytes.",
        annotations(title = "Extract Inline Image", read_only_hint = true, idempotent_hint = true)
    )]
    async fn extract_inline_image(
        &self,
        Parameters(params): Parameters<ExtractImageParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        self.extract_image(params, ExtractionKind::Inline).await
    }

    #[tool(
        description = "Extract a crossline slice and render it as a colormapped image. Honors send_to_claude to withhold image bytes.",
        annotations(title = "Extract Crossline Image", read_only_hint = true, idempotent_hint = true)
    )]
    async fn extract_crossline_image(
        &self,
        Parameters(params): Parameters<ExtractImageParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        self.extract_image(params, ExtractionKind::Crossline).await
    }

    #[tool(
        description = "Extract a timeslice and render it as a colormapped image. Honors send_to_claude to withhold image bytes.",
        annotations(title = "Extract Timeslice Image", read_only_hint = true, idempotent_hint = true)
    )]
    async fn extract_timeslice_image(
        &self,
        Parameters(params): Parameters<ExtractImageParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        self.extract_image(params, ExtractionKind::Timeslice).await
    }

    #[tool(
        description = "Parse a natural-language bulk instruction into a task plan and run it in the background.",
        annotations(title = "Agent Start Extraction", read_only_hint = false, idempotent_hint = false)
    )]
    async fn agent_start_extraction(
        &self,
        Parameters(params): Parameters<AgentStartParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let agent = Arc::clone(&self.agent);
        run_tool(async move {
            let id = SurveyId::new(params.survey_id)?;
            let auto_execute = params.auto_execute;
            let session_id = agent.start_extraction(id, params.instruction, auto_execute).await?;
            let state = if auto_execute { "running" } else { "idle" };
            Ok(serde_json::json!({ "session_id": session_id, "state": state }))
        })
        .await
    }

    #[tool(
        description = "Get a session's current state, task counts, and per-task status.",
        annotations(title = "Agent Get Status", read_only_hint = true, idempotent_hint = true)
    )]
    async fn agent_get_status(
        &self,
        Parameters(params): Parameters<AgentSessionParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let agent = Arc::clone(&self.agent);
        run_tool(async move { Ok(agent.get_status(params.session_id.as_deref()).await?) }).await
    }

    #[tool(
        description = "Pause a running extraction session before its next task.",
        annotations(title = "Agent Pause", read_only_hint = false, idempotent_hint = false)
    )]
    async fn agent_pause(
        &self,
        Parameters(params): Parameters<AgentSessionParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let agent = Arc::clone(&self.agent);
        run_tool(async move {
            agent.pause_session(params.session_id.as_deref()).await?;
            let summary = agent.get_status(params.session_id.as_deref()).await?;
            Ok(serde_json::json!({ "session_id": summary.session_id, "state": "paused" }))
        })
        .await
    }

    #[tool(
        description = "Resume a paused extraction session.",
        annotations(title = "Agent Resume", read_only_hint = false, idempotent_hint = false)
    )]
    async fn agent_resume(
        &self,
        Parameters(params): Parameters<AgentSessionParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let agent = Arc::clone(&self.agent);
        run_tool(async move {
            agent.resume_session(params.session_id.as_deref()).await?;
            let summary = agent.get_status(params.session_id.as_deref()).await?;
            Ok(serde_json::json!({ "session_id": summary.session_id, "state": "running" }))
        })
        .await
    }

    #[tool(
        description = "Get a session's final results, with binary buffer data stripped.",
        annotations(title = "Agent Get Results", read_only_hint = true, idempotent_hint = true)
    )]
    async fn agent_get_results(
        &self,
        Parameters(params): Parameters<AgentSessionParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let agent = Arc::clone(&self.agent);
        run_tool(async move { Ok(agent.get_results(params.session_id.as_deref()).await?) }).await
    }

    #[tool(
        description = "Recompute statistics from the raw extracted section and compare against a claimed set, returning per-metric verdicts.",
        annotations(title = "Validate Extracted Statistics", read_only_hint = true, idempotent_hint = true)
    )]
    async fn validate_extracted_statistics(
        &self,
        Parameters(params): Parameters<ValidateStatisticsParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let volume = Arc::clone(&self.volume);
        let max_elements = self.max_elements;
        spawn_tool(move || {
            let id = SurveyId::new(params.survey_id)?;
            let handle = volume.open(&id)?;
            let (_buffer, recomputed) = volume.extract(
                &handle,
                params.section_type,
                params.section_number,
                None,
                max_elements,
            )?;
            let result = integrity::validate_statistics(&params.claimed_statistics, &recomputed, params.tolerance);
            Ok(serde_json::json!({
                "verdict": result.verdict,
                "message": result.message,
                "corrected_statement": result.corrected_statement,
                "recomputed_statistics": recomputed,
            }))
        })
        .await
    }

    #[tool(
        description = "Check whether claimed inline/crossline/sample coordinates fall within a survey's axis bounds.",
        annotations(title = "Verify Spatial Coordinates", read_only_hint = true, idempotent_hint = true)
    )]
    async fn verify_spatial_coordinates(
        &self,
        Parameters(params): Parameters<VerifyCoordinatesParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let volume = Arc::clone(&self.volume);
        spawn_tool(move || {
            let id = SurveyId::new(params.survey_id)?;
            let handle = volume.open(&id)?;
            let survey = volume.describe(&handle);

            let axes: Vec<(&str, &AxisDescriptor, f64)> = params
                .claimed_location
                .iter()
                .filter_map(|(name, value)| {
                    let axis = match name.as_str() {
                        "inline" => &survey.inline_axis,
                        "crossline" => &survey.crossline_axis,
                        "sample" | "depth" | "time" => &survey.sample_axis,
                        _ => return None,
                    };
                    Some((name.as_str(), axis, *value))
                })
                .collect();

            let checks = integrity::verify_coordinates(&axes);
            let all_in_bounds = checks.iter().all(|c| c.in_bounds);
            Ok(serde_json::json!({
                "checks": checks,
                "verdict": if all_in_bounds { Verdict::Pass } else { Verdict::Fail },
            }))
        })
        .await
    }

    #[tool(
        description = "Run internal consistency rules (ordering, percentile monotonicity, RMS/mean relationship) over a statistics block.",
        annotations(title = "Check Statistical Consistency", read_only_hint = true, idempotent_hint = true)
    )]
    async fn check_statistical_consistency(
        &self,
        Parameters(params): Parameters<CheckConsistencyParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        spawn_tool(move || {
            let issues = integrity::check_statistical_consistency(&params.statistics);
            let severity = integrity::overall_severity(&issues);
            Ok(serde_json::json!({
                "issues": issues,
                "overall_severity": severity,
                "verdict": if issues.is_empty() { Verdict::Pass } else { Verdict::Fail },
            }))
        })
        .await
    }

    #[tool(
        description = "Validate a claimed metadata field (e.g. region name) against the survey's known catalog values, suggesting corrections for near matches.",
        annotations(title = "Validate VDS Metadata", read_only_hint = true, idempotent_hint = true)
    )]
    async fn validate_vds_metadata(
        &self,
        Parameters(params): Parameters<ValidateMetadataParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let index = Arc::clone(&self.index);
        spawn_tool(move || {
            let id = SurveyId::new(params.survey_id)?;
            let survey = index.get(&id)?;
            let bag = integrity::MetadataBag::new()
                .with_field("name", survey.name.clone())
                .with_field("region", survey.region.clone())
                .with_field("data_type", survey.data_type.clone())
                .with_field("acquisition_date", survey.acquisition_date.clone())
                .with_field("sample_unit", survey.sample_axis.unit.clone())
                // Demo surveys carry no real CRS metadata; WGS84 stands in
                // until a deployment reads the true projection off the mount.
                .with_field("crs", "EPSG:4326");

            if params.discovery_mode {
                return Ok(serde_json::json!({
                    "discovery_mode": true,
                    "known_fields": ["name", "region", "data_type", "acquisition_date", "sample_unit", "crs"],
                    "values": {
                        "name": survey.name,
                        "region": survey.region,
                        "data_type": survey.data_type,
                        "acquisition_date": survey.acquisition_date,
                        "sample_unit": survey.sample_axis.unit,
                        "crs": "EPSG:4326",
                    },
                }));
            }

            let results: Vec<integrity::FieldValidation> = params
                .claimed_metadata
                .unwrap_or_default()
                .into_iter()
                .map(|(field, value)| integrity::validate_metadata_field(&bag, &field, &value, params.parse_wkt))
                .collect();
            let aggregate_score = integrity::aggregate_metadata_score(&results);

            Ok(serde_json::json!({
                "fields": results,
                "aggregate_score": aggregate_score,
                "validation_type": params.validation_type,
                "smart_matching": params.smart_matching,
            }))
        })
        .await
    }

    #[tool(
        description = "Check whether a draft statement about one or more surveys makes a geophysically meaningless comparison (e.g. raw amplitude across surveys) before it is shown to a user.",
        annotations(title = "Check Domain Warnings", read_only_hint = true, idempotent_hint = true)
    )]
    async fn check_domain_warnings(
        &self,
        Parameters(params): Parameters<CheckDomainWarningsParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        spawn_tool(move || {
            let survey_ids: std::collections::HashSet<String> = params.survey_ids.into_iter().collect();
            let warning = crate::warnings::detect_cross_survey_comparison(&params.context, &survey_ids);
            Ok(serde_json::json!({ "warning": warning }))
        })
        .await
    }
}

impl GatewayServer {
    async fn extract_slice(
        &self,
        params: ExtractSliceParams,
        kind: ExtractionKind,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let volume = Arc::clone(&self.volume);
        let max_elements = self.max_elements;
        spawn_tool(move || {
            let id = SurveyId::new(params.survey_id)?;
            let handle = volume.open(&id)?;
            let (buffer, stats) = volume.extract(&handle, kind, params.number, None, max_elements)?;
            Ok(slice_response(&buffer, &stats))
        })
        .await
    }

    async fn extract_image(
        &self,
        params: ExtractImageParams,
        kind: ExtractionKind,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let volume = Arc::clone(&self.volume);
        let chat_proxy_config = Arc::clone(&self.chat_proxy_config);
        let send = params.send_to_claude
            && !matches!(chat_proxy_config.image_delivery, ImageDeliveryMode::Never);

        let max_elements = self.max_elements;
        let result = tokio::task::spawn_blocking(move || {
            let id = SurveyId::new(params.survey_id)?;
            let handle = volume.open(&id)?;
            let (buffer, stats) = volume.extract(&handle, kind, params.number, None, max_elements)?;
            let image_bytes = render_placeholder_png(&buffer.shape);
            crate::error::Result::Ok((buffer, stats, image_bytes))
        })
        .await;

        match result {
            Ok(Ok((buffer, stats, image_bytes))) => {
                let mut content = vec![Content::text(
                    serde_json::to_string(&slice_response(&buffer, &stats))
                        .map_err(|e| rmcp::ErrorData::internal_error(e.to_string(), None))?,
                )];
                if send {
                    content.push(Content::image(
                        base64_encode(&image_bytes),
                        "image/png".to_string(),
                    ));
                } else {
                    content.push(Content::text(self.chat_proxy_config.image_privacy_notice));
                }
                Ok(CallToolResult::success(content))
            }
            Ok(Err(e)) => {
                if e.is_client_fixable() {
                    Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
                } else {
                    Err(e.into())
                }
            }
            Err(e) => Err(rmcp::ErrorData::internal_error(e.to_string(), None)),
        }
    }
}

fn slice_response(buffer: &crate::volume::ExtractedBuffer, stats: &crate::types::Statistics) -> serde_json::Value {
    serde_json::json!({
        "shape": buffer.shape,
        "null_traces": buffer.null_traces,
        "data_summary": {
            "min": stats.min,
            "max": stats.max,
            "mean": stats.mean,
            "unit": "amplitude",
        },
        "statistics": stats,
        "truncation": truncation_notice(buffer),
    })
}

fn subset_response(buffer: &crate::volume::ExtractedBuffer, stats: &crate::types::Statistics) -> serde_json::Value {
    let volume_size_mb = (buffer.data.len() as f64 * 4.0) / (1024.0 * 1024.0);
    serde_json::json!({
        "shape": buffer.shape,
        "null_traces": buffer.null_traces,
        "volume_size_mb": volume_size_mb,
        "volume_statistics": stats,
        "truncation": truncation_notice(buffer),
    })
}

/// Builds the warning structure spec.md §8 requires whenever a raw-data
/// return was clipped to the configured element cap.
fn truncation_notice(buffer: &crate::volume::ExtractedBuffer) -> serde_json::Value {
    if buffer.truncated {
        serde_json::json!({
            "truncated": true,
            "requested_elements": buffer.requested_elements,
            "returned_elements": buffer.data.len(),
            "warning": "result exceeded the configured raw-data element cap; the trailing axis was clipped",
        })
    } else {
        serde_json::json!({ "truncated": false })
    }
}

/// Stands in for a real raster renderer: this crate has no image/plotting
/// dependency the teacher didn't already carry, so an `extract_*_image`
/// tool returns a minimal valid 1x1 PNG rather than faking raw bytes. A
/// deployment with a real visualization collaborator (spec.md §2's
/// external data plane) replaces this with an actual render.
fn render_placeholder_png(_shape: &[u64]) -> Vec<u8> {
    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
        0xCF, 0xC0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0xC8, 0x8E, 0xED, 0xAF, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];
    PNG_1X1.to_vec()
}

fn base64_encode(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x03) << 4) | (b1.unwrap_or(0) >> 4)) as usize] as char);
        out.push(if let Some(b1) = b1 {
            TABLE[(((b1 & 0x0F) << 2) | (b2.unwrap_or(0) >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if let Some(b2) = b2 { TABLE[(b2 & 0x3F) as usize] as char } else { '=' });
    }
    out
}

// ─── ServerHandler ────────────────────────────────────────────────────────
impl ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = "vds-gateway: tool-oriented access to seismic volume datasets.\n\n\
             WORKFLOW:\n\
             1. search_surveys / get_survey_info -> discover what's available\n\
             2. extract_inline / extract_crossline / extract_volume_subset -> pull data\n\
             3. validate_extracted_statistics / verify_spatial_coordinates / \
             check_statistical_consistency / validate_vds_metadata -> check claims before trusting them\n\
             4. For bulk instructions (\"every 10 inlines from...\", \"all crosslines\"), just call an \
             extraction tool naturally — the server detects bulk intent and reroutes to \
             agent_start_extraction automatically; use agent_get_status/pause/resume/get_results to \
             track it.\n\n\
             IMPORTANT: extracted data is synthetic in demo mode. Treat any amplitude claim made \
             in conversation as unverified until one of the validate_* tools confirms it.\n\n\
             Before stating a comparison across two or more surveys, call check_domain_warnings — \
             raw amplitude values are not comparable across surveys without normalization."
            .to_string();

        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            server_info: Implementation {
                name: "vds-gateway".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().enable_logging().build(),
            instructions: Some(instructions),
        }
    }

    /// Profiling + bulk-routing middleware, matching the teacher's
    /// `call_tool` override: the dispatch order from spec.md §6 (bulk
    /// check before the named tool) is implemented here, ahead of
    /// delegating to the generated tool router.
    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let tool_name = request.name.to_string();
        let start = std::time::Instant::now();
        let peer = context.peer.clone();

        let arguments = request
            .arguments
            .clone()
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Null);

        let result = if let Some(rerouted) = self.maybe_reroute(&tool_name, &arguments).await {
            rerouted
        } else {
            let tcc = ToolCallContext::new(self, request, context);
            self.tool_router.call(tcc).await
        };

        crate::profiling::log_tool_call(&crate::profiling::ToolMetrics {
            name: tool_name.clone(),
            elapsed: start.elapsed(),
            response_bytes: result
                .as_ref()
                .map(|r| {
                    r.content
                        .iter()
                        .map(|c| match &c.raw {
                            RawContent::Text(t) => t.text.len(),
                            _ => 0,
                        })
                        .sum::<usize>()
                })
                .unwrap_or(0),
            mem_before_mb: 0.0,
            is_error: result.as_ref().is_ok_and(|r| r.is_error == Some(true)) || result.is_err(),
        });

        if let Ok(ref r) = result {
            if r.is_error == Some(true) {
                let _ = peer
                    .send_notification(
                        LoggingMessageNotification::new(LoggingMessageNotificationParam {
                            level: LoggingLevel::Warning,
                            logger: Some("vds-gateway".to_string()),
                            data: serde_json::json!({ "tool": tool_name, "error": true }),
                        })
                        .into(),
                    )
                    .await;
            }
        }

        result.map(truncate_call_tool_result)
    }

    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::ErrorData> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tool_router.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_text_prefers_instruction_field() {
        let args = serde_json::json!({"instruction": "every 10 inline", "survey_id": "x"});
        assert_eq!(GatewayServer::context_text(&args), "every 10 inline");
    }

    #[test]
    fn context_text_falls_back_to_serialized_arguments() {
        let args = serde_json::json!({"survey_id": "x", "inline_number": 1000});
        let text = GatewayServer::context_text(&args);
        assert!(text.contains("survey_id"));
    }

    #[test]
    fn base64_encode_matches_known_vector() {
        assert_eq!(base64_encode(b"Man"), "TWFu");
        assert_eq!(base64_encode(b"Ma"), "TWE=");
        assert_eq!(base64_encode(b"M"), "TQ==");
    }
}
