//! Agent Manager (C7): plans and executes multi-task extraction instructions
//! in the background, with pausable/resumable sessions.
//!
//! Grounded in `original_source/src/agent_manager.py`'s
//! `SeismicAgentManager`. The instruction grammar (five priority-ordered
//! patterns) and task/session shapes are kept; the execution loop is
//! redesigned per spec.md §9's explicit flag: the Python original's
//! pause check is a busy-wait (`while session.state == PAUSED: await
//! asyncio.sleep(1)`), which this crate replaces with a
//! [`tokio::sync::Notify`]-based signal, grounded in the teacher's own
//! `mpsc`-channel forwarder pattern in `server.rs` for connecting an
//! internal async event to the outside world.

use crate::error::{AgentError, GatewayError};
use crate::types::{ExtractionKind, IndexRange, SurveyId};
use crate::volume::{ExtractedBuffer, VolumeAccess};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// Delay between sequential task executions, matching the Python
/// original's `await asyncio.sleep(0.5)` pacing.
const INTER_TASK_DELAY: Duration = Duration::from_millis(500);

/// Mirrors `AgentState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Planning,
    Running,
    Paused,
    Completed,
    Error,
}

impl AgentState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Mirrors `ExtractionTask`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionTask {
    pub task_id: String,
    pub kind: ExtractionKind,
    pub number: f64,
    pub depth_range: Option<(f64, f64)>,
    pub priority: u32,
    pub status: TaskStatus,
    #[serde(skip)]
    pub result: Option<Arc<ExtractedBuffer>>,
    pub error: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Mirrors `AgentSession`. Guarded by the manager's mutex; the `Notify` is
/// used to wake an in-flight execution loop on resume.
pub struct AgentSession {
    pub session_id: String,
    pub survey_id: SurveyId,
    pub instruction: String,
    pub state: AgentState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub tasks: Vec<ExtractionTask>,
    pub completed_count: u32,
    pub failed_count: u32,
    pub current_task: Option<usize>,
    resume_signal: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

/// A results view with binary buffer data stripped, matching
/// `get_results`'s response shape.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub survey_id: String,
    pub instruction: String,
    pub state: AgentState,
    pub completed_count: u32,
    pub failed_count: u32,
    pub total_tasks: usize,
    pub current_task: Option<usize>,
    pub tasks: Vec<ExtractionTask>,
}

impl AgentSession {
    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            survey_id: self.survey_id.as_str().to_string(),
            instruction: self.instruction.clone(),
            state: self.state,
            completed_count: self.completed_count,
            failed_count: self.failed_count,
            total_tasks: self.tasks.len(),
            current_task: self.current_task,
            tasks: self.tasks.clone(),
        }
    }
}

/// Five priority-ordered instruction grammars, matching `_parse_instruction`.
/// The stride/step number tolerates an ordinal suffix ("every 1000th
/// inline") the way the original's bare `re.findall(r'\d+', ...)` does by
/// simply not caring about trailing letters.
static EVERY_N_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)every\s+(\d+)(?:st|nd|rd|th)?\s+(inline|crossline)s?\s+from\s+(\d+)\s+to\s+(\d+)").unwrap()
});
static SKIPPING_N_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)every\s+(\d+)(?:st|nd|rd|th)?\s+(inline|crossline)s?\s*,?\s*skipping\s+\d+\s+with\s+start\s+at\s+(\d+)\s+through\s+(\d+)",
    )
    .unwrap()
});
static SPACED_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(inline|crossline)s?\s+from\s+(\d+)\s+to\s+(\d+)\s+at\s+(\d+)\s+spacing").unwrap()
});
static EXPLICIT_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(inline|crossline)s?\s+((?:\d+\s*,\s*)+\d+)").unwrap()
});
static GENERIC_EVERY_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)every\s+(\d+)(?:st|nd|rd|th)?\s+(inline|crossline)s?").unwrap());

/// Depth/sample/time-range clause, matching `agent_manager.py`'s
/// `(?:depth|sample|time)[^\d]*(\d+)[^\d]*(\d+)`. Matched and stripped out
/// of the instruction *before* the line-number grammars above run, so a
/// depth endpoint never gets misread as an inline/crossline number.
static DEPTH_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:depth|sample|time)\D*?(\d+)\D*?(\d+)").unwrap());

fn parse_kind(token: &str) -> ExtractionKind {
    if token.eq_ignore_ascii_case("crossline") {
        ExtractionKind::Crossline
    } else {
        ExtractionKind::Inline
    }
}

/// Parses a natural-language bulk instruction into a plan of numbers to
/// extract plus an optional depth/sample/time sub-range, matching
/// `_parse_instruction`'s five-priority grammar and its depth-range
/// extraction step.
///
/// # Errors
///
/// Returns `GatewayError::UnparsableInstruction` if none of the five
/// patterns match.
pub fn parse_instruction(
    raw_instruction: &str,
) -> Result<(ExtractionKind, Vec<f64>, Option<(f64, f64)>), GatewayError> {
    let depth_range = DEPTH_RANGE.captures(raw_instruction).map(|caps| {
        let a: f64 = caps[1].parse().unwrap_or(0.0);
        let b: f64 = caps[2].parse().unwrap_or(0.0);
        (a.min(b), a.max(b))
    });
    // Strip the depth/sample/time clause before matching the line-number
    // grammars, so its endpoints are never picked up as inline/crossline
    // numbers (spec.md §4.7: "remove depth endpoints before interpreting
    // them as line numbers").
    let without_depth = match DEPTH_RANGE.find(raw_instruction) {
        Some(m) => {
            let mut s = raw_instruction.to_string();
            s.replace_range(m.range(), " ");
            s
        }
        None => raw_instruction.to_string(),
    };
    let instruction = without_depth.as_str();

    if let Some(caps) = EVERY_N_RANGE.captures(instruction) {
        let step: u64 = caps[1].parse().unwrap_or(1).max(1);
        let kind = parse_kind(&caps[2]);
        let start: u64 = caps[3].parse().unwrap_or(0);
        let end: u64 = caps[4].parse().unwrap_or(0);
        return Ok((kind, stepped_range(start, end, step), depth_range));
    }

    if let Some(caps) = SKIPPING_N_RANGE.captures(instruction) {
        let step: u64 = caps[1].parse().unwrap_or(1).max(1);
        let kind = parse_kind(&caps[2]);
        let start: u64 = caps[3].parse().unwrap_or(0);
        let end: u64 = caps[4].parse().unwrap_or(0);
        return Ok((kind, stepped_range(start, end, step), depth_range));
    }

    if let Some(caps) = SPACED_RANGE.captures(instruction) {
        let kind = parse_kind(&caps[1]);
        let start: u64 = caps[2].parse().unwrap_or(0);
        let end: u64 = caps[3].parse().unwrap_or(0);
        let step: u64 = caps[4].parse().unwrap_or(1).max(1);
        return Ok((kind, stepped_range(start, end, step), depth_range));
    }

    if let Some(caps) = EXPLICIT_LIST.captures(instruction) {
        let kind = parse_kind(&caps[1]);
        let numbers: Vec<f64> = caps[2]
            .split(',')
            .filter_map(|n| n.trim().parse::<f64>().ok())
            .collect();
        if !numbers.is_empty() {
            return Ok((kind, numbers, depth_range));
        }
    }

    if let Some(caps) = GENERIC_EVERY_N.captures(instruction) {
        let step: u64 = caps[1].parse().unwrap_or(1).max(1);
        let kind = parse_kind(&caps[2]);
        // No explicit range given; plan a fixed small run starting at 0,
        // matching the Python original's fallback of using the survey's
        // full axis — callers narrow this against the actual survey axis
        // before building tasks.
        return Ok((kind, stepped_range(0, step * 10, step), depth_range));
    }

    Err(GatewayError::UnparsableInstruction(raw_instruction.to_string()))
}

fn stepped_range(start: u64, end: u64, step: u64) -> Vec<f64> {
    if start > end {
        return Vec::new();
    }
    (start..=end).step_by(step.max(1) as usize).map(|n| n as f64).collect()
}

/// Agent Manager: owns all sessions and runs their task loops.
pub struct AgentManager {
    volume: Arc<VolumeAccess>,
    max_elements: usize,
    sessions: Mutex<HashMap<String, Arc<Mutex<AgentSession>>>>,
    /// The most recently started session, so session-scoped tools can omit
    /// `session_id` and act on "the" session (spec.md §4.7).
    active_session: Mutex<Option<String>>,
}

impl AgentManager {
    #[must_use]
    pub fn new(volume: Arc<VolumeAccess>, max_elements: usize) -> Self {
        Self {
            volume,
            max_elements,
            sessions: Mutex::new(HashMap::new()),
            active_session: Mutex::new(None),
        }
    }

    /// Parses `instruction`, builds a task plan, starts a new session, and —
    /// unless `auto_execute` is `false` — spawns its execution loop in the
    /// background. Matches `start_extraction`. The new session becomes the
    /// tracked active session regardless of `auto_execute`.
    ///
    /// When `auto_execute` is `false` the session is planned only: its
    /// state settles at `Idle` and no task runs until a caller resumes it
    /// explicitly (spec.md §4.7, "schedule planning only").
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UnparsableInstruction` if the instruction
    /// cannot be parsed, or propagates `VolumeAccess::open`'s error if the
    /// survey is unknown.
    pub async fn start_extraction(
        self: &Arc<Self>,
        survey_id: SurveyId,
        instruction: String,
        auto_execute: bool,
    ) -> Result<String, GatewayError> {
        let handle = self.volume.open(&survey_id)?;
        let (kind, numbers, depth_range) = parse_instruction(&instruction)?;
        let axis = handle.survey.axis_for(kind);

        let tasks: Vec<ExtractionTask> = numbers
            .into_iter()
            .filter(|n| *n >= axis.coordinate_min && *n <= axis.coordinate_max)
            .enumerate()
            .map(|(i, number)| ExtractionTask {
                task_id: Uuid::new_v4().to_string(),
                kind,
                number,
                depth_range,
                priority: i as u32,
                status: TaskStatus::Pending,
                result: None,
                error: None,
                started_at: None,
                completed_at: None,
            })
            .collect();

        // spec.md §4.7: "An instruction that yields zero tasks fails the
        // whole planning step" — matches the original's `if not tasks:
        // raise ValueError(...)`.
        if tasks.is_empty() {
            return Err(GatewayError::UnparsableInstruction(format!(
                "instruction \"{instruction}\" matched a bulk grammar but every candidate line number fell outside the survey's axis range"
            )));
        }

        let session_id = Uuid::new_v4().to_string();
        let session = AgentSession {
            session_id: session_id.clone(),
            survey_id,
            instruction,
            state: if auto_execute { AgentState::Planning } else { AgentState::Idle },
            created_at: chrono::Utc::now(),
            tasks,
            completed_count: 0,
            failed_count: 0,
            current_task: None,
            resume_signal: Arc::new(Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let session = Arc::new(Mutex::new(session));

        {
            let mut sessions = self.sessions.lock().await;
            sessions.insert(session_id.clone(), Arc::clone(&session));
        }
        {
            let mut active = self.active_session.lock().await;
            *active = Some(session_id.clone());
        }

        if auto_execute {
            let manager = Arc::clone(self);
            let session_for_task = Arc::clone(&session);
            tokio::spawn(async move {
                manager.run_session(session_for_task).await;
            });
        }

        Ok(session_id)
    }

    /// Sequential task execution loop, matching `_execute_tasks`. Pausing
    /// is signaled, not polled: a paused loop awaits
    /// `session.resume_signal.notified()` instead of sleeping in a spin
    /// loop.
    async fn run_session(self: Arc<Self>, session: Arc<Mutex<AgentSession>>) {
        {
            let mut guard = session.lock().await;
            guard.state = AgentState::Running;
        }

        let task_count = session.lock().await.tasks.len();

        for idx in 0..task_count {
            loop {
                let (state, resume_signal, cancelled) = {
                    let guard = session.lock().await;
                    (guard.state, Arc::clone(&guard.resume_signal), Arc::clone(&guard.cancelled))
                };
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                if state != AgentState::Paused {
                    break;
                }
                resume_signal.notified().await;
            }

            let (survey_id, kind, number, depth_range) = {
                let mut guard = session.lock().await;
                guard.current_task = Some(idx);
                guard.tasks[idx].status = TaskStatus::Running;
                guard.tasks[idx].started_at = Some(chrono::Utc::now());
                (
                    guard.survey_id.clone(),
                    guard.tasks[idx].kind,
                    guard.tasks[idx].number,
                    guard.tasks[idx].depth_range,
                )
            };

            let volume = Arc::clone(&self.volume);
            let max_elements = self.max_elements;
            let outcome = tokio::task::spawn_blocking(move || {
                let handle = volume.open(&survey_id)?;
                // Only the sample-axis half of `sub_ranges` is honored for
                // inline/crossline extraction (volume.rs ignores the other
                // slot for these kinds), so it is duplicated here rather
                // than threading through the orthogonal axis's own range.
                let sub_ranges = depth_range
                    .map(|(lo, hi)| IndexRange::from_inclusive_coords(&handle.survey.sample_axis, lo, hi))
                    .transpose()?
                    .map(|r| (r, r));
                volume
                    .extract(&handle, kind, number, sub_ranges, max_elements)
                    .map(|(buffer, _stats)| buffer)
            })
            .await;

            let mut guard = session.lock().await;
            match outcome {
                Ok(Ok(buffer)) => {
                    guard.tasks[idx].status = TaskStatus::Completed;
                    guard.tasks[idx].result = Some(Arc::new(buffer));
                    guard.completed_count += 1;
                }
                Ok(Err(e)) => {
                    guard.tasks[idx].status = TaskStatus::Failed;
                    guard.tasks[idx].error = Some(e.to_string());
                    guard.failed_count += 1;
                }
                Err(join_err) => {
                    guard.tasks[idx].status = TaskStatus::Failed;
                    guard.tasks[idx].error = Some(format!("task panicked: {join_err}"));
                    guard.failed_count += 1;
                }
            }
            guard.tasks[idx].completed_at = Some(chrono::Utc::now());
            drop(guard);

            tokio::time::sleep(INTER_TASK_DELAY).await;
        }

        let mut guard = session.lock().await;
        guard.current_task = None;
        guard.state = if guard.failed_count > 0 && guard.completed_count == 0 {
            AgentState::Error
        } else {
            AgentState::Completed
        };
    }

    /// Current status summary for a session, matching `get_status`. Falls
    /// back to the tracked active session when `session_id` is omitted.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::SessionNotFound` if the id is unknown, or
    /// `AgentError::NoActiveSession` if none was given and none has been
    /// started yet.
    pub async fn get_status(&self, session_id: Option<&str>) -> Result<SessionSummary, AgentError> {
        let session = self.lookup(session_id).await?;
        let guard = session.lock().await;
        Ok(guard.summary())
    }

    /// Signals a running session to pause before its next task, matching
    /// `pause_session`. Falls back to the tracked active session when
    /// `session_id` is omitted.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::NotRunning` if the session is not currently
    /// running.
    pub async fn pause_session(&self, session_id: Option<&str>) -> Result<(), AgentError> {
        let session = self.lookup(session_id).await?;
        let mut guard = session.lock().await;
        if guard.state != AgentState::Running {
            return Err(AgentError::NotRunning {
                session_id: guard.session_id.clone(),
                state: guard.state.as_str().to_string(),
            });
        }
        guard.state = AgentState::Paused;
        Ok(())
    }

    /// Wakes a paused session's execution loop, matching `resume_session`.
    /// Falls back to the tracked active session when `session_id` is
    /// omitted. Resuming an `Idle` session planned with `auto_execute =
    /// false` starts its execution loop for the first time.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::NotPaused` if the session is neither paused nor
    /// idle.
    pub async fn resume_session(self: &Arc<Self>, session_id: Option<&str>) -> Result<(), AgentError> {
        let session = self.lookup(session_id).await?;
        let mut guard = session.lock().await;
        if guard.state != AgentState::Paused && guard.state != AgentState::Idle {
            return Err(AgentError::NotPaused {
                session_id: guard.session_id.clone(),
                state: guard.state.as_str().to_string(),
            });
        }
        let was_idle = guard.state == AgentState::Idle;
        guard.state = AgentState::Running;
        guard.resume_signal.notify_waiters();
        drop(guard);

        if was_idle {
            let manager = Arc::clone(self);
            let session_for_task = Arc::clone(&session);
            tokio::spawn(async move {
                manager.run_session(session_for_task).await;
            });
        }
        Ok(())
    }

    /// Final results with binary buffer data stripped, matching
    /// `get_results`. Falls back to the tracked active session when
    /// `session_id` is omitted.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::SessionNotFound` if the id is unknown.
    pub async fn get_results(&self, session_id: Option<&str>) -> Result<SessionSummary, AgentError> {
        self.get_status(session_id).await
    }

    async fn lookup(&self, session_id: Option<&str>) -> Result<Arc<Mutex<AgentSession>>, AgentError> {
        let resolved = match session_id {
            Some(id) => id.to_string(),
            None => self
                .active_session
                .lock()
                .await
                .clone()
                .ok_or(AgentError::NoActiveSession)?,
        };
        let sessions = self.sessions.lock().await;
        sessions
            .get(&resolved)
            .cloned()
            .ok_or(AgentError::SessionNotFound(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_n_with_range() {
        let (kind, numbers, depth_range) = parse_instruction("extract every 10 inline from 1000 to 1030").unwrap();
        assert_eq!(kind, ExtractionKind::Inline);
        assert_eq!(numbers, vec![1000.0, 1010.0, 1020.0, 1030.0]);
        assert_eq!(depth_range, None);
    }

    #[test]
    fn parses_skipping_with_start_through() {
        let (kind, numbers, _) =
            parse_instruction("every 20 crossline, skipping 19 with start at 500 through 560").unwrap();
        assert_eq!(kind, ExtractionKind::Crossline);
        assert_eq!(numbers, vec![500.0, 520.0, 540.0, 560.0]);
    }

    #[test]
    fn parses_spaced_range() {
        let (kind, numbers, _) = parse_instruction("inlines from 1000 to 1020 at 10 spacing").unwrap();
        assert_eq!(kind, ExtractionKind::Inline);
        assert_eq!(numbers, vec![1000.0, 1010.0, 1020.0]);
    }

    #[test]
    fn parses_explicit_list() {
        let (kind, numbers, _) = parse_instruction("crosslines 500, 600, 700").unwrap();
        assert_eq!(kind, ExtractionKind::Crossline);
        assert_eq!(numbers, vec![500.0, 600.0, 700.0]);
    }

    #[test]
    fn unparsable_instruction_errors() {
        let result = parse_instruction("please extract something interesting");
        assert!(matches!(result, Err(GatewayError::UnparsableInstruction(_))));
    }

    #[test]
    fn tolerates_ordinal_suffix_on_step_number() {
        let (kind, numbers, _) =
            parse_instruction("extract every 1000th inline from 51000 to 59000").unwrap();
        assert_eq!(kind, ExtractionKind::Inline);
        assert_eq!(numbers, vec![51000.0, 52000.0, 53000.0, 54000.0, 55000.0, 56000.0, 57000.0, 58000.0, 59000.0]);
    }

    #[test]
    fn strips_depth_range_before_reading_line_numbers() {
        let (kind, numbers, depth_range) =
            parse_instruction("crosslines 500, 600, 700 between depth 100 and 2000").unwrap();
        assert_eq!(kind, ExtractionKind::Crossline);
        assert_eq!(numbers, vec![500.0, 600.0, 700.0]);
        assert_eq!(depth_range, Some((100.0, 2000.0)));
    }

    #[tokio::test]
    async fn zero_matching_tasks_fails_planning() {
        let volume = Arc::new(VolumeAccess::new(Vec::new()));
        let manager = Arc::new(AgentManager::new(volume, 0));
        let survey_id = SurveyId::new("demo_gulf_mexico_2023").unwrap();
        let result = manager
            .start_extraction(survey_id, "crosslines 999999, 999998, 999997".to_string(), true)
            .await;
        assert!(matches!(result, Err(GatewayError::UnparsableInstruction(_))));
    }

    #[tokio::test]
    async fn start_extraction_runs_to_completion() {
        let volume = Arc::new(VolumeAccess::new(Vec::new()));
        let manager = Arc::new(AgentManager::new(volume, 0));
        let survey_id = SurveyId::new("demo_gulf_mexico_2023").unwrap();

        let session_id = manager
            .start_extraction(survey_id, "inlines from 1000 to 1020 at 10 spacing".to_string(), true)
            .await
            .unwrap();

        let mut summary = manager.get_status(Some(&session_id)).await.unwrap();
        for _ in 0..50 {
            if matches!(summary.state, AgentState::Completed | AgentState::Error) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            summary = manager.get_status(Some(&session_id)).await.unwrap();
        }

        assert_eq!(summary.state, AgentState::Completed);
        assert_eq!(summary.completed_count, 3);

        // Omitting session_id falls back to the tracked active session.
        let active_summary = manager.get_status(None).await.unwrap();
        assert_eq!(active_summary.session_id, session_id);
    }

    #[tokio::test]
    async fn pause_requires_running_state() {
        let volume = Arc::new(VolumeAccess::new(Vec::new()));
        let manager = Arc::new(AgentManager::new(volume, 0));
        let result = manager.pause_session(Some("not-a-real-session")).await;
        assert!(matches!(result, Err(AgentError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn missing_session_id_without_active_session_errors() {
        let volume = Arc::new(VolumeAccess::new(Vec::new()));
        let manager = Arc::new(AgentManager::new(volume, 0));
        let result = manager.get_status(None).await;
        assert!(matches!(result, Err(AgentError::NoActiveSession)));
    }

    #[tokio::test]
    async fn start_extraction_rejects_unknown_survey() {
        let volume = Arc::new(VolumeAccess::new(Vec::new()));
        let manager = Arc::new(AgentManager::new(volume, 0));
        let survey_id = SurveyId::new("does_not_exist").unwrap();
        let result = manager
            .start_extraction(survey_id, "every 10 inline from 1000 to 1020".to_string(), true)
            .await;
        assert!(matches!(result, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn auto_execute_false_plans_without_running() {
        let volume = Arc::new(VolumeAccess::new(Vec::new()));
        let manager = Arc::new(AgentManager::new(volume, 0));
        let survey_id = SurveyId::new("demo_gulf_mexico_2023").unwrap();

        let session_id = manager
            .start_extraction(survey_id, "inlines from 1000 to 1020 at 10 spacing".to_string(), false)
            .await
            .unwrap();

        // Give any (incorrectly) spawned task loop a chance to run; state
        // must stay Idle since auto_execute was false.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let summary = manager.get_status(Some(&session_id)).await.unwrap();
        assert_eq!(summary.state, AgentState::Idle);
        assert_eq!(summary.completed_count, 0);

        manager.resume_session(Some(&session_id)).await.unwrap();

        let mut summary = manager.get_status(Some(&session_id)).await.unwrap();
        for _ in 0..50 {
            if matches!(summary.state, AgentState::Completed | AgentState::Error) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            summary = manager.get_status(Some(&session_id)).await.unwrap();
        }
        assert_eq!(summary.state, AgentState::Completed);
        assert_eq!(summary.completed_count, 3);
    }
}
