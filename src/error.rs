//! Error taxonomy for the gateway.
//!
//! Uses thiserror for ergonomic error chains. Validation and integrity
//! outcomes (`PASS`/`FAIL`/`OUT_OF_BOUNDS`) are *data*, never errors here —
//! see [`crate::integrity`]. This module only models failures that prevent a
//! tool call from producing a result at all.

use thiserror::Error;

/// Top-level gateway error, returned from any component operation that can
/// fail outright (as opposed to producing a structured FAIL verdict).
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("selector range is empty after clamping: [{lo}, {hi})")]
    InvalidRange { lo: i64, hi: i64 },

    #[error("could not parse instruction: {0}")]
    UnparsableInstruction(String),

    #[error("{resource} unavailable: {reason}")]
    Unavailable { resource: String, reason: String },

    #[error("extraction failed: {cause}")]
    ExtractionFailed { cause: String },

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors specific to agent session / task management.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {session_id} is not running (state: {state})")]
    NotRunning { session_id: String, state: String },

    #[error("session {session_id} is not paused (state: {state})")]
    NotPaused { session_id: String, state: String },

    #[error("no active session")]
    NoActiveSession,
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Returns a machine-readable error code, matching spec.md's error
    /// taxonomy (`NotFound`, `InvalidArgument`, `OutOfBounds`, `Unavailable`,
    /// `ExtractionFailed`, `Internal`). `IntegrityViolation` has no variant
    /// here: it is surfaced as a data verdict, never thrown.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidRange { .. } => "INVALID_ARGUMENT",
            Self::UnparsableInstruction(_) => "INVALID_ARGUMENT",
            Self::Unavailable { .. } => "UNAVAILABLE",
            Self::ExtractionFailed { .. } => "EXTRACTION_FAILED",
            Self::Agent(e) => e.code(),
            Self::Io(_) => "INTERNAL",
            Self::Json(_) => "INTERNAL",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the caller (the LLM driving the tool call) can plausibly fix
    /// this by changing its arguments, vs. a server-side fault that should
    /// be logged with more detail than it is shown.
    #[must_use]
    pub fn is_client_fixable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InvalidArgument(_)
                | Self::InvalidRange { .. }
                | Self::UnparsableInstruction(_)
                | Self::Agent(_)
        )
    }
}

impl AgentError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "NOT_FOUND",
            Self::NotRunning { .. } | Self::NotPaused { .. } => "INVALID_ARGUMENT",
            Self::NoActiveSession => "NOT_FOUND",
        }
    }
}

impl From<GatewayError> for rmcp::Error {
    fn from(err: GatewayError) -> Self {
        if err.is_client_fixable() {
            rmcp::Error::invalid_params(err.to_string(), None)
        } else {
            rmcp::Error::internal_error(err.to_string(), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_fixable_errors_are_classified() {
        assert!(GatewayError::NotFound("x".into()).is_client_fixable());
        assert!(GatewayError::InvalidRange { lo: 5, hi: 5 }.is_client_fixable());
        assert!(!GatewayError::Internal("boom".into()).is_client_fixable());
    }

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(GatewayError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(
            GatewayError::Unavailable {
                resource: "index".into(),
                reason: "timeout".into()
            }
            .code(),
            "UNAVAILABLE"
        );
    }
}
