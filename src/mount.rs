//! Mount Health (C4): checks whether a mounted data root is actually
//! readable, distinguishing "gone" from "stale" from "fine".
//!
//! Grounded in `original_source/src/mount_health.py`'s `MountHealthChecker`.
//! Filesystem calls (`read_dir`) are blocking, so every check runs through
//! `tokio::task::spawn_blocking`, wrapped in `tokio::time::timeout` the same
//! way the Python original wraps `run_in_executor` in `asyncio.timeout`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mirrors `MountHealthStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountHealthStatus {
    Healthy,
    Stale,
    Inaccessible,
    NotFound,
    PermissionDenied,
}

impl MountHealthStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Stale => "stale",
            Self::Inaccessible => "inaccessible",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
        }
    }

    /// Matches `get_remediation_advice`.
    #[must_use]
    pub fn remediation_advice(self) -> &'static str {
        match self {
            Self::Healthy => "no action needed",
            Self::Stale => "the mount has a stale file handle; unmount and remount the volume",
            Self::Inaccessible => "check the mount's network connectivity and retry",
            Self::NotFound => "the configured path does not exist; verify the mount configuration",
            Self::PermissionDenied => "the process lacks permission to read this path; check ownership and mode",
        }
    }
}

/// Result of one health check.
#[derive(Debug, Clone)]
pub struct MountHealthResult {
    pub path: PathBuf,
    pub status: MountHealthStatus,
    pub detail: Option<String>,
    pub entry_count: Option<usize>,
}

pub struct MountHealthChecker {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl MountHealthChecker {
    #[must_use]
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Checks a single mount path once. Blocking; spawned onto a blocking
    /// thread and bounded by `self.timeout`, matching
    /// `check_mount_health`'s `asyncio.timeout` + `run_in_executor`.
    pub async fn check_mount_health(&self, path: &Path) -> MountHealthResult {
        let path = path.to_path_buf();
        let probe = path.clone();

        let blocking = tokio::task::spawn_blocking(move || probe_mount(&probe));

        match tokio::time::timeout(self.timeout, blocking).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => MountHealthResult {
                path,
                status: MountHealthStatus::Inaccessible,
                detail: Some(format!("health check task panicked: {join_err}")),
                entry_count: None,
            },
            Err(_elapsed) => MountHealthResult {
                path,
                status: MountHealthStatus::Inaccessible,
                detail: Some(format!("health check timed out after {:?}", self.timeout)),
                entry_count: None,
            },
        }
    }

    /// Checks every path concurrently, matching `check_multiple_mounts`'s
    /// `asyncio.gather`.
    pub async fn check_multiple_mounts(&self, paths: &[PathBuf]) -> Vec<MountHealthResult> {
        let futures = paths.iter().map(|p| self.check_mount_health(p));
        futures::future::join_all(futures).await
    }

    /// Polls `path` with exponential backoff (`delay = retry_delay *
    /// 2^retry_count`) until healthy or `max_retries` exhausted, matching
    /// `wait_for_mount_ready`.
    pub async fn wait_for_mount_ready(&self, path: &Path) -> MountHealthResult {
        let mut attempt = 0;
        loop {
            let result = self.check_mount_health(path).await;
            if result.status == MountHealthStatus::Healthy || attempt >= self.max_retries {
                return result;
            }
            let delay = self.retry_delay * 2u32.pow(attempt);
            tracing::warn!(
                "mount {} not ready ({:?}), retrying in {:?} (attempt {attempt}/{})",
                path.display(),
                result.status,
                delay,
                self.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// The blocking probe itself: `read_dir` plus OS-error classification.
/// Detects "stale file handle" / "resource temporarily unavailable" style
/// messages the way the Python original pattern-matches `OSError` text,
/// since Rust's `io::ErrorKind` doesn't expose `ESTALE` as its own variant.
fn probe_mount(path: &Path) -> MountHealthResult {
    if !path.exists() {
        return MountHealthResult {
            path: path.to_path_buf(),
            status: MountHealthStatus::NotFound,
            detail: Some("path does not exist".to_string()),
            entry_count: None,
        };
    }

    match std::fs::read_dir(path) {
        Ok(iter) => {
            let mut count = 0usize;
            for entry in iter {
                match entry {
                    Ok(_) => count += 1,
                    Err(e) => return classify_io_error(path, &e),
                }
            }
            MountHealthResult {
                path: path.to_path_buf(),
                status: MountHealthStatus::Healthy,
                detail: None,
                entry_count: Some(count),
            }
        }
        Err(e) => classify_io_error(path, &e),
    }
}

fn classify_io_error(path: &Path, e: &io::Error) -> MountHealthResult {
    let message = e.to_string().to_lowercase();
    let status = if e.kind() == io::ErrorKind::PermissionDenied {
        MountHealthStatus::PermissionDenied
    } else if e.kind() == io::ErrorKind::NotFound {
        MountHealthStatus::NotFound
    } else if message.contains("stale file handle") || message.contains("resource temporarily unavailable") {
        MountHealthStatus::Stale
    } else {
        MountHealthStatus::Inaccessible
    };

    MountHealthResult {
        path: path.to_path_buf(),
        status,
        detail: Some(e.to_string()),
        entry_count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthy_mount_reports_entry_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.vds"), b"x").unwrap();
        let checker = MountHealthChecker::new(Duration::from_secs(5), 3);
        let result = checker.check_mount_health(dir.path()).await;
        assert_eq!(result.status, MountHealthStatus::Healthy);
        assert_eq!(result.entry_count, Some(1));
    }

    #[tokio::test]
    async fn missing_mount_is_not_found() {
        let checker = MountHealthChecker::new(Duration::from_secs(5), 3);
        let result = checker
            .check_mount_health(Path::new("/does/not/exist/at/all"))
            .await;
        assert_eq!(result.status, MountHealthStatus::NotFound);
    }

    #[tokio::test]
    async fn check_multiple_mounts_runs_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let checker = MountHealthChecker::new(Duration::from_secs(5), 3);
        let results = checker
            .check_multiple_mounts(&[dir.path().to_path_buf(), PathBuf::from("/nope")])
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, MountHealthStatus::Healthy);
        assert_eq!(results[1].status, MountHealthStatus::NotFound);
    }

    #[tokio::test]
    async fn wait_for_mount_ready_returns_immediately_when_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let checker = MountHealthChecker::new(Duration::from_secs(5), 3);
        let result = checker.wait_for_mount_ready(dir.path()).await;
        assert_eq!(result.status, MountHealthStatus::Healthy);
    }

    #[test]
    fn remediation_advice_is_status_specific() {
        assert_ne!(
            MountHealthStatus::Stale.remediation_advice(),
            MountHealthStatus::NotFound.remediation_advice()
        );
    }
}
