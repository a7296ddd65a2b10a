//! Gateway configuration.
//!
//! Resolved once at startup from CLI flags / environment, then threaded
//! into every component as a plain value — spec.md's "singletons → explicit
//! context" redesign note. Mirrors the teacher's `Cli` struct in `main.rs`
//! but expressed as a library-level type so both the MCP and (future) CLI
//! entry points build the same context.

use std::path::PathBuf;

/// Default raw-data return cap, in elements, per spec.md §6 "Environment".
pub const DEFAULT_MAX_ELEMENTS: usize = 100_000;

/// Resolved gateway configuration, threaded into [`crate::server::GatewayServer`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Host-side mount roots to scan for `.vds` files, colon-separated in
    /// `VDS_DATA_PATH`. Empty means "demo mode only".
    pub data_roots: Vec<PathBuf>,

    /// Prefix substituted for the index's container-side path before
    /// handing a path to Volume Access (spec.md §4.2 "Path translation").
    pub container_root: Option<PathBuf>,

    /// Remote metadata index endpoint, if configured. `None` means the
    /// index client runs only the local-scan / demo fallback tiers.
    pub index_url: Option<String>,
    pub index_timeout_secs: u64,

    /// Mount health checking.
    pub mount_health_enabled: bool,
    pub mount_timeout_secs: u64,
    pub mount_max_retries: u32,

    /// Raw-data return cap (elements), spec.md §6.
    pub max_elements: usize,

    /// Optional profiling log file (see [`crate::profiling`]).
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_roots: Vec::new(),
            container_root: None,
            index_url: None,
            index_timeout_secs: 10,
            mount_health_enabled: true,
            mount_timeout_secs: 10,
            mount_max_retries: 3,
            max_elements: DEFAULT_MAX_ELEMENTS,
            log_file: None,
        }
    }
}

impl Config {
    /// Parses `VDS_DATA_PATH`-style colon-separated mount roots, matching
    /// `original_source/src/vds_client.py`'s `_scan_for_surveys`.
    #[must_use]
    pub fn with_data_path_env(mut self, raw: &str) -> Self {
        self.data_roots = raw
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        self
    }

    /// Whether the gateway has any configured mount roots to scan, as
    /// opposed to running purely in demo mode.
    #[must_use]
    pub fn has_data_roots(&self) -> bool {
        !self.data_roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_demo_only() {
        let cfg = Config::default();
        assert!(!cfg.has_data_roots());
        assert_eq!(cfg.max_elements, DEFAULT_MAX_ELEMENTS);
    }

    #[test]
    fn data_path_env_splits_on_colon() {
        let cfg = Config::default().with_data_path_env("/mnt/a:/mnt/b:");
        assert_eq!(cfg.data_roots, vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]);
        assert!(cfg.has_data_roots());
    }
}
