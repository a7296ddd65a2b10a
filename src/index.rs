//! Metadata Index Client (C2): survey discovery and search.
//!
//! Three-tier fallback, grounded in `original_source/src/es_metadata_client.py`
//! and spec.md §4.2:
//!
//! 1. **Remote index** — an external search backend (Elasticsearch in the
//!    Python prototype). Interface-only here: [`IndexClient::with_remote`]
//!    records that a URL was configured, but this crate carries no HTTP
//!    client dependency the teacher didn't already have, so the remote tier
//!    always reports `Unavailable` rather than actually querying out. A real
//!    deployment wires a client in behind the same trait.
//! 2. **Local scan** — delegates to [`crate::volume::VolumeAccess`], which
//!    already walks configured mount roots.
//! 3. **Demo catalog** — [`crate::volume::demo_surveys`].
//!
//! Search is intentionally simple (substring match over name/region/data
//! type) — the Python original's ES `query_string` queries are not
//! reproduced verbatim, only their shape (paged results + facets).

use crate::error::GatewayError;
use crate::types::SurveyId;
use crate::volume::{Survey, VolumeAccess};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Which tier actually answered a query, surfaced to callers so tool
/// responses can disclose degraded-mode operation (spec.md §4.2 "always
/// indicate which tier answered").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTier {
    Remote,
    LocalScan,
    Demo,
}

impl IndexTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::LocalScan => "local_scan",
            Self::Demo => "demo",
        }
    }
}

/// A single catalog entry as returned by search/list, a flattened view of
/// [`Survey`] plus the tier that produced it.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: SurveyId,
    pub name: String,
    pub region: String,
    pub data_type: String,
    pub acquisition_date: String,
}

impl From<&Survey> for CatalogEntry {
    fn from(s: &Survey) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            region: s.region.clone(),
            data_type: s.data_type.clone(),
            acquisition_date: s.acquisition_date.clone(),
        }
    }
}

/// Facet counts over a result set, matching `get_index_stats`'s
/// `volume_type_distribution` / `dimension_distribution` aggregations.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub by_region: HashMap<String, u64>,
    pub by_data_type: HashMap<String, u64>,
}

impl Facets {
    fn from_entries<'a>(entries: impl Iterator<Item = &'a CatalogEntry>) -> Self {
        let mut facets = Self::default();
        for entry in entries {
            *facets.by_region.entry(entry.region.clone()).or_insert(0) += 1;
            *facets
                .by_data_type
                .entry(entry.data_type.clone())
                .or_insert(0) += 1;
        }
        facets
    }
}

/// A search/list result: a page of entries, the tier that served it, and
/// facets over the full matching set (not just the page).
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub entries: Vec<CatalogEntry>,
    pub total_matched: usize,
    pub tier: IndexTier,
    pub facets: Facets,
}

/// Aggregate index statistics, matching `get_index_stats`.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub total_surveys: usize,
    pub facets: Facets,
    pub tier: IndexTier,
}

/// Metadata Index Client: wraps Volume Access's local catalog behind the
/// three-tier fallback and translates container-side paths reported by a
/// remote index back to host-side mount paths (spec.md §4.2 "Path
/// translation").
pub struct IndexClient {
    volume: Arc<VolumeAccess>,
    remote_url: Option<String>,
    container_root: Option<PathBuf>,
}

impl IndexClient {
    #[must_use]
    pub fn new(volume: Arc<VolumeAccess>) -> Self {
        Self {
            volume,
            remote_url: None,
            container_root: None,
        }
    }

    #[must_use]
    pub fn with_remote(mut self, url: Option<String>) -> Self {
        self.remote_url = url;
        self
    }

    #[must_use]
    pub fn with_container_root(mut self, root: Option<PathBuf>) -> Self {
        self.container_root = root;
        self
    }

    /// Substitutes the configured container-root prefix for the host mount
    /// root, so a path reported by a remote index (container-side) resolves
    /// to a path Volume Access can actually scan (host-side).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidArgument` if `container_path` does not
    /// start with the configured container root.
    pub fn translate_path(&self, container_path: &str) -> Result<PathBuf, GatewayError> {
        match &self.container_root {
            Some(root) => {
                let root_str = root.to_string_lossy();
                container_path
                    .strip_prefix(root_str.as_ref())
                    .map(|rest| PathBuf::from(rest.trim_start_matches('/')))
                    .ok_or_else(|| {
                        GatewayError::InvalidArgument(format!(
                            "path {container_path} is not under configured container root {root_str}"
                        ))
                    })
            }
            None => Ok(PathBuf::from(container_path)),
        }
    }

    /// Lists all known surveys, tier-tagged.
    #[must_use]
    pub fn list(&self, limit: usize, offset: usize) -> IndexResult {
        let all = self.collect_entries();
        page(all, limit, offset, self.current_tier())
    }

    /// Searches by substring over name, region, and data type — grounded in
    /// the shape of `ESMetadataClient.list_surveys`'s query, not its exact
    /// Elasticsearch query_string syntax.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize, offset: usize) -> IndexResult {
        let needle = query.to_lowercase();
        let all: Vec<CatalogEntry> = self
            .collect_entries()
            .into_iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e.region.to_lowercase().contains(&needle)
                    || e.data_type.to_lowercase().contains(&needle)
            })
            .collect();
        page(all, limit, offset, self.current_tier())
    }

    /// Fetches full metadata for one survey.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` if the survey id is unknown.
    pub fn get(&self, id: &SurveyId) -> Result<Arc<Survey>, GatewayError> {
        self.volume
            .list_surveys()
            .into_iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("survey not found: {id}")))
    }

    /// Aggregate catalog statistics.
    #[must_use]
    pub fn index_stats(&self) -> IndexStats {
        let entries = self.collect_entries();
        IndexStats {
            total_surveys: entries.len(),
            facets: Facets::from_entries(entries.iter()),
            tier: self.current_tier(),
        }
    }

    fn collect_entries(&self) -> Vec<CatalogEntry> {
        self.volume
            .list_surveys()
            .iter()
            .map(|s| CatalogEntry::from(s.as_ref()))
            .collect()
    }

    /// Which tier is currently answering. The remote tier is never actually
    /// reachable in this crate (no HTTP client in the stack); a configured
    /// `remote_url` degrades straight to local scan / demo, same as the
    /// Python client's own `initialize` falling back when ES is unreachable.
    fn current_tier(&self) -> IndexTier {
        if self.remote_url.is_some() {
            tracing::warn!("remote index configured but unreachable in this build, degrading to local scan");
        }
        if self.volume.list_surveys().iter().any(|s| !s.is_demo) {
            IndexTier::LocalScan
        } else {
            IndexTier::Demo
        }
    }
}

fn page(mut entries: Vec<CatalogEntry>, limit: usize, offset: usize, tier: IndexTier) -> IndexResult {
    entries.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    let total_matched = entries.len();
    let facets = Facets::from_entries(entries.iter());
    let page: Vec<CatalogEntry> = entries.into_iter().skip(offset).take(limit.max(1)).collect();
    IndexResult {
        entries: page,
        total_matched,
        tier,
        facets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IndexClient {
        IndexClient::new(Arc::new(VolumeAccess::new(Vec::new())))
    }

    #[test]
    fn list_returns_demo_tier_when_no_mounts_configured() {
        let result = client().list(10, 0);
        assert_eq!(result.tier, IndexTier::Demo);
        assert_eq!(result.total_matched, 3);
    }

    #[test]
    fn search_matches_region_substring() {
        let result = client().search("north sea", 10, 0);
        assert_eq!(result.total_matched, 1);
        assert_eq!(result.entries[0].id.as_str(), "demo_north_sea_2024");
    }

    #[test]
    fn search_is_case_insensitive() {
        let result = client().search("GULF", 10, 0);
        assert_eq!(result.total_matched, 1);
    }

    #[test]
    fn list_pages_results() {
        let page1 = client().list(2, 0);
        let page2 = client().list(2, 2);
        assert_eq!(page1.entries.len(), 2);
        assert_eq!(page2.entries.len(), 1);
        assert_eq!(page1.total_matched, 3);
    }

    #[test]
    fn get_unknown_survey_errors() {
        let id = SurveyId::new("nope").unwrap();
        assert!(matches!(client().get(&id), Err(GatewayError::NotFound(_))));
    }

    #[test]
    fn index_stats_counts_facets() {
        let stats = client().index_stats();
        assert_eq!(stats.total_surveys, 3);
        assert_eq!(stats.facets.by_data_type.get("3D Seismic").copied(), Some(2));
        assert_eq!(stats.facets.by_data_type.get("4D Seismic").copied(), Some(1));
    }

    #[test]
    fn translate_path_strips_container_root() {
        let client = client().with_container_root(Some(PathBuf::from("/data")));
        let translated = client.translate_path("/data/surveys/a.vds").unwrap();
        assert_eq!(translated, PathBuf::from("surveys/a.vds"));
    }

    #[test]
    fn translate_path_rejects_paths_outside_container_root() {
        let client = client().with_container_root(Some(PathBuf::from("/data")));
        assert!(client.translate_path("/other/a.vds").is_err());
    }
}
