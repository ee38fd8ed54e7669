//! Catalog cache and refresh
//!
//! Owns the locally persisted catalog snapshot and decides when to talk
//! to the repository. A cached snapshot is always served when present and
//! not explicitly bypassed; staleness is flagged to the caller, never
//! auto-refreshed, so network calls stay fully under caller control.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::snapshot::CatalogSnapshot;
use crate::error::{Result, VmrError};

/// Default maximum snapshot age before it is flagged stale (24 hours)
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Base URL of the repository
pub const DEFAULT_BASE_URL: &str = "https://www.vascularmodel.com";

/// Cache file name inside the cache directory
const CACHE_FILE: &str = "catalog.json";

const PROJECTS_CSV_PATH: &str = "dataset/dataset-svprojects.csv";
const RESULTS_CSV_PATH: &str = "dataset/dataset-svresults.csv";
const FILE_SIZES_CSV_PATH: &str = "dataset/file_sizes.csv";

/// Where a loaded snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// Served from the local cache without a network call
    Cache { stale: bool },
    /// Fetched fresh from the repository and persisted
    Remote,
    /// The fetch failed; the cached snapshot was served instead
    StaleFallback,
}

/// Cache state report.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Location of the cache file
    pub path: PathBuf,

    /// Whether a cached snapshot currently exists
    pub exists: bool,

    /// When the cached snapshot was fetched
    pub fetched_at: Option<DateTime<Utc>>,

    /// Age of the cached snapshot in seconds
    pub age_secs: Option<u64>,

    /// Whether the cached snapshot exceeds the maximum age
    pub stale: bool,

    /// Configured maximum age in seconds
    pub max_age_secs: u64,

    /// Size of the cache file in bytes
    pub size_bytes: Option<u64>,
}

/// Maintains the locally durable catalog copy and answers load requests
/// against it.
pub struct CatalogStore {
    base_url: String,
    cache_dir: PathBuf,
    max_age: Duration,
    client: reqwest::Client,
}

impl CatalogStore {
    /// Create a store rooted at `cache_dir`, creating the directory if
    /// needed.
    pub fn new(
        base_url: impl Into<String>,
        cache_dir: PathBuf,
        max_age: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("vmr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            cache_dir,
            max_age,
            client,
        })
    }

    /// Default cache directory (platform cache dir, `vmr` subdirectory).
    pub fn default_cache_dir() -> Result<PathBuf> {
        let dir = directories::ProjectDirs::from("com", "vascularmodel", "vmr")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .or_else(|| dirs::cache_dir().map(|d| d.join("vmr")))
            .ok_or_else(|| {
                VmrError::Io(std::io::Error::other(
                    "could not determine a cache directory",
                ))
            })?;
        Ok(dir)
    }

    /// Path of the cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE)
    }

    /// Load the catalog, serving the cached snapshot when possible.
    ///
    /// With `force_refresh` false, an existing cached snapshot is
    /// returned without any network call, even when stale - the source
    /// carries the staleness flag. Otherwise the catalog is fetched,
    /// persisted atomically, and returned. A failed fetch falls back to
    /// the cached snapshot when one exists; `CatalogUnavailable` is
    /// returned only when both fetch and cache are unusable.
    pub async fn load(&self, force_refresh: bool) -> Result<(CatalogSnapshot, CatalogSource)> {
        if !force_refresh {
            match self.load_cached() {
                Ok(Some(snapshot)) => {
                    let stale = self.is_stale(snapshot.fetched_at);
                    tracing::debug!(
                        "Using cached catalog from {} ({} models{})",
                        self.cache_path().display(),
                        snapshot.model_count(),
                        if stale { ", stale" } else { "" }
                    );
                    return Ok((snapshot, CatalogSource::Cache { stale }));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Ignoring unreadable catalog cache: {e}");
                }
            }
        }

        match self.fetch_remote().await {
            Ok(snapshot) => {
                // Cache write failures are fatal only for an explicit refresh
                match self.persist(&snapshot) {
                    Ok(()) => {}
                    Err(e) if force_refresh => return Err(e),
                    Err(e) => tracing::warn!("Failed to persist catalog cache: {e}"),
                }
                Ok((snapshot, CatalogSource::Remote))
            }
            Err(fetch_err) => {
                if let Ok(Some(snapshot)) = self.load_cached() {
                    tracing::warn!(
                        "Catalog fetch failed ({fetch_err}); serving cached snapshot"
                    );
                    return Ok((snapshot, CatalogSource::StaleFallback));
                }
                Err(VmrError::CatalogUnavailable {
                    reason: fetch_err.to_string(),
                })
            }
        }
    }

    /// Report the cache file location, age, and staleness.
    pub fn cache_info(&self) -> CacheStatus {
        let path = self.cache_path();
        let size_bytes = std::fs::metadata(&path).ok().map(|m| m.len());
        let fetched_at_secs = self
            .load_cached()
            .ok()
            .flatten()
            .map(|snapshot| snapshot.fetched_at);

        let age_secs = fetched_at_secs.map(|t| unix_now().saturating_sub(t));
        let stale = fetched_at_secs.map(|t| self.is_stale(t)).unwrap_or(false);

        CacheStatus {
            exists: path.exists(),
            fetched_at: fetched_at_secs
                .and_then(|t| DateTime::<Utc>::from_timestamp(t as i64, 0)),
            age_secs,
            stale,
            max_age_secs: self.max_age.as_secs(),
            size_bytes,
            path,
        }
    }

    /// Remove the cached snapshot, if any.
    pub fn clear(&self) -> Result<()> {
        let path = self.cache_path();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Deserialize the cached snapshot, or `None` when no cache exists.
    fn load_cached(&self) -> Result<Option<CatalogSnapshot>> {
        let path = self.cache_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    /// Persist a snapshot with a write-temp-then-rename so a crash
    /// mid-write cannot corrupt an existing cache file.
    fn persist(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        let path = self.cache_path();
        let json = serde_json::to_vec_pretty(snapshot)?;

        let write = |path: &Path| -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
            tmp.write_all(&json)?;
            tmp.persist(path).map_err(|e| e.error)?;
            Ok(())
        };

        write(&path).map_err(|source| VmrError::CacheWriteFailed {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Saved catalog snapshot to {}", path.display());
        Ok(())
    }

    /// Fetch the three catalog resources and parse a fresh snapshot.
    async fn fetch_remote(&self) -> Result<CatalogSnapshot> {
        tracing::info!("Fetching catalog from {}", self.base_url);

        let projects = self.fetch_text(PROJECTS_CSV_PATH).await?;
        let results = self.fetch_text(RESULTS_CSV_PATH).await?;
        let sizes = self.fetch_text(FILE_SIZES_CSV_PATH).await?;

        let snapshot = CatalogSnapshot::parse(&projects, &results, &sizes, unix_now())?;
        tracing::info!(
            "Fetched catalog: {} models, {} simulations",
            snapshot.model_count(),
            snapshot.simulation_count()
        );
        Ok(snapshot)
    }

    async fn fetch_text(&self, resource: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, resource);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    fn is_stale(&self, fetched_at: u64) -> bool {
        Duration::from_secs(unix_now().saturating_sub(fetched_at)) > self.max_age
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::catalog::Model;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Unroutable base URL: cache behavior must never touch the network.
    const DEAD_URL: &str = "http://127.0.0.1:1";

    fn test_store(dir: &TempDir) -> CatalogStore {
        CatalogStore::new(
            DEAD_URL,
            dir.path().to_path_buf(),
            DEFAULT_MAX_AGE,
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn sample_snapshot(fetched_at: u64) -> CatalogSnapshot {
        CatalogSnapshot {
            fetched_at,
            models: vec![
                Model {
                    name: "0001_H_AO_SVD".to_string(),
                    anatomy: "Aorta".to_string(),
                    species: "Human".to_string(),
                    age: Some(45.0),
                    ..Default::default()
                },
                Model {
                    name: "0002_H_AO_H".to_string(),
                    anatomy: "Aorta".to_string(),
                    species: "Human".to_string(),
                    age: Some(10.0),
                    ..Default::default()
                },
            ],
            simulations: Vec::new(),
        }
    }

    #[test]
    fn test_persist_and_load_cached() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let snapshot = sample_snapshot(unix_now());

        store.persist(&snapshot).unwrap();

        let loaded = store.load_cached().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_load_cached_missing() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        assert!(store.load_cached().unwrap().is_none());
    }

    #[test]
    fn test_interrupted_write_leaves_prior_cache_loadable() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let snapshot = sample_snapshot(unix_now());

        store.persist(&snapshot).unwrap();

        // A crash between temp write and rename leaves a stray temp file,
        // never a half-written cache file.
        let mut stray = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        stray.write_all(b"{ truncated garbage").unwrap();
        let (_, stray_path) = stray.keep().unwrap();
        assert!(stray_path.exists());

        let loaded = store.load_cached().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_load_serves_cache_without_network() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let snapshot = sample_snapshot(unix_now());
        store.persist(&snapshot).unwrap();

        // Base URL is unroutable, so success proves no fetch happened.
        let (loaded, source) = store.load(false).await.unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(source, CatalogSource::Cache { stale: false });
    }

    #[tokio::test]
    async fn test_repeated_loads_are_identical() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.persist(&sample_snapshot(unix_now())).unwrap();

        let (first, _) = store.load(false).await.unwrap();
        let (second, _) = store.load(false).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_cache_is_flagged_not_refreshed() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        // Two days old with a 24h max age
        let old = unix_now() - 2 * 24 * 60 * 60;
        store.persist(&sample_snapshot(old)).unwrap();

        let (_, source) = store.load(false).await.unwrap();
        assert_eq!(source, CatalogSource::Cache { stale: true });
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let snapshot = sample_snapshot(unix_now());
        store.persist(&snapshot).unwrap();

        let (loaded, source) = store.load(true).await.unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(source, CatalogSource::StaleFallback);
    }

    #[tokio::test]
    async fn test_unavailable_without_cache() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let err = store.load(false).await.unwrap_err();
        assert!(matches!(err, VmrError::CatalogUnavailable { .. }));
    }

    #[test]
    fn test_cache_info() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let status = store.cache_info();
        assert!(!status.exists);
        assert!(status.fetched_at.is_none());
        assert!(!status.stale);

        store.persist(&sample_snapshot(unix_now())).unwrap();

        let status = store.cache_info();
        assert!(status.exists);
        assert!(status.fetched_at.is_some());
        assert!(!status.stale);
        assert_eq!(status.max_age_secs, DEFAULT_MAX_AGE.as_secs());
        assert!(status.size_bytes.unwrap() > 0);
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.persist(&sample_snapshot(unix_now())).unwrap();
        assert!(store.cache_path().exists());

        store.clear().unwrap();
        assert!(!store.cache_path().exists());

        // Clearing an empty cache is fine
        store.clear().unwrap();
    }
}
