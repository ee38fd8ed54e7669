//! High-level VMR client
//!
//! Ties the catalog store, filters, and downloader together behind one
//! explicitly constructed client object. Each client owns its own cache
//! directory and configuration - there is no process-wide state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{
    self, CacheStatus, CatalogSnapshot, CatalogSource, CatalogStore, Model, ModelFilter,
    SimulationResult, Summary, DEFAULT_BASE_URL, DEFAULT_MAX_AGE,
};
use crate::download::{self, Downloader, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT};
use crate::error::{Result, VmrError};

/// Client construction settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Repository base URL
    pub base_url: String,

    /// Cache directory override; `None` uses the platform default
    pub cache_dir: Option<PathBuf>,

    /// Maximum snapshot age before it is flagged stale
    pub max_age: Duration,

    /// Attempts per download
    pub retries: usize,

    /// Base delay between download attempts
    pub retry_delay: Duration,

    /// HTTP timeout for catalog fetches and downloads
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: None,
            max_age: DEFAULT_MAX_AGE,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Options for model downloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Extract ZIP bundles after download
    pub extract: bool,

    /// Also download the model's simulation result bundles
    pub include_simulations: bool,

    /// Also download the model's PDF documentation
    pub include_pdf: bool,
}

/// Per-identifier outcome report for a batch download.
///
/// One item's failure never aborts the rest of the batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Identifiers downloaded successfully, with their on-disk paths
    pub succeeded: Vec<(String, PathBuf)>,

    /// Identifiers that failed, with the per-item error
    pub failed: Vec<(String, VmrError)>,
}

impl BatchReport {
    /// True when every attempted item failed.
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }

    /// Number of attempted items.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Client for the Vascular Model Repository.
///
/// ```no_run
/// # async fn example() -> vmr_core::Result<()> {
/// use vmr_core::catalog::ModelFilter;
/// use vmr_core::VmrClient;
///
/// let client = VmrClient::new()?;
/// let filter = ModelFilter {
///     anatomy: Some("Aorta".to_string()),
///     species: Some("Human".to_string()),
///     ..Default::default()
/// };
/// for model in client.search(&filter).await? {
///     println!("{}", model.display_label());
/// }
/// # Ok(())
/// # }
/// ```
pub struct VmrClient {
    store: CatalogStore,
    downloader: Downloader,
    base_url: String,
}

impl VmrClient {
    /// Create a client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client from explicit settings.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let cache_dir = match config.cache_dir {
            Some(dir) => dir,
            None => CatalogStore::default_cache_dir()?,
        };

        let store = CatalogStore::new(
            config.base_url.clone(),
            cache_dir,
            config.max_age,
            config.timeout,
        )?;
        let downloader = Downloader::new(config.retries, config.retry_delay, config.timeout)?;

        Ok(Self {
            store,
            downloader,
            base_url: config.base_url,
        })
    }

    /// Load the catalog snapshot, reporting where it came from.
    pub async fn load_catalog(
        &self,
        force_refresh: bool,
    ) -> Result<(CatalogSnapshot, CatalogSource)> {
        self.store.load(force_refresh).await
    }

    /// All models in the repository, in catalog order.
    pub async fn list_models(&self) -> Result<Vec<Model>> {
        let (snapshot, _) = self.store.load(false).await?;
        Ok(snapshot.models)
    }

    /// Models matching every supplied filter predicate, in catalog order.
    pub async fn search(&self, filter: &ModelFilter) -> Result<Vec<Model>> {
        let (snapshot, _) = self.store.load(false).await?;
        let hits = catalog::query(&snapshot, filter)?;
        Ok(hits.into_iter().cloned().collect())
    }

    /// Metadata for one model.
    pub async fn get_model(&self, name: &str) -> Result<Model> {
        let (snapshot, _) = self.store.load(false).await?;
        snapshot.get_model(name).cloned()
    }

    /// All simulation results in the repository.
    pub async fn list_simulations(&self) -> Result<Vec<SimulationResult>> {
        let (snapshot, _) = self.store.load(false).await?;
        Ok(snapshot.simulations)
    }

    /// Simulation results belonging to one model.
    pub async fn simulations_for(&self, model_name: &str) -> Result<Vec<SimulationResult>> {
        let (snapshot, _) = self.store.load(false).await?;
        Ok(snapshot
            .simulations_for(model_name)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Download a model's bundle into `output_dir`.
    ///
    /// Returns the bundle path, or the extracted directory when
    /// `opts.extract` is set.
    pub async fn download(
        &self,
        name: &str,
        output_dir: &Path,
        opts: DownloadOptions,
    ) -> Result<PathBuf> {
        let (snapshot, _) = self.store.load(false).await?;
        self.download_from(&snapshot, name, output_dir, opts).await
    }

    /// Download a single named simulation archive for a model.
    pub async fn download_simulation(
        &self,
        model_name: &str,
        filename: &str,
        output_dir: &Path,
        extract: bool,
    ) -> Result<PathBuf> {
        let (snapshot, _) = self.store.load(false).await?;
        let sim = snapshot.get_simulation(model_name, filename)?;
        self.fetch_simulation(sim, output_dir, extract).await
    }

    /// Download all simulation archives for a model.
    ///
    /// Archives are fetched independently; per-file failures are
    /// collected in the report rather than aborting the rest.
    pub async fn download_simulations(
        &self,
        model_name: &str,
        output_dir: &Path,
        extract: bool,
    ) -> Result<BatchReport> {
        let (snapshot, _) = self.store.load(false).await?;
        // Surface an unknown model as an error rather than an empty report
        snapshot.get_model(model_name)?;

        let mut report = BatchReport::default();
        for sim in snapshot.simulations_for(model_name) {
            match self.fetch_simulation(sim, output_dir, extract).await {
                Ok(path) => report.succeeded.push((sim.full_filename.clone(), path)),
                Err(e) => {
                    tracing::warn!("Failed to download {}: {e}", sim.full_filename);
                    report.failed.push((sim.full_filename.clone(), e));
                }
            }
        }
        Ok(report)
    }

    /// Download a model's PDF documentation.
    pub async fn download_pdf(&self, name: &str, output_dir: &Path) -> Result<PathBuf> {
        let (snapshot, _) = self.store.load(false).await?;
        let model = snapshot.get_model(name)?;

        let url = model.pdf_url(&self.base_url);
        let dest = output_dir.join(format!("{name}.pdf"));
        self.downloader
            .download(&url, &dest, None)
            .await
            .map_err(|e| wrap_download_err(name, e))
    }

    /// Download several models, isolating per-identifier failures.
    pub async fn download_batch(
        &self,
        names: &[String],
        output_dir: &Path,
        opts: DownloadOptions,
    ) -> Result<BatchReport> {
        let (snapshot, _) = self.store.load(false).await?;

        let mut report = BatchReport::default();
        for name in names {
            match self.download_from(&snapshot, name, output_dir, opts).await {
                Ok(path) => report.succeeded.push((name.clone(), path)),
                Err(e) => {
                    tracing::warn!("Failed to download {name}: {e}");
                    report.failed.push((name.clone(), e));
                }
            }
        }
        Ok(report)
    }

    /// Force a catalog refresh, replacing the cached snapshot.
    pub async fn refresh(&self) -> Result<CatalogSnapshot> {
        let (snapshot, _) = self.store.load(true).await?;
        Ok(snapshot)
    }

    /// Cache file location, age, and staleness.
    pub fn cache_info(&self) -> CacheStatus {
        self.store.cache_info()
    }

    /// Summary statistics over the whole catalog.
    pub async fn summary(&self) -> Result<Summary> {
        let (snapshot, _) = self.store.load(false).await?;
        Ok(catalog::summarize(&snapshot.models))
    }

    async fn download_from(
        &self,
        snapshot: &CatalogSnapshot,
        name: &str,
        output_dir: &Path,
        opts: DownloadOptions,
    ) -> Result<PathBuf> {
        let model = snapshot.get_model(name)?;

        let url = model.download_url(&self.base_url);
        let dest = output_dir.join(format!("{name}.zip"));
        tracing::info!(
            "Downloading {name}{}",
            model
                .file_size
                .map(|s| format!(" ({})", download::format_size(s)))
                .unwrap_or_default()
        );

        let archive = self
            .downloader
            .download(&url, &dest, model.file_size)
            .await
            .map_err(|e| wrap_download_err(name, e))?;

        let result = if opts.extract {
            download::extract_zip(&archive)?
        } else {
            archive
        };

        if opts.include_simulations && model.has_simulations {
            let sim_dir = output_dir.join(format!("{name}_simulations"));
            for sim in snapshot.simulations_for(name) {
                if let Err(e) = self.fetch_simulation(sim, &sim_dir, opts.extract).await {
                    tracing::warn!("Failed to download {}: {e}", sim.full_filename);
                }
            }
        }

        if opts.include_pdf {
            let url = model.pdf_url(&self.base_url);
            let dest = output_dir.join(format!("{name}.pdf"));
            if let Err(e) = self.downloader.download(&url, &dest, None).await {
                tracing::warn!("Failed to download PDF for {name}: {e}");
            }
        }

        Ok(result)
    }

    async fn fetch_simulation(
        &self,
        sim: &SimulationResult,
        output_dir: &Path,
        extract: bool,
    ) -> Result<PathBuf> {
        let url = sim.download_url(&self.base_url);
        let dest = output_dir.join(&sim.full_filename);
        let archive = self
            .downloader
            .download(&url, &dest, sim.file_size)
            .await
            .map_err(|e| wrap_download_err(&sim.full_filename, e))?;

        if extract && sim.full_filename.to_lowercase().ends_with(".zip") {
            return download::extract_zip(&archive);
        }
        Ok(archive)
    }
}

/// Attach the failing identifier to transport-level download errors.
fn wrap_download_err(name: &str, err: VmrError) -> VmrError {
    match err {
        e @ VmrError::DownloadFailed { .. } => e,
        other => VmrError::DownloadFailed {
            name: name.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod client_tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Unroutable base URL: cached catalogs must satisfy every read.
    const DEAD_URL: &str = "http://127.0.0.1:1";

    fn seeded_client(dir: &TempDir) -> VmrClient {
        let snapshot = CatalogSnapshot {
            fetched_at: 1_700_000_000,
            models: vec![
                Model {
                    name: "0001_H_AO_SVD".to_string(),
                    anatomy: "Aorta".to_string(),
                    species: "Human".to_string(),
                    disease: "Healthy".to_string(),
                    age: Some(45.0),
                    has_simulations: true,
                    ..Default::default()
                },
                Model {
                    name: "0002_H_AO_H".to_string(),
                    anatomy: "Aorta".to_string(),
                    species: "Human".to_string(),
                    disease: "Coarctation of Aorta".to_string(),
                    age: Some(10.0),
                    ..Default::default()
                },
            ],
            simulations: vec![SimulationResult {
                model_name: "0001_H_AO_SVD".to_string(),
                full_filename: "0001_pulsatile.zip".to_string(),
                method: "RIGID".to_string(),
                ..Default::default()
            }],
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        std::fs::write(dir.path().join("catalog.json"), json).unwrap();

        VmrClient::with_config(ClientConfig {
            base_url: DEAD_URL.to_string(),
            cache_dir: Some(dir.path().to_path_buf()),
            retry_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_age, DEFAULT_MAX_AGE);
        assert_eq!(config.retries, DEFAULT_RETRIES);
        assert!(config.cache_dir.is_none());
    }

    #[tokio::test]
    async fn test_list_and_get_from_cache() {
        let dir = TempDir::new().unwrap();
        let client = seeded_client(&dir);

        let models = client.list_models().await.unwrap();
        assert_eq!(models.len(), 2);

        let model = client.get_model("0002_H_AO_H").await.unwrap();
        assert_eq!(model.disease, "Coarctation of Aorta");

        let err = client.get_model("nonexistent").await.unwrap_err();
        assert!(matches!(err, VmrError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn test_search_from_cache() {
        let dir = TempDir::new().unwrap();
        let client = seeded_client(&dir);

        let filter = ModelFilter {
            anatomy: Some("Aorta".to_string()),
            age_max: Some(18.0),
            ..Default::default()
        };
        let hits = client.search(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "0002_H_AO_H");
    }

    #[tokio::test]
    async fn test_simulations_for() {
        let dir = TempDir::new().unwrap();
        let client = seeded_client(&dir);

        let sims = client.simulations_for("0001_H_AO_SVD").await.unwrap();
        assert_eq!(sims.len(), 1);
        assert_eq!(sims[0].method, "RIGID");

        assert!(client.simulations_for("0002_H_AO_H").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let client = seeded_client(&dir);

        // Unknown identifiers fail fast without touching the network, so
        // the batch report's bookkeeping can be checked in isolation.
        let names = vec!["missing_a".to_string(), "missing_b".to_string()];
        let report = client
            .download_batch(&names, out.path(), DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(report.total(), 2);
        assert!(report.all_failed());
        assert_eq!(report.failed[0].0, "missing_a");
        assert!(matches!(
            report.failed[0].1,
            VmrError::ModelNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_download_unknown_simulation() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let client = seeded_client(&dir);

        let err = client
            .download_simulation("0001_H_AO_SVD", "missing.zip", out.path(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, VmrError::SimulationNotFound { .. }));
    }

    #[tokio::test]
    async fn test_summary_from_cache() {
        let dir = TempDir::new().unwrap();
        let client = seeded_client(&dir);

        let summary = client.summary().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.with_simulations, 1);
    }

    #[test]
    fn test_cache_info_reports_seeded_cache() {
        let dir = TempDir::new().unwrap();
        let client = seeded_client(&dir);

        let status = client.cache_info();
        assert!(status.exists);
        assert_eq!(status.path, dir.path().join("catalog.json"));
    }
}
