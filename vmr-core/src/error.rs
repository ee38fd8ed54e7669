//! Client error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by VMR client operations.
#[derive(Debug, Error)]
pub enum VmrError {
    /// The remote repository could not be reached and no usable cached
    /// catalog exists.
    #[error("Catalog unavailable: {reason}\n\nThe repository could not be reached and no cached catalog exists.\nCheck your network connection and retry.")]
    CatalogUnavailable { reason: String },

    /// No model with the given name exists in the catalog.
    #[error("Model not found: {name}")]
    ModelNotFound { name: String },

    /// No simulation with the given filename exists for the model.
    #[error("Simulation '{filename}' not found for model '{model}'")]
    SimulationNotFound { model: String, filename: String },

    /// A filter combination is semantically malformed.
    #[error("Invalid filter: {reason}")]
    InvalidFilter { reason: String },

    /// A single download failed. Carries the identifier so batch reports
    /// stay actionable.
    #[error("Download failed for {name}: {reason}")]
    DownloadFailed { name: String, reason: String },

    /// The catalog cache could not be written. Non-fatal for reads, fatal
    /// for an explicit refresh.
    #[error("Failed to write catalog cache to {path}")]
    CacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An HTTP request failed (network error, non-2xx status, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a catalog CSV resource.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to serialize or deserialize the cached snapshot.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to extract a ZIP bundle.
    #[error("ZIP extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, VmrError>;
