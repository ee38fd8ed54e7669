//! File downloads from the repository
//!
//! Streams each resource to a `.part` file and renames it into place on
//! completion, verifies byte counts against the catalog when the size is
//! published, and retries transient failures with a growing delay.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VmrError};

/// Default number of attempts per download
pub const DEFAULT_RETRIES: usize = 3;

/// Default base delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default HTTP timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads repository files to disk.
pub struct Downloader {
    client: reqwest::Client,
    retries: usize,
    retry_delay: Duration,
}

impl Downloader {
    pub fn new(retries: usize, retry_delay: Duration, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vmr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            retries: retries.max(1),
            retry_delay,
        })
    }

    /// Download `url` to `dest`, creating parent directories as needed.
    ///
    /// The expected size, when given, is checked against the bytes
    /// actually written; a mismatch fails the attempt.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
    ) -> Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut last_err = None;
        for attempt in 0..self.retries {
            match self.download_once(url, dest, expected_size).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    tracing::warn!(
                        "Download attempt {}/{} failed for {url}: {e}",
                        attempt + 1,
                        self.retries
                    );
                    last_err = Some(e);
                    if attempt + 1 < self.retries {
                        tokio::time::sleep(self.retry_delay * (attempt as u32 + 1)).await;
                    }
                }
            }
        }

        Err(last_err.expect("at least one download attempt"))
    }

    async fn download_once(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
    ) -> Result<PathBuf> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let part_path = part_path_for(dest);
        let mut file = std::fs::File::create(&part_path)?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        drop(file);

        if let Some(expected) = expected_size {
            if written != expected {
                let _ = std::fs::remove_file(&part_path);
                return Err(VmrError::DownloadFailed {
                    name: file_label(dest),
                    reason: format!("size mismatch: expected {expected} bytes, got {written}"),
                });
            }
        }

        std::fs::rename(&part_path, dest)?;
        tracing::debug!("Downloaded {url} to {}", dest.display());
        Ok(dest.to_path_buf())
    }
}

/// Extract a downloaded ZIP archive into a sibling directory named after
/// the archive's stem. Entries with unsafe paths are skipped.
pub fn extract_zip(archive_path: &Path) -> Result<PathBuf> {
    let dest = archive_path.with_extension("");

    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel_path) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(rel_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }

    tracing::debug!(
        "Extracted {} to {}",
        archive_path.display(),
        dest.display()
    );
    Ok(dest)
}

/// Format a byte count as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}

/// In-progress download path: `<dest>.part` alongside the destination.
fn part_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn file_label(dest: &Path) -> String {
    dest.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dest.display().to_string())
}

#[cfg(test)]
mod download_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Build a small ZIP archive on disk.
    fn create_test_zip(dir: &Path) -> PathBuf {
        use zip::write::SimpleFileOptions;

        let archive_path = dir.join("0001_H_AO_SVD.zip");
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        writer.add_directory("Meshes", options).unwrap();
        writer.start_file("README.txt", options).unwrap();
        writer.write_all(b"vascular model bundle").unwrap();
        writer.start_file("Meshes/model.vtu", options).unwrap();
        writer.write_all(b"mesh data").unwrap();
        writer.finish().unwrap();

        archive_path
    }

    #[test]
    fn test_extract_zip() {
        let dir = TempDir::new().unwrap();
        let archive_path = create_test_zip(dir.path());

        let extracted = extract_zip(&archive_path).unwrap();

        assert_eq!(extracted, dir.path().join("0001_H_AO_SVD"));
        assert_eq!(
            std::fs::read_to_string(extracted.join("README.txt")).unwrap(),
            "vascular model bundle"
        );
        assert_eq!(
            std::fs::read_to_string(extracted.join("Meshes/model.vtu")).unwrap(),
            "mesh data"
        );
    }

    #[test]
    fn test_part_path_naming() {
        let part = part_path_for(Path::new("/tmp/models/0001.zip"));
        assert_eq!(part, PathBuf::from("/tmp/models/0001.zip.part"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[tokio::test]
    async fn test_download_failure_surfaces_after_retries() {
        let dir = TempDir::new().unwrap();
        let downloader =
            Downloader::new(2, Duration::from_millis(10), Duration::from_secs(2)).unwrap();

        let err = downloader
            .download(
                "http://127.0.0.1:1/svprojects/0001.zip",
                &dir.path().join("0001.zip"),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, VmrError::Http(_)));
        // No partial file is left behind as the final artifact
        assert!(!dir.path().join("0001.zip").exists());
    }
}
