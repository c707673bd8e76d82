// src/repository/mod.rs

//! Repository metadata and package downloading
//!
//! This module provides functionality for:
//! - Fetching repository metadata indexes over HTTP
//! - Synchronizing the available-package index in the state database
//! - Downloading package artifacts with retry and checksum verification

use crate::config::EngineConfig;
use crate::db::models::{AvailablePackage, Repository};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Repository metadata format (simple JSON index)
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub repo_id: String,
    pub packages: Vec<PackageMetadata>,
}

/// Package metadata in a repository index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default)]
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub checksum: String,
    pub size: i64,
    pub download_url: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    ///
    /// `sslverify = false` disables TLS certificate validation, mirroring
    /// the engine's sslverify option.
    pub fn new(sslverify: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .danger_accept_invalid_certs(!sslverify)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Fetch repository metadata from URL with retry support
    pub fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata> {
        let metadata_url = if url.ends_with('/') {
            format!("{}metadata.json", url)
        } else {
            format!("{}/metadata.json", url)
        };

        info!("Fetching repository metadata from {}", metadata_url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(&metadata_url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            metadata_url
                        )));
                    }

                    let metadata: RepositoryMetadata = response.json().map_err(|e| {
                        Error::DownloadError(format!("Failed to parse metadata JSON: {}", e))
                    })?;

                    info!(
                        "Successfully fetched metadata for {} packages",
                        metadata.packages.len()
                    );
                    return Ok(metadata);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch metadata after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Metadata fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Download a file to the specified path with retry support
    pub fn download_file(&self, url: &str, dest_path: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest_path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::DownloadError(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(mut response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    // Write to temporary file first
                    let temp_path = dest_path.with_extension("tmp");
                    let mut file = File::create(&temp_path)?;

                    // Copy response body to file
                    io::copy(&mut response, &mut file)?;

                    // Atomic rename from temp to final destination
                    fs::rename(&temp_path, dest_path)?;

                    info!("Successfully downloaded to {}", dest_path.display());
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

/// Synchronize one repository's metadata into the available-package index
///
/// Replaces every row previously synced for this repository and stamps the
/// sync time. The repository URL has configuration vars expanded first.
pub fn sync_repository(
    conn: &Connection,
    client: &RepositoryClient,
    config: &EngineConfig,
    repo: &mut Repository,
) -> Result<usize> {
    info!("Synchronizing repository: {}", repo.repo_id);

    let url = config.expand_vars(&repo.url);
    let metadata = client.fetch_metadata(&url)?;

    let repo_pk = repo.id.ok_or_else(|| {
        Error::InitError(format!("Repository {} has no database ID", repo.repo_id))
    })?;

    // Delete old package entries for this repository
    AvailablePackage::delete_by_repository(conn, repo_pk)?;

    // Insert new package metadata
    let mut count = 0;
    for pkg_meta in metadata.packages {
        let requires_json = if pkg_meta.requires.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&pkg_meta.requires).unwrap_or_default())
        };

        let mut available = AvailablePackage::new(
            repo_pk,
            repo.repo_id.clone(),
            pkg_meta.name,
            pkg_meta.epoch,
            pkg_meta.version,
            pkg_meta.release,
            pkg_meta.arch,
            pkg_meta.checksum,
            pkg_meta.size,
            pkg_meta.download_url,
        );
        available.requires = requires_json;

        available.insert(conn)?;
        count += 1;
    }

    // Update last_sync timestamp
    repo.last_sync = Some(current_timestamp());
    repo.update(conn)?;

    info!(
        "Synchronized {} packages from repository {}",
        count, repo.repo_id
    );
    Ok(count)
}

/// Check if repository metadata needs refresh
pub fn needs_sync(repo: &Repository) -> bool {
    match &repo.last_sync {
        None => true, // Never synced
        Some(last_sync) => {
            // Parse timestamp and check if expired
            match parse_timestamp(last_sync) {
                Ok(last_sync_time) => {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs();

                    let age_seconds = now.saturating_sub(last_sync_time);
                    age_seconds > repo.metadata_expire as u64
                }
                Err(_) => true, // If we can't parse timestamp, force sync
            }
        }
    }
}

/// Path where a package's artifact lives in the cache directory
pub fn artifact_path(pkg: &AvailablePackage, cache_dir: &Path) -> PathBuf {
    let default_filename = format!(
        "{}-{}-{}.{}.rpm",
        pkg.name, pkg.version, pkg.release, pkg.arch
    );
    let filename = pkg
        .download_url
        .split('/')
        .next_back()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or(default_filename);

    cache_dir.join(filename)
}

/// Download a package artifact into the cache directory
///
/// Skips the network entirely when a cached artifact with a matching
/// checksum already exists. Returns the cached path.
pub fn download_package(
    client: &RepositoryClient,
    pkg: &AvailablePackage,
    cache_dir: &Path,
) -> Result<PathBuf> {
    let dest_path = artifact_path(pkg, cache_dir);

    if dest_path.exists() && verify_checksum(&dest_path, &pkg.checksum).is_ok() {
        debug!("Using cached artifact {}", dest_path.display());
        return Ok(dest_path);
    }

    client.download_file(&pkg.download_url, &dest_path)?;

    // Verify checksum
    verify_checksum(&dest_path, &pkg.checksum)?;

    Ok(dest_path)
}

/// Verify file checksum matches expected value
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    use sha2::{Digest, Sha256};

    debug!("Verifying checksum for {}", path.display());

    let mut file = File::open(path)?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;

    let actual = format!("{:x}", hasher.finalize());

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    debug!("Checksum verified: {}", expected);
    Ok(())
}

/// Get current timestamp as ISO 8601 string
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Parse ISO 8601 timestamp to Unix seconds
fn parse_timestamp(timestamp: &str) -> Result<u64> {
    use chrono::DateTime;

    let dt = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| Error::ParseError(format!("Invalid timestamp: {}", e)))?;

    Ok(dt.timestamp() as u64)
}
