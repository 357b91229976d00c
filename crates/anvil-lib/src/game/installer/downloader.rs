//! HTTP implementation of [`LibraryFetcher`].

use super::config::{DOWNLOAD_RETRIES, REQUEST_TIMEOUT_SECS, RETRY_DELAY_MS};
use super::traits::LibraryFetcher;
use crate::utils::hash::file_matches_sha1;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;

/// Fetches libraries over HTTP with retry and SHA-1 validation.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("anvil-lib/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl LibraryFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        sha1: Option<&'a str>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(download_to_path(&self.client, url, dest, sha1))
    }
}

/// Download a file to a path with SHA1 validation and retry logic
pub async fn download_to_path(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
) -> Result<()> {
    log::debug!("Downloading: {} -> {:?}", url, path);

    if path.exists() {
        match expected_sha1 {
            Some(expected) if file_matches_sha1(path, expected) => {
                log::debug!("File exists and hash matches, skipping: {:?}", path);
                return Ok(());
            }
            Some(_) => {
                log::info!("File exists but hash mismatches, re-downloading: {:?}", path);
            }
            None => {
                log::debug!("File exists and no hash provided, assuming valid and skipping: {:?}", path);
                return Ok(());
            }
        }
    }

    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }

    let mut retries = 0;
    loop {
        match download_with_validation(client, url, path, expected_sha1).await {
            Ok(()) => {
                log::debug!("Download complete: {:?}", path);
                return Ok(());
            }
            Err(e) => {
                retries += 1;
                if retries >= DOWNLOAD_RETRIES {
                    log::error!("Download failed after {} retries: {}", DOWNLOAD_RETRIES, e);
                    return Err(e).context(format!(
                        "Failed to download {} after {} retries",
                        url, DOWNLOAD_RETRIES
                    ));
                }
                log::warn!(
                    "Download failed (attempt {}/{}) : {}. Retrying...",
                    retries,
                    DOWNLOAD_RETRIES,
                    e
                );
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * retries as u64)).await;
            }
        }
    }
}

async fn download_with_validation(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
) -> Result<()> {
    let start = Instant::now();
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    // Stream into a sibling .part file and rename once complete
    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    let tmp_path = path.with_file_name(tmp_name);
    let mut file = File::create(&tmp_path).await?;
    let mut downloaded: u64 = 0;
    let mut hasher = Sha1::new();

    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e.into());
            }
        };
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(expected) = expected_sha1 {
        let computed = format!("{:x}", hasher.finalize());
        if !computed.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            anyhow::bail!(
                "SHA1 mismatch for {}: expected {}, got {}",
                url,
                expected,
                computed
            );
        }
        log::debug!("SHA1 validated: {}", computed);
    }

    tokio::fs::rename(&tmp_path, path).await?;

    let secs = start.elapsed().as_secs_f64();
    log::info!(
        "Download stats: url={}, size={} bytes, time={:.2}s, throughput={:.2} MB/s",
        url,
        downloaded,
        secs,
        (downloaded as f64 / 1024.0 / 1024.0) / secs.max(0.001)
    );

    Ok(())
}
