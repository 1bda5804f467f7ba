//! Build downloads with streaming SHA256 verification.

use std::path::Path;

use async_trait::async_trait;
use bootkit_schema::BuildRecord;
use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::archive::extract_tar_gz;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

/// Places the contents of a package build into a directory.
#[async_trait]
pub trait BuildFetcher: Send + Sync {
    /// Download `build` and unpack its payload into `dest_dir`, which exists
    /// and is empty.
    async fn fetch(&self, build: &BuildRecord, dest_dir: &Path) -> Result<(), DownloadError>;
}

/// [`BuildFetcher`] downloading `.tar.gz` payloads over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Fetcher sharing `client`'s connection pool.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BuildFetcher for HttpFetcher {
    async fn fetch(&self, build: &BuildRecord, dest_dir: &Path) -> Result<(), DownloadError> {
        let scratch = tempfile::tempdir()?;
        let archive = scratch.path().join("build.tar.gz");

        download_and_verify(&self.client, &build.url, &archive, &build.sha256).await?;

        let dest = dest_dir.to_path_buf();
        tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &dest))
            .await
            .map_err(std::io::Error::other)??;
        Ok(())
    }
}

/// Stream `url` to `dest`, hashing as we go. The file is removed again if
/// the digest does not match `expected_hash`.
pub async fn download_and_verify(
    client: &Client,
    url: &str,
    dest: &Path,
    expected_hash: &str,
) -> Result<String, DownloadError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
    }

    file.flush().await?;
    let actual_hash = hex::encode(hasher.finalize());
    debug!(url, bytes = downloaded, "downloaded");

    if !actual_hash.eq_ignore_ascii_case(expected_hash) {
        tokio::fs::remove_file(dest).await.ok();
        return Err(DownloadError::HashMismatch {
            url: url.to_string(),
            expected: expected_hash.to_string(),
            actual: actual_hash,
        });
    }

    Ok(actual_hash)
}
