//! Prebuilt artifact download
//!
//! The iPXE EFI binary is not built from source; it is fetched once and
//! dropped into the patched NetBoot package.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::NetbootError;
use crate::Result;

/// Downloads a URL to a local file
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch `url` into `dest`. `dest` only appears once the body is complete.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Plain HTTPS fetcher backed by `reqwest`
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("netboot-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { client })
    }

    /// Use a preconfigured client (proxy, timeouts, ...)
    pub fn with_client(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Downloading {} ...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| NetbootError::DownloadFailed(format!("{url}: {e}")))?;
        let body = response.bytes().await?;
        debug!("Received {} bytes from {}", body.len(), url);

        let partial = partial_path(dest);
        tokio::fs::write(&partial, &body).await?;
        tokio::fs::rename(&partial, dest).await?;
        Ok(())
    }
}
