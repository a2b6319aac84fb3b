//! In-memory artifact fetcher (testing only)

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::NetbootError;
use crate::fetch::ArtifactFetcher;
use crate::Result;

/// Fetcher that writes fixed bytes instead of downloading and records each request.
#[derive(Debug)]
pub struct RecordingFetcher {
    payload: Vec<u8>,
    fail: bool,
    requests: Mutex<Vec<(String, PathBuf)>>,
}

impl Default for RecordingFetcher {
    fn default() -> Self {
        RecordingFetcher {
            payload: b"MZ".to_vec(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher whose every request fails
    pub fn failing() -> Self {
        RecordingFetcher {
            fail: true,
            ..Self::default()
        }
    }

    /// `(url, destination)` of every request so far
    pub fn requests(&self) -> Vec<(String, PathBuf)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), dest.to_path_buf()));
        if self.fail {
            return Err(NetbootError::DownloadFailed(format!("{url}: unreachable")));
        }
        tokio::fs::write(dest, &self.payload).await?;
        Ok(())
    }
}
