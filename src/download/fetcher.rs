//! HTTP retrieval of tile archives.
//!
//! [`ArchiveFetcher`] is the seam between the orchestrator and the network. The
//! orchestrator only needs a status code and, for a 200, the body bytes; everything else
//! about the transport lives behind the trait.

use crate::download::error::DownloadError;
use crate::utils::redact_url;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

/// Status and payload of one archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArchive {
    pub status: u16,
    /// Empty unless `status` is 200.
    pub body: Vec<u8>,
}

impl FetchedArchive {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }
}

/// Performs a single GET for a constructed tile URL.
///
/// Non-200 responses are returned as values, not errors; only failures to obtain a
/// response at all (connection, timeout, interrupted body) are `Err`.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedArchive, DownloadError>;
}

/// [`ArchiveFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl HttpArchiveFetcher {
    pub fn new(user_agent: &str) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(DownloadError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedArchive, DownloadError> {
        let safe_url = redact_url(url).to_string();
        debug!("Requesting {}", safe_url);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DownloadError::Transport {
                url: safe_url.clone(),
                source: Box::new(e.without_url()),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok(FetchedArchive {
                status: status.as_u16(),
                body: Vec::new(),
            });
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.without_url()));
        let mut reader = StreamReader::new(stream);
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|e| DownloadError::Transport {
                url: safe_url.clone(),
                source: Box::new(e),
            })?;
        info!("Downloaded {} bytes from {}", body.len(), safe_url);

        Ok(FetchedArchive {
            status: status.as_u16(),
            body,
        })
    }
}
