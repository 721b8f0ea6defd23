//! HTTP transport for the sync endpoint.

use async_trait::async_trait;
use smile_clinic_core::Snapshot;
use thiserror::Error;

use crate::config::SyncConfig;

/// Push and pull errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Malformed snapshot from server: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Moves whole snapshots to and from the remote copy.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Replace the remote copy with `snapshot`.
    async fn push(&self, snapshot: &Snapshot) -> SyncResult<()>;

    /// Fetch the remote copy.
    async fn pull(&self) -> SyncResult<Snapshot>;
}

/// `POST`/`GET <base_url>/sync` with JSON bodies.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.sync_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn push(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let response = self.client.post(&self.url).json(snapshot).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn pull(&self) -> SyncResult<Snapshot> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
