use std::collections::BTreeSet;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;

use chartsync_core::{CatalogClient, ClientError, UploadResponse};

use super::backoff::{RetryError, RetryPolicy, retry};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub detail: String,
}

impl UploadOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            detail: "ok".to_string(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

impl From<UploadResponse> for UploadOutcome {
    fn from(response: UploadResponse) -> Self {
        match response {
            UploadResponse::Success => Self::succeeded(),
            UploadResponse::BusinessFailure(message) => Self::failed(message),
            UploadResponse::MalformedResponse => Self::failed("invalid response"),
            UploadResponse::HttpError(status) => Self::failed(format!("HTTP {}", status.as_u16())),
        }
    }
}

pub trait RemoteCatalog: Send + Sync {
    /// Uploads one song. Never fails: every problem is folded into the outcome.
    fn upload<'a>(
        &'a self,
        category: &'a str,
        chart: &'a Path,
        audio: &'a Path,
    ) -> BoxFuture<'a, UploadOutcome>;

    fn fetch_keys(&self) -> BoxFuture<'_, Result<BTreeSet<String>, ClientError>>;
}

#[derive(Clone)]
pub struct CatalogUploader {
    client: CatalogClient,
    retry: RetryPolicy,
}

impl CatalogUploader {
    pub fn new(client: CatalogClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &CatalogClient {
        &self.client
    }

    pub async fn upload_song(&self, category: &str, chart: &Path, audio: &Path) -> UploadOutcome {
        let (chart_bytes, audio_bytes) = match read_assets(chart, audio).await {
            Ok(assets) => assets,
            Err(err) => return UploadOutcome::failed(format!("error: {err}")),
        };

        let client = &self.client;
        let result = retry(
            &self.retry,
            |attempt| {
                let chart = chart_bytes.clone();
                let audio = audio_bytes.clone();
                tracing::debug!(category, attempt, "posting upload");
                async move { client.upload_song(category, chart, audio).await }
            },
            ClientError::is_retryable,
        )
        .await;

        match result {
            Ok(response) => response.into(),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::debug!(attempts, "upload retries exhausted");
                UploadOutcome::failed(format!("network failure: {last}"))
            }
            Err(RetryError::Fatal(err)) => UploadOutcome::failed(format!("error: {err}")),
        }
    }
}

impl RemoteCatalog for CatalogUploader {
    fn upload<'a>(
        &'a self,
        category: &'a str,
        chart: &'a Path,
        audio: &'a Path,
    ) -> BoxFuture<'a, UploadOutcome> {
        Box::pin(self.upload_song(category, chart, audio))
    }

    fn fetch_keys(&self) -> BoxFuture<'_, Result<BTreeSet<String>, ClientError>> {
        Box::pin(self.client.fetch_song_keys())
    }
}

async fn read_assets(chart: &Path, audio: &Path) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let chart = tokio::fs::read(chart).await?;
    let audio = tokio::fs::read(audio).await?;
    Ok((chart, audio))
}
