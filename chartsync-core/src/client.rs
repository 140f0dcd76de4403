use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::proxy::{self, ProxyConfig};
use crate::songs::{ServerSong, server_key_set};

const LOCAL_HOST_URL: &str = "http://127.0.0.1";
const UPLOAD_PATH: &str = "api/upload";
const SONGS_PATH: &str = "api/songs";

pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const CHART_FIELD: &str = "file_tja";
pub const CHART_FILENAME: &str = "main.tja";
pub const AUDIO_FIELD: &str = "file_music";
pub const AUDIO_FILENAME: &str = "music.ogg";
pub const CATEGORY_FIELD: &str = "song_type";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}")]
    Api { status: StatusCode },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Proxy, connection and timeout failures, including a response body that
    /// stalls past the timeout. Complete responses, bodies cut off mid-stream
    /// and requests that failed to build are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Request(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResponse {
    Success,
    BusinessFailure(String),
    MalformedResponse,
    HttpError(StatusCode),
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResponse::Success)
    }
}

#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: Url,
    upload_timeout: Duration,
    fetch_timeout: Duration,
}

impl CatalogClient {
    pub fn new(base_url: &str, proxy: Option<&ProxyConfig>) -> Result<Self, ClientError> {
        Self::with_basedir(base_url, "/", proxy)
    }

    /// `basedir` is only used when `base_url` is blank, pointing the client at
    /// a service mounted under that path on the local host.
    pub fn with_basedir(
        base_url: &str,
        basedir: &str,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self, ClientError> {
        let http = proxy::apply(Client::builder(), proxy)?.build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url, basedir)?,
            upload_timeout: UPLOAD_TIMEOUT,
            fetch_timeout: FETCH_TIMEOUT,
        })
    }

    pub fn with_timeouts(mut self, upload: Duration, fetch: Duration) -> Self {
        self.upload_timeout = upload;
        self.fetch_timeout = fetch;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn upload_url(&self) -> Result<Url, ClientError> {
        Ok(self.base_url.join(UPLOAD_PATH)?)
    }

    pub fn songs_url(&self) -> Result<Url, ClientError> {
        Ok(self.base_url.join(SONGS_PATH)?)
    }

    /// Transport failures, including a body that stalls or breaks off after
    /// the headers arrived, come back as `Err`. Complete responses are
    /// classified.
    pub async fn upload_song(
        &self,
        category: &str,
        chart: Vec<u8>,
        audio: Vec<u8>,
    ) -> Result<UploadResponse, ClientError> {
        let form = Form::new()
            .part(
                CHART_FIELD,
                Part::bytes(chart)
                    .file_name(CHART_FILENAME)
                    .mime_str("text/plain")?,
            )
            .part(
                AUDIO_FIELD,
                Part::bytes(audio)
                    .file_name(AUDIO_FILENAME)
                    .mime_str("audio/ogg")?,
            )
            .text(CATEGORY_FIELD, category.to_string());

        let response = self
            .http
            .post(self.upload_url()?)
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Ok(UploadResponse::HttpError(status));
        }
        let body = response.text().await?;
        Ok(classify_upload_response(status, &body))
    }

    pub async fn fetch_song_keys(&self) -> Result<BTreeSet<String>, ClientError> {
        let response = self
            .http
            .get(self.songs_url()?)
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Api { status });
        }
        let payload: Value = response.json().await?;
        let Value::Array(entries) = payload else {
            return Err(ClientError::InvalidResponse(
                "song listing is not an array".to_string(),
            ));
        };
        let songs: Vec<ServerSong> = entries.iter().filter_map(ServerSong::from_value).collect();
        tracing::debug!(entries = songs.len(), "fetched server song listing");
        Ok(server_key_set(&songs))
    }
}

/// A blank input means the local host under `basedir`.
pub fn normalize_base_url(input: &str, basedir: &str) -> Result<Url, ClientError> {
    let trimmed = input.trim();
    let mut base = if trimmed.is_empty() {
        format!("{LOCAL_HOST_URL}{}", normalize_basedir(basedir))
    } else if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?)
}

pub fn classify_upload_response(status: StatusCode, body: &str) -> UploadResponse {
    if status != StatusCode::OK {
        return UploadResponse::HttpError(status);
    }
    let Ok(Value::Object(reply)) = serde_json::from_str::<Value>(body) else {
        return UploadResponse::MalformedResponse;
    };
    if reply.get("success") == Some(&Value::Bool(true)) {
        return UploadResponse::Success;
    }
    let message = reply
        .get("error")
        .and_then(Value::as_str)
        .filter(|msg| !msg.is_empty())
        .unwrap_or("unknown error");
    UploadResponse::BusinessFailure(message.to_string())
}

fn has_http_scheme(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn normalize_basedir(basedir: &str) -> String {
    let mut dir = basedir.trim().to_string();
    if !dir.starts_with('/') {
        dir.insert(0, '/');
    }
    if !dir.ends_with('/') {
        dir.push('/');
    }
    dir
}
