mod client;
mod proxy;
mod songs;

pub use client::{
    AUDIO_FIELD, AUDIO_FILENAME, CATEGORY_FIELD, CHART_FIELD, CHART_FILENAME, CatalogClient,
    ClientError, FETCH_TIMEOUT, UPLOAD_TIMEOUT, UploadResponse, classify_upload_response,
    normalize_base_url,
};
pub use proxy::{DEFAULT_PROXY_URL, ProxyConfig};
pub use songs::{ServerSong, server_key_set};

pub use reqwest::StatusCode;
