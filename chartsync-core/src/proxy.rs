use reqwest::{ClientBuilder, Proxy};

pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:10808";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_URL)
    }
}

/// Without a proxy the client connects directly, ignoring `HTTP_PROXY` and
/// friends from the environment.
pub(crate) fn apply(
    builder: ClientBuilder,
    proxy: Option<&ProxyConfig>,
) -> Result<ClientBuilder, reqwest::Error> {
    match proxy {
        Some(proxy) => Ok(builder.proxy(Proxy::all(proxy.url.as_str())?)),
        None => Ok(builder.no_proxy()),
    }
}
