use std::path::{Path, PathBuf};
use std::time::Duration;

use chartsync_core::{DEFAULT_PROXY_URL, ProxyConfig};

use crate::sync::backoff::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL, RetryPolicy};
use crate::sync::engine::RunMode;

const DEFAULT_ROOT_DIR: &str = "ESE";
const DEFAULT_BASEDIR: &str = "/";
const STATE_DIR_NAME: &str = "chartsync";
const STATE_FILE_NAME: &str = "uploaded.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub root: String,
    pub site_url: String,
    pub use_proxy: bool,
    pub mode: RunMode,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub root: PathBuf,
    pub site_url: String,
    pub basedir: String,
    pub proxy: Option<ProxyConfig>,
    pub mode: RunMode,
    pub state_file: PathBuf,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    pub fn from_env(inputs: RunInputs, state_file: Option<PathBuf>) -> Self {
        Self::from_lookup(inputs, state_file, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        inputs: RunInputs,
        state_file: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let home = dirs::home_dir();
        let expand = |value: &str| match &home {
            Some(home) => expand_with_home(value, home),
            None => PathBuf::from(value),
        };

        let root = match inputs.root.trim() {
            "" => PathBuf::from(DEFAULT_ROOT_DIR),
            value => expand(value),
        };
        let state_file = state_file
            .map(|path| expand(&path.to_string_lossy()))
            .unwrap_or_else(default_state_file);
        let proxy = inputs.use_proxy.then(|| {
            ProxyConfig::new(
                lookup("CHARTSYNC_PROXY_URL")
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PROXY_URL.to_string()),
            )
        });
        let basedir = lookup("CHARTSYNC_BASEDIR")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASEDIR.to_string());
        let retry = RetryPolicy::new(
            read_u64(&lookup, "CHARTSYNC_RETRY_ATTEMPTS", u64::from(DEFAULT_MAX_ATTEMPTS))
                .try_into()
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            Duration::from_secs(read_u64(
                &lookup,
                "CHARTSYNC_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL.as_secs(),
            )),
        );

        Self {
            root,
            site_url: inputs.site_url,
            basedir,
            proxy,
            mode: inputs.mode,
            state_file,
            retry,
        }
    }
}

fn default_state_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(STATE_DIR_NAME)
        .join(STATE_FILE_NAME)
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn inputs() -> RunInputs {
        RunInputs {
            root: "/srv/ESE".to_string(),
            site_url: "taiko.example".to_string(),
            use_proxy: true,
            mode: RunMode::Upload,
        }
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_reference_behavior() {
        let config = SyncConfig::from_lookup(inputs(), None, lookup_from(&[]));
        assert_eq!(config.root, PathBuf::from("/srv/ESE"));
        assert_eq!(config.proxy, Some(ProxyConfig::default()));
        assert_eq!(config.basedir, "/");
        assert_eq!(config.retry, RetryPolicy::new(3, Duration::from_secs(10)));
        assert!(config.state_file.ends_with("chartsync/uploaded.json"));
    }

    #[test]
    fn environment_overrides_apply() {
        let config = SyncConfig::from_lookup(
            inputs(),
            Some(PathBuf::from("/tmp/state.json")),
            lookup_from(&[
                ("CHARTSYNC_PROXY_URL", "http://10.0.0.1:3128"),
                ("CHARTSYNC_BASEDIR", "/taiko/"),
                ("CHARTSYNC_RETRY_ATTEMPTS", "5"),
                ("CHARTSYNC_RETRY_INTERVAL_SECS", "2"),
            ]),
        );
        assert_eq!(config.proxy, Some(ProxyConfig::new("http://10.0.0.1:3128")));
        assert_eq!(config.basedir, "/taiko/");
        assert_eq!(config.retry, RetryPolicy::new(5, Duration::from_secs(2)));
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = SyncConfig::from_lookup(
            inputs(),
            None,
            lookup_from(&[
                ("CHARTSYNC_RETRY_ATTEMPTS", "0"),
                ("CHARTSYNC_RETRY_INTERVAL_SECS", "soon"),
            ]),
        );
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn proxy_disabled_means_direct_connection() {
        let mut inputs = inputs();
        inputs.use_proxy = false;
        let config = SyncConfig::from_lookup(
            inputs,
            None,
            lookup_from(&[("CHARTSYNC_PROXY_URL", "http://10.0.0.1:3128")]),
        );
        assert_eq!(config.proxy, None);
    }

    #[test]
    fn blank_root_defaults_to_local_catalog_dir() {
        let mut inputs = inputs();
        inputs.root = "  ".to_string();
        let config = SyncConfig::from_lookup(inputs, None, lookup_from(&[]));
        assert_eq!(config.root, PathBuf::from("ESE"));
    }

    #[test]
    fn expands_home_prefix() {
        let home = PathBuf::from("/home/user");
        assert_eq!(expand_with_home("~", &home), home);
        assert_eq!(
            expand_with_home("~/charts", &home),
            PathBuf::from("/home/user/charts")
        );
        assert_eq!(expand_with_home("/abs", &home), PathBuf::from("/abs"));
    }
}
