// crates/insight-relay/src/config/mod.rs
// Configuration: built-in defaults, then the config file, then the environment

pub mod env;
pub mod file;

pub use env::{ConfigValidation, EnvConfig};
pub use file::RelayConfigFile;

use tracing::info;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000/stream";
pub const DEFAULT_THREAD_STORE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_QUERY_TYPE: &str = "chat";

/// Resolved relay configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub upstream_url: String,
    pub thread_store_url: String,
    pub query_type: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            thread_store_url: DEFAULT_THREAD_STORE_URL.to_string(),
            query_type: DEFAULT_QUERY_TYPE.to_string(),
        }
    }
}

impl RelayConfig {
    /// Load from ~/.insight-relay/config.toml and the environment
    pub fn load() -> Self {
        let config = Self::from_sources(RelayConfigFile::load(), EnvConfig::load());
        info!(
            listen = %config.listen_addr(),
            upstream = %config.upstream_url,
            "Configuration loaded"
        );
        config
    }

    /// Merge defaults <- file <- env
    pub fn from_sources(file: RelayConfigFile, env: EnvConfig) -> Self {
        let defaults = Self::default();
        Self {
            host: env.host.or(file.relay.host).unwrap_or(defaults.host),
            port: env.port.or(file.relay.port).unwrap_or(defaults.port),
            upstream_url: env
                .upstream_url
                .or(file.upstream.url)
                .unwrap_or(defaults.upstream_url),
            thread_store_url: env
                .thread_store_url
                .or(file.threads.url)
                .unwrap_or(defaults.thread_store_url),
            query_type: env
                .query_type
                .or(file.upstream.query_type)
                .unwrap_or(defaults.query_type),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        check_url(&mut validation, "upstream url", &self.upstream_url);
        check_url(&mut validation, "thread store url", &self.thread_store_url);

        if self.host.trim().is_empty() {
            validation.add_error("relay host is empty");
        }
        if self.port == 0 {
            validation.add_warning("relay port is 0; the OS will pick a free port");
        }
        if self.query_type.trim().is_empty() {
            validation.add_error("query_type is empty");
        }

        validation
    }
}

fn check_url(validation: &mut ConfigValidation, label: &str, raw: &str) {
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if url.host_str().is_none() {
                validation.add_error(format!("{} '{}' has no host", label, raw));
            }
        }
        Ok(url) => validation.add_error(format!(
            "{} '{}' must use http or https, not '{}'",
            label,
            raw,
            url.scheme()
        )),
        Err(e) => validation.add_error(format!("{} '{}' is not a valid URL: {}", label, raw, e)),
    }
}
