// crates/insight-relay/src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use tracing::{debug, warn};

pub const ENV_HOST: &str = "INSIGHT_RELAY_HOST";
pub const ENV_PORT: &str = "INSIGHT_RELAY_PORT";
pub const ENV_UPSTREAM_URL: &str = "INSIGHT_UPSTREAM_URL";
pub const ENV_THREAD_STORE_URL: &str = "INSIGHT_THREAD_STORE_URL";
pub const ENV_QUERY_TYPE: &str = "INSIGHT_QUERY_TYPE";

/// Overrides read from the environment. Unset and empty values are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    /// Listen host (INSIGHT_RELAY_HOST)
    pub host: Option<String>,
    /// Listen port (INSIGHT_RELAY_PORT)
    pub port: Option<u16>,
    /// Agent streaming endpoint (INSIGHT_UPSTREAM_URL)
    pub upstream_url: Option<String>,
    /// Thread store base URL (INSIGHT_THREAD_STORE_URL)
    pub thread_store_url: Option<String>,
    /// `query_type` sent with every turn (INSIGHT_QUERY_TYPE)
    pub query_type: Option<String>,
}

impl EnvConfig {
    /// Load all environment configuration (call once at startup)
    pub fn load() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = read(ENV_PORT).and_then(|raw| match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!(value = %raw, "Ignoring invalid {}", ENV_PORT);
                None
            }
        });

        let config = Self {
            host: read(ENV_HOST),
            port,
            upstream_url: read(ENV_UPSTREAM_URL),
            thread_store_url: read(ENV_THREAD_STORE_URL),
            query_type: read(ENV_QUERY_TYPE),
        };
        debug!(overrides = config.count(), "Environment configuration loaded");
        config
    }

    fn count(&self) -> usize {
        [
            self.host.is_some(),
            self.port.is_some(),
            self.upstream_url.is_some(),
            self.thread_store_url.is_some(),
            self.query_type.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Format as a human-readable report
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            lines.extend(self.errors.iter().map(|e| format!("  - {}", e)));
        }

        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            lines.extend(self.warnings.iter().map(|w| format!("  - {}", w)));
        }

        if lines.is_empty() {
            "Configuration OK".to_string()
        } else {
            lines.join("\n")
        }
    }
}
