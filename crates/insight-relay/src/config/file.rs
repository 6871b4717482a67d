// crates/insight-relay/src/config/file.rs
// File-based configuration from ~/.insight-relay/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level config structure. Every field is optional; missing values fall
/// back to the built-in defaults.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct RelayConfigFile {
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub threads: ThreadsSection,
}

/// `[relay]`: where the relay listens
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct RelaySection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// `[upstream]`: the agent's streaming endpoint
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct UpstreamSection {
    pub url: Option<String>,
    pub query_type: Option<String>,
}

/// `[threads]`: the external thread store
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ThreadsSection {
    pub url: Option<String>,
}

impl RelayConfigFile {
    /// Load config from ~/.insight-relay/config.toml
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path. Never fails: a missing file gives
    /// defaults, a malformed one is reported and ignored.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".insight-relay")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[relay]
host = "0.0.0.0"
port = 4000

[upstream]
url = "http://agent:8000/stream"
query_type = "analysis"

[threads]
url = "http://threads:9000"
"#;
        let config: RelayConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(config.relay.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.relay.port, Some(4000));
        assert_eq!(config.upstream.query_type.as_deref(), Some("analysis"));
        assert_eq!(config.threads.url.as_deref(), Some("http://threads:9000"));
    }

    #[test]
    fn test_parse_partial_config() {
        let config: RelayConfigFile = toml::from_str("[relay]\nport = 1\n").unwrap();
        assert_eq!(config.relay.port, Some(1));
        assert!(config.upstream.url.is_none());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: RelayConfigFile = toml::from_str("").unwrap();
        assert_eq!(config, RelayConfigFile::default());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfigFile::load_from(&dir.path().join("nope.toml"));
        assert_eq!(config, RelayConfigFile::default());
    }

    #[test]
    fn test_load_malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay\nport = ").unwrap();
        let config = RelayConfigFile::load_from(file.path());
        assert_eq!(config, RelayConfigFile::default());
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream]\nurl = \"http://10.0.0.2/stream\"").unwrap();
        let config = RelayConfigFile::load_from(file.path());
        assert_eq!(config.upstream.url.as_deref(), Some("http://10.0.0.2/stream"));
    }

    #[test]
    fn test_config_path() {
        let path = RelayConfigFile::config_path();
        assert!(path.ends_with(".insight-relay/config.toml"));
    }
}
