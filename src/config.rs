//! Configuration management for the openwebif CLI
//!
//! Handles config file loading and environment overrides.
//! Config is stored at ~/.config/openwebif/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{ClientOptions, DEFAULT_PORT};

/// Receiver connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP or hostname of the receiver
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_https: bool,
    /// Never fall back to screen grabs when no picon exists
    pub prefer_picon: bool,
    /// MAC address for Wake-on-LAN
    pub mac_address: Option<String>,
    /// `power off` goes to deep standby
    pub turn_off_to_deep: bool,
    /// Bouquet reference to take sources from
    pub source_bouquet: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get config file path (~/.config/openwebif/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("openwebif").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply OPENWEBIF_HOST, OPENWEBIF_PORT, OPENWEBIF_USER and
    /// OPENWEBIF_PASSWORD from the environment
    pub fn with_env(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("OPENWEBIF_HOST") {
            self.host = Some(host);
        }
        if let Some(port) = lookup("OPENWEBIF_PORT").and_then(|p| p.parse().ok()) {
            self.port = Some(port);
        }
        if let Some(user) = lookup("OPENWEBIF_USER") {
            self.username = Some(user);
        }
        if let Some(password) = lookup("OPENWEBIF_PASSWORD") {
            self.password = Some(password);
        }
    }

    /// Client options for these settings
    pub fn to_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new(self.host.clone().unwrap_or_default())
            .with_port(self.port.unwrap_or(DEFAULT_PORT))
            .with_https(self.use_https)
            .with_prefer_picon(self.prefer_picon)
            .with_turn_off_to_deep(self.turn_off_to_deep);

        options.username = self.username.clone();
        options.password = self.password.clone();
        options.mac_address = self.mac_address.clone();
        options.source_bouquet = self.source_bouquet.clone();
        if let Some(secs) = self.timeout_secs {
            options.timeout = Duration::from_secs(secs);
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.host.is_none());
        assert!(!config.prefer_picon);
        assert_eq!(config.to_options().port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            host = "vusolo2.local"
            prefer_picon = true
            timeout_secs = 3
            "#,
        )
        .unwrap();

        let options = config.to_options();
        assert_eq!(options.host, "vusolo2.local");
        assert!(options.prefer_picon);
        assert!(!options.use_https);
        assert_eq!(options.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("OPENWEBIF_HOST", "10.0.0.2"),
            ("OPENWEBIF_PORT", "8080"),
            ("OPENWEBIF_USER", "root"),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            host: Some("old-host".into()),
            password: Some("secret".into()),
            ..Config::default()
        };
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.username.as_deref(), Some("root"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_bad_port_env_is_ignored() {
        let mut config = Config {
            port: Some(81),
            ..Config::default()
        };
        config.apply_overrides(|key| (key == "OPENWEBIF_PORT").then(|| "http".to_string()));
        assert_eq!(config.port, Some(81));
    }

    #[test]
    fn test_load_from_written_file() {
        let dir = std::env::temp_dir().join(format!("openwebif-config-{}", std::process::id()));
        let path = dir.join("config.toml");

        let config = Config {
            host: Some("enigma2".into()),
            mac_address: Some("00:1d:ec:01:02:03".into()),
            turn_off_to_deep: true,
            ..Config::default()
        };
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(dir);
    }
}
