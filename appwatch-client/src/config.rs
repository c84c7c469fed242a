//! Console client configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Output settings.
    pub output: OutputConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server address, `host:port`.
    pub server_address: String,
    /// Connection timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print one JSON object per event instead of text lines.
    pub json: bool,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:2000".into(),
            timeout_ms: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ClientConfig::default()).unwrap();
        assert!(text.contains("server_address"));
        assert!(text.contains("json"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ClientConfig::default()).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.server_address, "127.0.0.1:2000");
        assert_eq!(parsed.network.timeout_ms, 5000);
        assert!(!parsed.output.json);
    }
}
