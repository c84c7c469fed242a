//! Configuration for the appwatch server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use appwatch_core::session::state::DEFAULT_REFRESH_MS;
use appwatch_core::RefreshInterval;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Per-connection session settings.
    pub session: SessionConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the TCP listener on.
    pub listen_address: IpAddr,
    /// TCP port clients connect to.
    pub port: u16,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between poll cycles, in milliseconds. Must lie strictly
    /// between 500 and 10000.
    pub refresh_interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 2000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
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

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.network.listen_address, self.network.port)
    }

    /// The configured refresh interval, or the default when the value is
    /// out of range.
    pub fn refresh_interval(&self) -> RefreshInterval {
        let mut refresh = RefreshInterval::default();
        if !refresh.set_millis(self.session.refresh_interval_ms) {
            tracing::warn!(
                requested = self.session.refresh_interval_ms,
                "refresh interval out of range; keeping {}ms",
                refresh.as_millis()
            );
        }
        refresh
    }
}

// ── Tests ────────────────────────────────────────────────────────
