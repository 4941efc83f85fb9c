//! Configuration module for memspace.

use crate::error::{MemspaceError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main configuration for a memspace process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemspaceConfig {
    /// Namespace master configuration.
    #[serde(default)]
    pub master: MasterConfig,
    /// Worker session tracking configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl MemspaceConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MemspaceError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            MemspaceError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.master.ufs_address.trim().is_empty() {
            return Err(MemspaceError::InvalidConfig {
                field: "master.ufs_address".to_string(),
                reason: "Under storage address must be set".to_string(),
            });
        }

        if self.master.default_block_size_bytes == 0 {
            return Err(MemspaceError::InvalidConfig {
                field: "master.default_block_size_bytes".to_string(),
                reason: "Block size must be non-zero".to_string(),
            });
        }

        if self.master.ttl_check_interval.is_zero() {
            return Err(MemspaceError::InvalidConfig {
                field: "master.ttl_check_interval".to_string(),
                reason: "Interval must be non-zero".to_string(),
            });
        }

        if self.worker.session_timeout.is_zero() {
            return Err(MemspaceError::InvalidConfig {
                field: "worker.session_timeout".to_string(),
                reason: "Session timeout must be non-zero".to_string(),
            });
        }

        if self.worker.master_heartbeat_interval.is_zero() {
            return Err(MemspaceError::InvalidConfig {
                field: "worker.master_heartbeat_interval".to_string(),
                reason: "Interval must be non-zero".to_string(),
            });
        }

        if self.worker.session_check_interval.is_zero() {
            return Err(MemspaceError::InvalidConfig {
                field: "worker.session_check_interval".to_string(),
                reason: "Interval must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        Self {
            master: MasterConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 19998)),
                ufs_address: "/tmp/memspace/underfs".to_string(),
                default_block_size_bytes: 16 * 1024 * 1024,
                ttl_check_interval: Duration::from_secs(10),
            },
            worker: WorkerConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 29998)),
                master_addr: SocketAddr::from(([127, 0, 0, 1], 19998)),
                master_heartbeat_interval: Duration::from_secs(1),
                session_timeout: Duration::from_secs(10),
                session_check_interval: Duration::from_secs(1),
            },
            observability: ObservabilityConfig {
                metrics_enabled: false,
                log_level: "debug".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Namespace master configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Address to bind the master API.
    pub bind_addr: SocketAddr,
    /// Under storage location mounted at the namespace root.
    pub ufs_address: String,
    /// Block size for files imported from under storage.
    pub default_block_size_bytes: u64,
    /// How often files with an elapsed TTL are deleted.
    #[serde(with = "humantime_serde")]
    pub ttl_check_interval: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 19998)),
            ufs_address: "/var/lib/memspace/underfs".to_string(),
            default_block_size_bytes: 512 * 1024 * 1024, // 512MB
            ttl_check_interval: Duration::from_secs(60),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Address to bind the worker session API.
    #[serde(default = "default_worker_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Master the worker registers with.
    #[serde(default = "default_master_addr")]
    pub master_addr: SocketAddr,
    /// How often the worker heartbeats the master.
    #[serde(default = "default_master_heartbeat_interval", with = "humantime_serde")]
    pub master_heartbeat_interval: Duration,
    /// Time without a heartbeat after which a session is abandoned.
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,
    /// How often timed-out sessions are swept.
    #[serde(with = "humantime_serde")]
    pub session_check_interval: Duration,
}

fn default_worker_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 29998))
}

fn default_master_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 19998))
}

fn default_master_heartbeat_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_worker_bind_addr(),
            master_addr: default_master_addr(),
            master_heartbeat_interval: default_master_heartbeat_interval(),
            session_timeout: Duration::from_secs(10),
            session_check_interval: Duration::from_secs(1),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics.
    pub metrics_enabled: bool,
    /// Metrics bind address.
    pub metrics_addr: SocketAddr,
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Parse `"250ms"`, `"5s"`, `"2m"`, or a bare number of milliseconds.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(s_val) = s.strip_suffix('s') {
            s_val
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(m) = s.strip_suffix('m') {
            m.parse::<u64>()
                .map(|v| Duration::from_secs(v * 60))
                .map_err(|e| e.to_string())
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        }
    }
}
