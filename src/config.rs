// src/config.rs

//! Configuration file parsing.
//!
//! Supports TOML configuration files with the following sections:
//! - [cache] - Artifact remote location and local dump path
//! - [convergence] - Protocol server bind address and liveness tuning
//! - [replica] - Convergence server address for the replica agent

use crate::convergence::ConvergenceConfig;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct AdvisorConfig {
    /// Snapshot cache settings
    #[serde(default)]
    pub cache: CacheSection,

    /// Convergence server settings
    #[serde(default)]
    pub convergence: ConvergenceSection,

    /// Replica agent settings
    #[serde(default)]
    pub replica: ReplicaSection,
}

impl AdvisorConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read {path:?}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse {path:?}: {e}")))
    }

    /// Load from a file when given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Snapshot cache section
#[derive(Debug, Deserialize)]
pub struct CacheSection {
    /// Remote location the versioned artifact is pulled from wholesale
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    /// Local path the artifact is downloaded to and loaded from
    #[serde(default = "default_dump_path")]
    pub dump_path: PathBuf,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            dump_path: default_dump_path(),
        }
    }
}

/// Convergence server section
#[derive(Debug, Deserialize)]
pub struct ConvergenceSection {
    /// Bind address for the protocol server
    #[serde(default = "default_convergence_bind")]
    pub bind: String,

    /// Liveness ping interval in seconds
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Pong deadline as a multiple of the ping interval
    #[serde(default = "default_pong_timeout_multiple")]
    pub pong_timeout_multiple: u32,
}

impl Default for ConvergenceSection {
    fn default() -> Self {
        Self {
            bind: default_convergence_bind(),
            ping_interval_secs: default_ping_interval(),
            pong_timeout_multiple: default_pong_timeout_multiple(),
        }
    }
}

impl ConvergenceSection {
    pub fn to_server_config(&self) -> ConvergenceConfig {
        ConvergenceConfig {
            bind_addr: self.bind.clone(),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_timeout_multiple: self.pong_timeout_multiple,
        }
    }
}

/// Replica agent section
#[derive(Debug, Deserialize)]
pub struct ReplicaSection {
    /// Convergence server address the agent connects to
    #[serde(default = "default_replica_server")]
    pub server_addr: String,

    /// Delay between reconnect attempts in seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for ReplicaSection {
    fn default() -> Self {
        Self {
            server_addr: default_replica_server(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

fn default_remote_url() -> String {
    "http://localhost:8730/advisor.db".to_string()
}

fn default_dump_path() -> PathBuf {
    PathBuf::from("/var/lib/advisor/advisor.db")
}

fn default_convergence_bind() -> String {
    "0.0.0.0:8082".to_string()
}

fn default_ping_interval() -> u64 {
    5
}

fn default_pong_timeout_multiple() -> u32 {
    12
}

fn default_replica_server() -> String {
    "127.0.0.1:8082".to_string()
}

fn default_reconnect_delay() -> u64 {
    2
}
