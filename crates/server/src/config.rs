//! Host configuration, loaded from TOML.
//!
//! # Example
//!
//! ```toml
//! [[services]]
//! name = "Test"
//! urls = ["127.0.0.1:8080", "http://localhost:8081/"]
//!
//! [[services.controllers]]
//! name = "Default"
//! type = "TestService.ServiceClass"
//! ```
//!
//! `type` names a controller factory known to the [`Provisioner`](crate::Provisioner).
//! A missing or blank controller `name` registers the default controller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────────────────────────────

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// One `[[services]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Addresses to bind: `host:port` or an `http://host:port/` prefix.
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

/// One `[[services.controllers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub name: String,
    /// Provisioner key of the controller type.
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a host config TOML file from `path`.
pub fn read_host_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
