// CyberRange: Deploying and operating GNS3 lab topologies
// Copyright (C) 2026 The CyberRange Authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Configuration of the deployment tooling, read from a TOML file.
//!
//! The path of the file is given on the command line, or through the environment variable
//! `CYBERRANGE_CONFIG`. Every field has a default, so an empty (or missing) file is valid. The
//! server settings can be overwritten with the environment variables `GNS3_BASE_URL`,
//! `GNS3_SERVER_IP`, `GNS3_SERVER_PORT`, `GNS3_SERVER_USER`, and `GNS3_SERVER_PASSWORD`.
//!
//! ```toml
//! [server]
//! ip = "192.168.56.101"
//! port = 80
//! request_delay = 0.2
//!
//! [scripts]
//! root = "scripts"
//! concurrency = 8
//!
//! [collector]
//! template = "syslog-collector"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use gns3_lab::{ApiError, Gns3Client};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable holding the path to the configuration file.
pub const CONFIG_ENV: &str = "CYBERRANGE_CONFIG";

/// The complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// GNS3 server
    pub server: ServerConfig,
    /// Script execution
    pub scripts: ScriptsConfig,
    /// Log collectors
    pub collector: CollectorSection,
    /// File locations
    pub storage: StorageConfig,
}

/// How to reach the GNS3 server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Full base URL. Takes precedence over `ip` and `port`.
    pub base_url: Option<String>,
    /// Address of the server. Also used to reach consoles that listen on a wildcard address.
    pub ip: String,
    /// HTTP port of the REST API
    pub port: u16,
    /// Username for basic authentication
    pub username: Option<String>,
    /// Password for basic authentication
    pub password: Option<String>,
    /// Pause between requests, in seconds
    pub request_delay: f64,
    /// Timeout of each request, in seconds
    pub request_timeout: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            ip: String::from("192.168.56.101"),
            port: 80,
            username: None,
            password: None,
            request_delay: 0.0,
            request_timeout: 30.0,
        }
    }
}

impl ServerConfig {
    /// The base URL of the REST API.
    pub fn base_url(&self) -> String {
        match self.base_url.as_deref().map(|u| u.trim_end_matches('/')) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("http://{}:{}", self.ip, self.port),
        }
    }

    /// Pause between requests.
    pub fn request_delay(&self) -> Duration {
        secs(self.request_delay)
    }

    /// Create a REST client for the server.
    pub fn client(&self) -> Result<Gns3Client, ApiError> {
        let credentials = match (&self.username, &self.password) {
            (Some(user), password) => Some((user.clone(), password.clone().unwrap_or_default())),
            (None, _) => None,
        };
        Gns3Client::new(self.base_url(), credentials, secs(self.request_timeout))
    }
}

/// Script execution settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Directory from which local scripts may be pushed
    pub root: PathBuf,
    /// Maximum number of concurrent console sessions
    pub concurrency: usize,
    /// Pause between two priority groups, in seconds
    pub stage_delay: f64,
    /// Pause between starting the nodes and running the first script, in seconds
    pub boot_delay: f64,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("scripts"),
            concurrency: 8,
            stage_delay: 0.5,
            boot_delay: 2.0,
        }
    }
}

impl ScriptsConfig {
    /// Pause between two priority groups.
    pub fn stage_delay(&self) -> Duration {
        secs(self.stage_delay)
    }

    /// Pause before running the first script.
    pub fn boot_delay(&self) -> Duration {
        secs(self.boot_delay)
    }
}

/// Log collector settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    /// Name of the template of collector nodes
    pub template: String,
    /// Switch to which the IT collector is attached
    pub it_switch: String,
    /// Switch to which the OT collector is attached
    pub ot_switch: String,
    /// Maximum number of concurrent console sessions
    pub concurrency: usize,
    /// File on the collector into which the captured commands are written
    pub log_file: String,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            template: String::from("syslog-collector"),
            it_switch: String::from("IT-Switch"),
            ot_switch: String::from("OT-Switch"),
            concurrency: 8,
            log_file: String::from("/var/log/student.log"),
        }
    }
}

/// Where things are stored locally.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Record of the last deployed topology
    pub project_record: PathBuf,
    /// Directory of stored scripts
    pub scripts_dir: PathBuf,
    /// Directory of student sessions
    pub sessions_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            project_record: PathBuf::from("./config/config.generated.json"),
            scripts_dir: PathBuf::from("./storage/scripts"),
            sessions_dir: PathBuf::from("./storage/students"),
        }
    }
}

impl RangeConfig {
    /// Parse the configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read the configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml(&content)
    }

    /// Read the configuration from `path`, or from the file named in [`CONFIG_ENV`], or use the
    /// defaults if neither is given. Afterwards, apply the environment overrides.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => Self::load(PathBuf::from(path))?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overwrite server settings with the values returned by `var` for the `GNS3_*` variables.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |key: &str| var(key).filter(|v| !v.is_empty());
        if let Some(url) = var("GNS3_BASE_URL") {
            self.server.base_url = Some(url);
        }
        if let Some(ip) = var("GNS3_SERVER_IP") {
            self.server.ip = ip;
        }
        if let Some(port) = var("GNS3_SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("GNS3_SERVER_PORT", port))?;
        }
        if let Some(user) = var("GNS3_SERVER_USER") {
            self.server.username = Some(user);
        }
        if let Some(password) = var("GNS3_SERVER_PASSWORD") {
            self.server.password = Some(password);
        }
        Ok(())
    }
}

/// Convert (possibly invalid) seconds into a duration.
fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or_default()
}

/// Error while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Cannot read the file
    #[error("Cannot read {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    /// Cannot parse the file
    #[error("Cannot parse the configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// An environment variable has an invalid value
    #[error("Invalid value of {0}: {1:?}")]
    InvalidEnv(&'static str, String),
}
