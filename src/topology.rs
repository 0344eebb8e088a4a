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

//! Declarative description of a lab topology: the nodes to create, the links between them, and
//! the scripts to run on each node once it is up.

use std::{collections::HashMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A complete topology (or scenario) definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyDefinition {
    /// GNS3 server to deploy on, if it differs from the configured default.
    #[serde(default, alias = "gns3_server_ip")]
    pub server_ip: Option<String>,
    /// Name of the GNS3 project. Required if `project_id` is not given.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Id of the GNS3 project. Takes precedence over `project_name`.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Map of template keys to template ids.
    #[serde(default)]
    pub templates: HashMap<String, String>,
    /// Nodes to create.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    /// Links to create.
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

impl TopologyDefinition {
    /// Read a definition from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TopologyError::Io(path.to_string_lossy().into_owned(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| TopologyError::Parse(path.to_string_lossy().into_owned(), e))
    }

    /// Total number of embedded scripts over all nodes.
    pub fn num_scripts(&self) -> usize {
        self.nodes.iter().map(|n| n.scripts.len()).sum()
    }
}

/// A node to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Name of the node, unique within the topology.
    pub name: String,
    /// Template id.
    #[serde(default)]
    pub template_id: Option<String>,
    /// Key into [`TopologyDefinition::templates`].
    #[serde(default)]
    pub template_key: Option<String>,
    /// Template name, looked up in the template catalog of the server.
    #[serde(default)]
    pub template_name: Option<String>,
    /// Horizontal position on the canvas.
    #[serde(default)]
    pub x: i64,
    /// Vertical position on the canvas.
    #[serde(default)]
    pub y: i64,
    /// Zone of the node (`IT`, `DMZ`, `OT`, `Field`). Only used for visualization.
    #[serde(default)]
    pub layer: Option<String>,
    /// Parent node in the visual hierarchy.
    #[serde(default)]
    pub parent_name: Option<String>,
    /// Scripts to run on the node after deployment.
    #[serde(default)]
    pub scripts: Vec<EmbeddedScript>,
}

/// A link between two nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// Both endpoints. A link with any other number of endpoints is rejected when building.
    pub nodes: Vec<EndpointSpec>,
}

/// One side of a [`LinkSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Node name, alias (`NODE_<NAME>`) or node id.
    #[serde(alias = "node", alias = "node_id")]
    pub name: String,
    /// Adapter number
    #[serde(default)]
    pub adapter_number: u32,
    /// Port number
    #[serde(default)]
    pub port_number: u32,
}

impl EndpointSpec {
    /// Create a new endpoint.
    pub fn new(name: impl Into<String>, adapter_number: u32, port_number: u32) -> Self {
        Self {
            name: name.into(),
            adapter_number,
            port_number,
        }
    }
}

/// Default destination of embedded scripts.
fn default_remote_path() -> String {
    String::from("/tmp/script.sh")
}

/// Default priority of embedded scripts.
fn default_priority() -> u32 {
    10
}

/// Default shell of embedded scripts.
fn default_shell() -> String {
    String::from("sh")
}

/// Default timeout of embedded scripts, in seconds.
fn default_timeout() -> f64 {
    30.0
}

/// Helper for serde defaults.
fn default_true() -> bool {
    true
}

/// A script that is part of a node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedScript {
    /// Human readable name.
    pub name: String,
    /// Content of the script.
    pub content: String,
    /// Destination on the node.
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
    /// Scripts with lower priority run first. Scripts with equal priority run concurrently.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Interpreter.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Execute the script after uploading it.
    #[serde(default = "default_true")]
    pub run_after_upload: bool,
}

impl EmbeddedScript {
    /// Create a script with default options.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            remote_path: default_remote_path(),
            priority: default_priority(),
            shell: default_shell(),
            timeout: default_timeout(),
            run_after_upload: true,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the destination path.
    pub fn with_remote_path(mut self, remote_path: impl Into<String>) -> Self {
        self.remote_path = remote_path.into();
        self
    }

    /// The timeout as a [`Duration`]. Negative or invalid values count as zero.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or_default()
    }
}

/// Error when loading a topology definition.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Cannot read the file
    #[error("Cannot read {0}: {1}")]
    Io(String, #[source] std::io::Error),
    /// Cannot parse the file
    #[error("Cannot parse {0}: {1}")]
    Parse(String, #[source] serde_json::Error),
}
