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

//! Resources exchanged with the GNS3 REST API.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Host names under which GNS3 reports a console that listens on all interfaces.
const WILDCARD_HOSTS: [&str; 4] = ["", "0.0.0.0", "::", "0:0:0:0:0:0:0:0"];

/// A GNS3 project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project UUID
    pub project_id: String,
    /// Human readable name
    pub name: String,
    /// `opened` or `closed`
    #[serde(default)]
    pub status: Option<String>,
}

/// An entry of the template catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Template UUID
    pub template_id: String,
    /// Name of the template, as shown in the GNS3 GUI.
    pub name: String,
    /// Kind of the template (`qemu`, `docker`, `ethernet_switch`, ...)
    #[serde(default)]
    pub template_type: Option<String>,
}

/// Run state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// The node is running
    Started,
    /// The node is powered off
    Stopped,
    /// The node is paused
    Suspended,
    /// Anything else reported by the server
    #[default]
    #[serde(other)]
    Unknown,
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Started => f.write_str("started"),
            NodeStatus::Stopped => f.write_str("stopped"),
            NodeStatus::Suspended => f.write_str("suspended"),
            NodeStatus::Unknown => f.write_str("unknown"),
        }
    }
}

/// A network port of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Adapter on which the port lives
    #[serde(default)]
    pub adapter_number: u32,
    /// Port number on that adapter
    #[serde(default)]
    pub port_number: u32,
    /// Interface name, like `eth0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_compute_id() -> String {
    String::from("local")
}

/// A node inside of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node UUID
    pub node_id: String,
    /// Unique name of the node within the project
    pub name: String,
    /// Template from which the node was created
    #[serde(default)]
    pub template_id: Option<String>,
    /// Emulator of the node
    #[serde(default)]
    pub node_type: Option<String>,
    /// Compute server that hosts the node
    #[serde(default = "default_compute_id")]
    pub compute_id: String,
    /// Console port
    #[serde(default)]
    pub console: Option<u16>,
    /// Host on which the console listens
    #[serde(default)]
    pub console_host: Option<String>,
    /// Console protocol (`telnet`, `vnc`, `spice`, `none`)
    #[serde(default)]
    pub console_type: Option<String>,
    /// Network ports
    #[serde(default)]
    pub ports: Vec<Port>,
    /// Emulator specific properties
    #[serde(default)]
    pub properties: serde_json::Value,
    /// Run state
    #[serde(default)]
    pub status: NodeStatus,
    /// Horizontal canvas position
    #[serde(default)]
    pub x: i64,
    /// Vertical canvas position
    #[serde(default)]
    pub y: i64,
}

impl Node {
    /// Number of network adapters, if the emulator reports it.
    pub fn adapters(&self) -> Option<u64> {
        self.properties.get("adapters").and_then(|x| x.as_u64())
    }

    /// Auxiliary console port, if the emulator reports it.
    pub fn aux(&self) -> Option<u64> {
        self.properties.get("aux").and_then(|x| x.as_u64())
    }
}

/// One side of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEndpoint {
    /// Node UUID
    pub node_id: String,
    /// Adapter of that node
    #[serde(default)]
    pub adapter_number: u32,
    /// Port on that adapter
    #[serde(default)]
    pub port_number: u32,
}

impl LinkEndpoint {
    /// Create a new endpoint.
    pub fn new(node_id: impl Into<String>, adapter_number: u32, port_number: u32) -> Self {
        Self {
            node_id: node_id.into(),
            adapter_number,
            port_number,
        }
    }
}

/// A link between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link UUID
    pub link_id: String,
    /// Link type, usually `ethernet`
    #[serde(default)]
    pub link_type: Option<String>,
    /// Both ends of the link
    #[serde(default)]
    pub nodes: Vec<LinkEndpoint>,
}

impl Link {
    /// Check if the link uses the given node.
    pub fn touches(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|e| e.node_id == node_id)
    }
}

/// Address of a telnet console.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsoleTarget {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl ConsoleTarget {
    /// Create a new console target.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Display for ConsoleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Anything that describes the console of a node. The provided method
/// [`HasConsole::console_target`] decides whether the console can be reached over telnet, and
/// where.
pub trait HasConsole {
    /// The console protocol.
    fn console_type(&self) -> Option<&str>;
    /// The console port.
    fn console_port(&self) -> Option<u16>;
    /// The console host as reported by the server.
    fn console_host(&self) -> Option<&str>;

    /// Get the telnet console target. Returns `None` if the console is not a telnet console, or if
    /// no port is assigned. A wildcard host (`0.0.0.0`, `::` or empty) is replaced by
    /// `server_host`, the address under which the GNS3 server is reachable.
    fn console_target(&self, server_host: &str) -> Option<ConsoleTarget> {
        if self.console_type() != Some("telnet") {
            return None;
        }
        let port = self.console_port()?;
        let host = match self.console_host().map(str::trim) {
            Some(h) if !WILDCARD_HOSTS.contains(&h) => h,
            _ => server_host,
        };
        Some(ConsoleTarget::new(host, port))
    }
}

impl HasConsole for Node {
    fn console_type(&self) -> Option<&str> {
        self.console_type.as_deref()
    }

    fn console_port(&self) -> Option<u16> {
        self.console
    }

    fn console_host(&self) -> Option<&str> {
        self.console_host.as_deref()
    }
}
