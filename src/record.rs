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

//! Snapshot of a deployed topology, as stored after a build.

use gns3_lab::{
    rest_types::{Link, LinkEndpoint, Node, NodeStatus},
    HasConsole,
};
use serde::{Deserialize, Serialize};

/// The deployed topology: which nodes exist, how to reach their consoles, and how they are linked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployedConfigRecord {
    /// Project name
    #[serde(default)]
    pub project_name: Option<String>,
    /// Project id
    pub project_id: String,
    /// All nodes
    #[serde(default)]
    pub nodes: Vec<DeployedNode>,
    /// All links
    #[serde(default)]
    pub links: Vec<DeployedLink>,
}

impl DeployedConfigRecord {
    /// Build the record from the node and link details returned by the server.
    pub fn from_details(
        project_id: impl Into<String>,
        project_name: Option<String>,
        nodes: &[Node],
        links: &[Link],
    ) -> Self {
        Self {
            project_name,
            project_id: project_id.into(),
            nodes: nodes.iter().map(DeployedNode::from).collect(),
            links: links.iter().map(DeployedLink::from).collect(),
        }
    }

    /// Find a node by name.
    pub fn node(&self, name: &str) -> Option<&DeployedNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Adapter and port of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Adapter number
    pub adapter_number: u32,
    /// Port number
    pub port_number: u32,
}

/// Hardware properties relevant for wiring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProperties {
    /// Number of network adapters
    #[serde(default)]
    pub adapters: Option<u64>,
    /// Auxiliary console port
    #[serde(default)]
    pub aux: Option<u64>,
}

/// A node of the deployed topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedNode {
    /// Node name
    pub name: String,
    /// Node id
    pub node_id: String,
    /// Template from which the node was created
    #[serde(default)]
    pub template_id: Option<String>,
    /// Compute server hosting the node
    pub compute_id: String,
    /// Console port
    #[serde(default)]
    pub console: Option<u16>,
    /// Console host
    #[serde(default)]
    pub console_host: Option<String>,
    /// Console protocol
    #[serde(default)]
    pub console_type: Option<String>,
    /// Network ports
    #[serde(default)]
    pub ports: Vec<PortRecord>,
    /// Hardware properties
    #[serde(default)]
    pub properties: NodeProperties,
    /// Run state at the time of the snapshot
    #[serde(default)]
    pub status: NodeStatus,
    /// Horizontal canvas position
    #[serde(default)]
    pub x: i64,
    /// Vertical canvas position
    #[serde(default)]
    pub y: i64,
}

impl From<&Node> for DeployedNode {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            node_id: node.node_id.clone(),
            template_id: node.template_id.clone(),
            compute_id: node.compute_id.clone(),
            console: node.console,
            console_host: node.console_host.clone(),
            console_type: node.console_type.clone(),
            ports: node
                .ports
                .iter()
                .map(|p| PortRecord {
                    adapter_number: p.adapter_number,
                    port_number: p.port_number,
                })
                .collect(),
            properties: NodeProperties {
                adapters: node.adapters(),
                aux: node.aux(),
            },
            status: node.status,
            x: node.x,
            y: node.y,
        }
    }
}

impl HasConsole for DeployedNode {
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

/// Default link type.
fn default_link_type() -> String {
    String::from("ethernet")
}

/// A link of the deployed topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedLink {
    /// Link id
    pub link_id: String,
    /// Link type
    #[serde(default = "default_link_type")]
    pub link_type: String,
    /// Both ends
    pub nodes: Vec<LinkEndpoint>,
}

impl From<&Link> for DeployedLink {
    fn from(link: &Link) -> Self {
        Self {
            link_id: link.link_id.clone(),
            link_type: link.link_type.clone().unwrap_or_else(default_link_type),
            nodes: link.nodes.clone(),
        }
    }
}
