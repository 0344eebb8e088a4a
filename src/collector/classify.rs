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

//! Heuristics on node names: which layer of the plant a node belongs to, which nodes are part of
//! the lab infrastructure, and which collector a node reports to.

use std::collections::BTreeMap;

use gns3_lab::{HasConsole, Node, NodeStatus};
use serde::{Deserialize, Serialize};

use super::SnitchNodeInfo;

/// Layer (zone) of a node in the lab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    /// Corporate network
    IT,
    /// Demilitarized zone between IT and OT
    DMZ,
    /// Operational technology (control systems)
    OT,
    /// Field devices
    Field,
    /// Could not be classified
    Unknown,
}

impl Layer {
    /// All layers, in the order in which they are reported.
    pub const ALL: [Layer; 5] = [Layer::IT, Layer::DMZ, Layer::OT, Layer::Field, Layer::Unknown];
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Layer::IT => "IT",
            Layer::DMZ => "DMZ",
            Layer::OT => "OT",
            Layer::Field => "Field",
            Layer::Unknown => "Unknown",
        })
    }
}

/// Classifies nodes by their name.
pub trait NodeClassifier: Send + Sync + std::fmt::Debug {
    /// The layer of a node.
    fn layer(&self, name: &str) -> Layer;

    /// Switches and collectors are never instrumented.
    fn is_infrastructure(&self, name: &str) -> bool {
        name.contains("Switch") || name.contains("Collector")
    }

    /// The collector to which the node `name` should send its commands. Nodes with `OT` in their
    /// name go to the OT collector, all others to the IT collector. If the preferred collector is
    /// not deployed, the first one is used.
    fn collector_for<'s>(
        &self,
        name: &str,
        collectors: &'s [SnitchNodeInfo],
    ) -> Option<&'s SnitchNodeInfo> {
        let find = |role: &str| {
            collectors
                .iter()
                .find(|c| collector_role(&c.name) == Some(role))
        };
        name.to_uppercase()
            .contains("OT")
            .then(|| find("OT"))
            .flatten()
            .or_else(|| find("IT"))
            .or_else(|| collectors.first())
    }

    /// Key under which the logs of a collector are reported: `it`, `ot`, or the lowercased name.
    fn collector_key(&self, collector_name: &str) -> String {
        match collector_role(collector_name) {
            Some(role) => role.to_lowercase(),
            None => collector_name.to_lowercase(),
        }
    }
}

/// Role (`IT` or `OT`) of a collector. The role suffix of the name (`-IT-Collector`) decides;
/// without suffix, any occurrence of `IT` or `OT` in the name does.
fn collector_role(name: &str) -> Option<&'static str> {
    const ROLES: [&str; 2] = ["IT", "OT"];
    let upper = name.to_uppercase();
    ROLES
        .into_iter()
        .find(|role| upper.ends_with(&format!("-{role}-COLLECTOR")))
        .or_else(|| ROLES.into_iter().find(|role| upper.contains(role)))
}

/// Keywords that mark a node as part of the OT layer.
const OT_KEYWORDS: &[&str] = &[
    "plc",
    "hmi",
    "scada",
    "rtu",
    "ics",
    "historian",
    "engineering",
    "dcs",
    "mtconnect",
    "opcua",
    "modbus",
    "controller",
];

/// Keywords that mark a field device.
const FIELD_KEYWORDS: &[&str] = &[
    "sensor", "actuator", "motor", "valve", "pump", "field", "io", "remote", "terminal",
];

/// Keywords that mark a node in the DMZ.
const DMZ_KEYWORDS: &[&str] = &[
    "dmz",
    "web",
    "proxy",
    "gateway",
    "firewall",
    "fw",
    "router",
    "switch",
    "openvswitch",
    "ovs",
    "nat",
    "vpn",
];

/// Keywords that mark a node in the corporate network.
const IT_KEYWORDS: &[&str] = &[
    "workstation",
    "client",
    "user",
    "admin",
    "corporate",
    "office",
    "desktop",
    "laptop",
    "pc",
    "ubuntu",
    "windows",
    "kali",
    "attacker",
    "server",
    "dhcp",
    "dns",
    "ad",
    "domain",
];

/// Substring matching on the lowercased name. The layers are checked in the order OT, Field,
/// DMZ, IT, and the first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl NodeClassifier for KeywordClassifier {
    fn layer(&self, name: &str) -> Layer {
        let name = name.to_lowercase();
        [
            (Layer::OT, OT_KEYWORDS),
            (Layer::Field, FIELD_KEYWORDS),
            (Layer::DMZ, DMZ_KEYWORDS),
            (Layer::IT, IT_KEYWORDS),
        ]
        .into_iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| name.contains(kw)))
        .map(|(layer, _)| layer)
        .unwrap_or(Layer::Unknown)
    }
}

/// A node of a running project, as listed per layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Node UUID
    pub node_id: String,
    /// Node name
    pub name: String,
    /// Run state
    pub status: NodeStatus,
    /// Console port
    pub console: Option<u16>,
    /// Console protocol
    pub console_type: Option<String>,
    /// Console host, with wildcard hosts replaced by the server address
    pub console_host: String,
    /// Inferred layer
    pub layer: Layer,
}

/// Group the nodes of a project by their layer. Every layer is present in the result, possibly
/// with no nodes.
pub fn group_by_layer(
    classifier: &dyn NodeClassifier,
    nodes: &[Node],
    server_host: &str,
) -> BTreeMap<Layer, Vec<NodeSummary>> {
    let mut groups: BTreeMap<Layer, Vec<NodeSummary>> =
        Layer::ALL.into_iter().map(|l| (l, Vec::new())).collect();
    for node in nodes {
        let layer = classifier.layer(&node.name);
        let console_host = match node.console_target(server_host) {
            Some(target) => target.host,
            None => node
                .console_host
                .clone()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| server_host.to_string()),
        };
        groups.entry(layer).or_default().push(NodeSummary {
            node_id: node.node_id.clone(),
            name: node.name.clone(),
            status: node.status,
            console: node.console,
            console_type: node.console_type.clone(),
            console_host,
            layer,
        });
    }
    groups
}
