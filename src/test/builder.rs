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

use std::collections::HashMap;

use gns3_lab::{fake::FakeGns3, NodeStatus};
use maplit::hashmap;
use pretty_assertions::assert_eq;
use test_log::test;

use super::node;
use crate::{
    builder::{alias_variants, BuildError, NodeIndex},
    topology::{EndpointSpec, LinkSpec, NodeSpec, TopologyDefinition},
    TopologyBuilder,
};

fn link(a: &str, adapter_a: u32, b: &str, adapter_b: u32) -> LinkSpec {
    LinkSpec {
        nodes: vec![
            EndpointSpec::new(a, adapter_a, 0),
            EndpointSpec::new(b, adapter_b, 0),
        ],
    }
}

/// Names of the nodes on both sides of each link, sorted.
fn wiring(gns3: &FakeGns3, project: &str) -> Vec<Vec<(String, u32)>> {
    let names: HashMap<String, String> = gns3
        .nodes(project)
        .into_iter()
        .map(|n| (n.node_id, n.name))
        .collect();
    let mut links: Vec<Vec<(String, u32)>> = gns3
        .links(project)
        .into_iter()
        .map(|l| {
            let mut ends: Vec<(String, u32)> = l
                .nodes
                .iter()
                .map(|e| (names[&e.node_id].clone(), e.adapter_number))
                .collect();
            ends.sort();
            ends
        })
        .collect();
    links.sort();
    links
}

#[test]
fn aliases() {
    assert_eq!(alias_variants("PC-1"), vec!["NODE_PC_1"]);
    assert_eq!(
        alias_variants("OpenVSwitch IT 1"),
        vec!["NODE_OPENVSWITCH_IT_1", "NODE_OVS_IT_1"]
    );
    assert_eq!(
        alias_variants("iptables-firewall"),
        vec!["NODE_IPTABLES_FIREWALL", "NODE_FIREWALL"]
    );
    assert_eq!(alias_variants("--scada--"), vec!["NODE_SCADA"]);
}

#[test]
fn node_index() {
    let mut index = NodeIndex::default();
    index.insert("PC-1", "id-1");
    index.insert("PC 1", "id-2");

    assert_eq!(index.resolve("NODE_PC_1").unwrap(), "id-1");
    assert_eq!(index.resolve("node_pc_1").unwrap(), "id-1");
    assert_eq!(index.resolve("PC-1").unwrap(), "id-1");
    assert_eq!(index.resolve("PC 1").unwrap(), "id-2");
    assert_eq!(
        index.resolve("3f1a-0000-4000-8000-01").unwrap(),
        "3f1a-0000-4000-8000-01"
    );
    assert!(matches!(
        index.resolve("NODE_PLC"),
        Err(BuildError::UnresolvedPlaceholder(_))
    ));
    assert!(matches!(
        index.resolve("PLC"),
        Err(BuildError::UnresolvedEndpoint(_))
    ));
}

#[test(tokio::test)]
async fn nodes_before_links() {
    let gns3 = FakeGns3::start().await;
    let project = gns3.add_project("lab");
    let template = gns3.add_template("alpine", None);
    let def = TopologyDefinition {
        project_name: Some(String::from("lab")),
        nodes: vec![
            node("PC-1", &template),
            node("Router 1", &template),
            node("OpenVSwitch-IT", &template),
        ],
        links: vec![
            link("NODE_PC_1", 0, "NODE_OVS_IT", 1),
            link("Router 1", 0, "node_openvswitch_it", 2),
        ],
        ..Default::default()
    };
    let client = gns3.client();

    let result = TopologyBuilder::new(&client).build(&def, true).await.unwrap();

    assert_eq!(result.project_id, project);
    assert_eq!(result.nodes_created.len(), 3);
    assert_eq!(result.links_created.len(), 2);
    assert_eq!(result.warnings, Vec::<String>::new());

    let requests = gns3.requests();
    let create_node = format!("POST /v2/projects/{project}/templates/{template}");
    let create_link = format!("POST /v2/projects/{project}/links");
    let last_node = requests.iter().rposition(|r| r == &create_node).unwrap();
    let first_link = requests.iter().position(|r| r == &create_link).unwrap();
    assert_eq!(requests.iter().filter(|r| *r == &create_node).count(), 3);
    assert!(last_node < first_link);

    assert_eq!(
        wiring(&gns3, &project),
        vec![
            vec![
                (String::from("OpenVSwitch-IT"), 1),
                (String::from("PC-1"), 0)
            ],
            vec![
                (String::from("OpenVSwitch-IT"), 2),
                (String::from("Router 1"), 0)
            ],
        ]
    );

    // the record reflects the state after starting the nodes
    assert_eq!(result.record.project_id, project);
    assert_eq!(result.record.project_name.as_deref(), Some("lab"));
    assert_eq!(result.record.nodes.len(), 3);
    assert!(result
        .record
        .nodes
        .iter()
        .all(|n| n.status == NodeStatus::Started));
    assert_eq!(result.record.links.len(), 2);
}

#[test(tokio::test)]
async fn endpoint_order_does_not_matter() {
    let gns3 = FakeGns3::start().await;
    let template = gns3.add_template("alpine", None);
    let client = gns3.client();

    let mut wirings = Vec::new();
    for (name, links) in [
        ("forward", vec![link("NODE_HMI", 0, "plc", 1)]),
        ("backward", vec![link("plc", 1, "NODE_HMI", 0)]),
    ] {
        let project = gns3.add_project(name);
        let def = TopologyDefinition {
            project_id: Some(project.clone()),
            nodes: vec![node("hmi", &template), node("plc", &template)],
            links,
            ..Default::default()
        };
        TopologyBuilder::new(&client).build(&def, false).await.unwrap();
        wirings.push(wiring(&gns3, &project));
    }
    assert_eq!(wirings[0], wirings[1]);
}

#[test(tokio::test)]
async fn structural_errors() {
    let gns3 = FakeGns3::start().await;
    gns3.add_project("lab");
    let template = gns3.add_template("alpine", None);
    let client = gns3.client();
    let builder = TopologyBuilder::new(&client);
    let base = TopologyDefinition {
        project_name: Some(String::from("lab")),
        nodes: vec![node("a", &template), node("b", &template)],
        ..Default::default()
    };

    let def = TopologyDefinition {
        project_name: None,
        ..base.clone()
    };
    assert!(matches!(
        builder.build(&def, false).await,
        Err(BuildError::MissingProject)
    ));

    let def = TopologyDefinition {
        nodes: Vec::new(),
        ..base.clone()
    };
    assert!(matches!(
        builder.build(&def, false).await,
        Err(BuildError::EmptyTopology)
    ));

    let def = TopologyDefinition {
        links: vec![LinkSpec {
            nodes: vec![EndpointSpec::new("a", 0, 0)],
        }],
        ..base.clone()
    };
    let err = builder.build(&def, false).await.unwrap_err();
    assert_eq!(err.to_string(), "Link #0 must specify exactly two endpoints");

    let def = TopologyDefinition {
        links: vec![link("a", 0, "NODE_C", 0)],
        ..base.clone()
    };
    assert!(matches!(
        builder.build(&def, false).await,
        Err(BuildError::UnresolvedPlaceholder(p)) if p == "NODE_C"
    ));

    let def = TopologyDefinition {
        project_name: Some(String::from("other")),
        ..base.clone()
    };
    assert!(matches!(
        builder.build(&def, false).await,
        Err(BuildError::Api(_))
    ));

    let def = TopologyDefinition {
        nodes: vec![NodeSpec {
            name: String::from("c"),
            template_name: Some(String::from("windows")),
            ..Default::default()
        }],
        ..base
    };
    let err = builder.build(&def, false).await.unwrap_err();
    assert_eq!(err.to_string(), "Template 'windows' not found on GNS3 server");
}

#[test(tokio::test)]
async fn template_precedence() {
    let gns3 = FakeGns3::start().await;
    let project = gns3.add_project("lab");
    let alpine = gns3.add_template("alpine", None);
    let debian = gns3.add_template("debian", None);
    let client = gns3.client();
    let def = TopologyDefinition {
        project_id: Some(project.clone()),
        templates: hashmap! { String::from("deb") => debian.clone() },
        nodes: vec![
            NodeSpec {
                name: String::from("by-id"),
                template_id: Some(alpine.clone()),
                template_key: Some(String::from("deb")),
                template_name: Some(String::from("debian")),
                ..Default::default()
            },
            NodeSpec {
                name: String::from("by-key"),
                template_key: Some(String::from("deb")),
                template_name: Some(String::from("alpine")),
                ..Default::default()
            },
            NodeSpec {
                name: String::from("by-name-1"),
                template_key: Some(String::from("unknown")),
                template_name: Some(String::from("alpine")),
                ..Default::default()
            },
            NodeSpec {
                name: String::from("by-name-2"),
                template_name: Some(String::from("debian")),
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    TopologyBuilder::new(&client).build(&def, false).await.unwrap();

    let templates: HashMap<String, Option<String>> = gns3
        .nodes(&project)
        .into_iter()
        .map(|n| (n.name, n.template_id))
        .collect();
    assert_eq!(
        templates,
        hashmap! {
            String::from("by-id") => Some(alpine.clone()),
            String::from("by-key") => Some(debian.clone()),
            String::from("by-name-1") => Some(alpine),
            String::from("by-name-2") => Some(debian),
        }
    );
    // the catalog is fetched only once
    assert_eq!(
        gns3.requests()
            .iter()
            .filter(|r| *r == "GET /v2/templates")
            .count(),
        1
    );
}

#[test(tokio::test)]
async fn soft_failures_are_warnings() {
    let gns3 = FakeGns3::start().await;
    let project = gns3.add_project("lab");
    let template = gns3.add_template("alpine", None);
    gns3.fail("GET", &format!("/v2/projects/{project}/links"));
    let client = gns3.client();
    let def = TopologyDefinition {
        project_id: Some(project),
        nodes: vec![node("a", &template), node("b", &template)],
        links: vec![link("a", 0, "b", 0)],
        ..Default::default()
    };

    let result = TopologyBuilder::new(&client).build(&def, true).await.unwrap();

    assert_eq!(result.links_created.len(), 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("Failed to fetch links detail: "));
    assert!(result.record.links.is_empty());
    assert_eq!(result.record.nodes.len(), 2);
}
