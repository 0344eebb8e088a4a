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

use std::time::Duration;

use gns3_lab::fake::{FakeConsole, FakeGns3};
use pretty_assertions::assert_eq;
use test_log::test;

use super::{fast_pusher, node, LOCALHOST};
use crate::{
    deploy::{deploy, DeployOptions},
    store::{JsonProjectStore, ProjectStore, StoreError},
    topology::{EmbeddedScript, EndpointSpec, LinkSpec, TopologyDefinition},
};

fn fast_options() -> DeployOptions {
    DeployOptions {
        boot_delay: Duration::from_millis(10),
        stage_delay: Duration::from_millis(10),
        ..Default::default()
    }
}

/// A project with a router and a PC, both created from a template whose nodes answer on
/// `console`. The router configures its interface before the PC sets its default route.
fn topology(gns3: &FakeGns3, console: &FakeConsole) -> TopologyDefinition {
    gns3.add_project("range");
    let template = gns3.add_template("alpine", Some(console.port()));
    let mut router = node("Router", &template);
    router.scripts = vec![EmbeddedScript::new("interfaces", "ip link set eth1 up\n")
        .with_priority(1)
        .with_remote_path("/tmp/interfaces.sh")];
    let mut pc = node("PC-1", &template);
    pc.scripts = vec![EmbeddedScript::new("route", "ip route add default via 10.0.0.1\n")
        .with_priority(2)
        .with_remote_path("/tmp/route.sh")];
    TopologyDefinition {
        project_name: Some(String::from("range")),
        nodes: vec![router, pc],
        links: vec![LinkSpec {
            nodes: vec![
                EndpointSpec::new("NODE_ROUTER", 1, 0),
                EndpointSpec::new("NODE_PC_1", 0, 0),
            ],
        }],
        ..Default::default()
    }
}

#[test(tokio::test)]
async fn deploy_and_run_scripts() {
    let gns3 = FakeGns3::start().await;
    let console = FakeConsole::start().await.unwrap();
    let def = topology(&gns3, &console);
    let dir = tempfile::tempdir().unwrap();
    let store = JsonProjectStore::new(dir.path().join("config.generated.json"));
    let client = gns3.client();
    let pusher = fast_pusher();

    let report = deploy(&client, &pusher, &store, &def, LOCALHOST, &fast_options())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.project_name.as_deref(), Some("range"));
    assert_eq!(report.nodes_created, 2);
    assert_eq!(report.links_created, 1);
    assert_eq!(report.errors, Vec::<String>::new());
    let scripts: Vec<(&str, &str, bool)> = report
        .scripts_executed
        .iter()
        .map(|s| (s.node_name.as_str(), s.script_name.as_str(), s.success))
        .collect();
    assert_eq!(
        scripts,
        vec![("Router", "interfaces", true), ("PC-1", "route", true)]
    );
    assert_eq!(
        console.file("/tmp/route.sh").as_deref(),
        Some("ip route add default via 10.0.0.1\n")
    );

    let record = store.load().await.unwrap();
    assert_eq!(record.project_id, report.project_id);
    assert_eq!(record.nodes.len(), 2);
    assert_eq!(record.links.len(), 1);
    assert!(record.node("PC-1").is_some());
}

#[test(tokio::test)]
async fn failing_script() {
    let gns3 = FakeGns3::start().await;
    let console = FakeConsole::start().await.unwrap();
    console.exit_code("sh /tmp/route.sh", 2);
    let def = topology(&gns3, &console);
    let dir = tempfile::tempdir().unwrap();
    let store = JsonProjectStore::new(dir.path().join("config.generated.json"));
    let client = gns3.client();
    let pusher = fast_pusher();

    let report = deploy(&client, &pusher, &store, &def, LOCALHOST, &fast_options())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.nodes_created, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("PC-1/route: "));
    let failed = &report.scripts_executed[1];
    assert_eq!(failed.exit_code, Some(2));
}

#[test(tokio::test)]
async fn without_starting_nodes() {
    let gns3 = FakeGns3::start().await;
    let console = FakeConsole::start().await.unwrap();
    let def = topology(&gns3, &console);
    let dir = tempfile::tempdir().unwrap();
    let store = JsonProjectStore::new(dir.path().join("config.generated.json"));
    let client = gns3.client();
    let pusher = fast_pusher();
    let options = DeployOptions {
        start_nodes: false,
        ..fast_options()
    };

    let report = deploy(&client, &pusher, &store, &def, LOCALHOST, &options)
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.scripts_executed, Vec::new());
    assert!(console.commands().is_empty());
    assert!(gns3
        .requests()
        .iter()
        .all(|r| !r.ends_with("/start")));
    assert_eq!(store.load().await.unwrap().nodes.len(), 2);
}

#[test(tokio::test)]
async fn store_failure_is_a_warning() {
    let gns3 = FakeGns3::start().await;
    let console = FakeConsole::start().await.unwrap();
    let def = topology(&gns3, &console);
    let dir = tempfile::tempdir().unwrap();
    // a file in place of the parent directory
    let blocker = dir.path().join("config");
    std::fs::write(&blocker, "").unwrap();
    let store = JsonProjectStore::new(blocker.join("config.generated.json"));
    let client = gns3.client();
    let pusher = fast_pusher();
    let options = DeployOptions {
        run_scripts: false,
        ..fast_options()
    };

    let report = deploy(&client, &pusher, &store, &def, LOCALHOST, &options)
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("Failed to store the deployed topology: "));
    assert!(matches!(store.load().await, Err(StoreError::Io(_, _))));
}
