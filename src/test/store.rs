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

use gns3_lab::fake::FakeGns3;
use pretty_assertions::assert_eq;
use test_log::test;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::record_on_console;
use crate::{
    collector::{SnitchNodeInfo, StudentSession},
    store::{
        JsonProjectStore, JsonScriptRepository, JsonSessionStore, ProjectStore, ScriptRepository,
        SessionStore, StoreError, StoredScript,
    },
};

#[test(tokio::test)]
async fn project_store() {
    let gns3 = FakeGns3::start().await;
    let record = record_on_console(&gns3, &[("r1", Some(5000)), ("pc1", None)]);

    let dir = tempfile::tempdir().unwrap();
    let store = JsonProjectStore::new(dir.path().join("state").join("deployed.json"));
    assert!(matches!(store.load().await, Err(StoreError::NotFound(_))));

    store.write(&record).await.unwrap();
    assert_eq!(store.load().await.unwrap(), record);

    let mut updated = record.clone();
    updated.nodes.pop();
    store.write(&updated).await.unwrap();
    assert_eq!(store.load().await.unwrap().nodes.len(), 1);
}

#[test(tokio::test)]
async fn project_store_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deployed.json");
    std::fs::write(&path, "{ not json").unwrap();
    let store = JsonProjectStore::new(&path);
    assert!(matches!(store.load().await, Err(StoreError::Json(p, _)) if p == path));
}

#[test(tokio::test)]
async fn script_repository() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonScriptRepository::new(dir.path());
    repo.put(&StoredScript {
        id: String::from("ospf"),
        name: String::from("Enable OSPF"),
        description: None,
        content: String::from("vtysh -c 'conf t'\n"),
    })
    .await
    .unwrap();

    assert_eq!(repo.content("ospf").await.unwrap(), "vtysh -c 'conf t'\n");
    assert!(matches!(
        repo.content("bgp").await,
        Err(StoreError::NotFound(s)) if s == "script bgp"
    ));
    for key in ["../ospf", ".hidden", "a\\b", ""] {
        assert!(matches!(
            repo.content(key).await,
            Err(StoreError::InvalidKey(k)) if k == key
        ));
    }
}

#[test(tokio::test)]
async fn session_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonSessionStore::new(dir.path().join("sessions"));
    assert_eq!(store.get("alice").await.unwrap(), None);
    assert!(!store.delete("alice").await.unwrap());

    let session = StudentSession {
        name: String::from("alice"),
        display_name: String::from("Alice"),
        created_at: OffsetDateTime::parse("2023-03-01T10:15:00Z", &Rfc3339).unwrap(),
        project_id: String::from("p1"),
        project_name: String::from("lab"),
        gns3_server_ip: String::from("10.0.0.1"),
        gns3_server_port: 3080,
        snitch_nodes: vec![SnitchNodeInfo {
            node_id: String::from("n1"),
            name: String::from("alice-IT-Collector"),
            ip_address: String::from("192.168.10.5"),
            port: 514,
            connected_to_switch: String::from("IT-Switch"),
            console_port: Some(5010),
            console_host: Some(String::from("10.0.0.1")),
        }],
        injected_nodes: vec![String::from("Admin-PC")],
    };
    store.save(&session).await.unwrap();
    assert_eq!(store.get("alice").await.unwrap(), Some(session.clone()));

    let file = std::fs::read_to_string(dir.path().join("sessions").join("alice.json")).unwrap();
    assert!(file.contains("\"created_at\": \"2023-03-01T10:15:00Z\""));

    assert!(store.delete("alice").await.unwrap());
    assert!(!store.delete("alice").await.unwrap());
    assert_eq!(store.get("alice").await.unwrap(), None);
    assert!(matches!(
        store.get("../alice").await,
        Err(StoreError::InvalidKey(_))
    ));
}
