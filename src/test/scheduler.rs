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

use super::{fast_pusher, node_with_scripts, record_on_console, LOCALHOST};
use crate::{
    scheduler::{priority_groups, ScriptScheduler},
    topology::EmbeddedScript,
};

fn script(name: &str, priority: u32) -> EmbeddedScript {
    EmbeddedScript::new(name, format!("echo {name}\n"))
        .with_priority(priority)
        .with_remote_path(format!("/tmp/{name}.sh"))
}

#[test]
fn groups_in_ascending_priority() {
    let nodes = vec![
        node_with_scripts("a", vec![script("a5", 5), script("a1", 1)]),
        node_with_scripts("b", vec![script("b1", 1), script("b10", 10)]),
        node_with_scripts("c", Vec::new()),
    ];
    let groups: Vec<(u32, Vec<&str>)> = priority_groups(&nodes)
        .into_iter()
        .map(|(p, g)| (p, g.into_iter().map(|(_, s)| s.name.as_str()).collect()))
        .collect();
    assert_eq!(
        groups,
        vec![(1, vec!["a1", "b1"]), (5, vec!["a5"]), (10, vec!["b10"])]
    );
}

#[test(tokio::test)]
async fn groups_run_in_order() {
    let gns3 = FakeGns3::start().await;
    let fake = FakeConsole::start().await.unwrap();
    let record = record_on_console(&gns3, &[("a", Some(fake.port())), ("b", Some(fake.port()))]);
    let nodes = vec![
        node_with_scripts("a", vec![script("a5", 5), script("a1", 1)]),
        node_with_scripts("b", vec![script("b1", 1), script("b10", 10)]),
    ];
    let pusher = fast_pusher();

    let summaries = ScriptScheduler::new(&pusher, LOCALHOST)
        .with_stage_delay(Duration::from_millis(10))
        .run(&nodes, &record)
        .await;

    let order: Vec<(&str, u32, bool)> = summaries
        .iter()
        .map(|s| (s.script_name.as_str(), s.priority, s.success))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a1", 1, true),
            ("b1", 1, true),
            ("a5", 5, true),
            ("b10", 10, true)
        ]
    );

    // the scripts were executed group by group
    let executed: Vec<String> = fake
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("sh /tmp/"))
        .collect();
    let position = |name: &str| {
        executed
            .iter()
            .position(|c| c.starts_with(&format!("sh /tmp/{name}.sh;")))
            .unwrap()
    };
    assert!(position("a1") < position("a5"));
    assert!(position("b1") < position("a5"));
    assert!(position("a5") < position("b10"));
}

#[test(tokio::test)]
async fn node_without_console() {
    let gns3 = FakeGns3::start().await;
    let fake = FakeConsole::start().await.unwrap();
    let names: Vec<String> = (0..10).map(|i| format!("node-{i}")).collect();
    let consoles: Vec<(&str, Option<u16>)> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), (i != 3).then(|| fake.port())))
        .collect();
    let record = record_on_console(&gns3, &consoles);
    let nodes: Vec<_> = names
        .iter()
        .map(|n| node_with_scripts(n, vec![script(&format!("{n}-setup"), 1)]))
        .collect();
    let pusher = fast_pusher();

    let summaries = ScriptScheduler::new(&pusher, LOCALHOST)
        .with_concurrency(4)
        .run(&nodes, &record)
        .await;

    assert_eq!(summaries.len(), 10);
    assert_eq!(summaries.iter().filter(|s| s.success).count(), 9);
    let failed: Vec<_> = summaries.iter().filter(|s| !s.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].node_name, "node-3");
    assert_eq!(
        failed[0].error.as_deref(),
        Some("Node 'node-3' does not expose a telnet console")
    );
}

#[test(tokio::test)]
async fn failing_scripts_are_reported() {
    let gns3 = FakeGns3::start().await;
    let fake = FakeConsole::start().await.unwrap();
    fake.exit_code("sh /tmp/broken.sh", 3);
    let record = record_on_console(&gns3, &[("a", Some(fake.port()))]);
    let nodes = vec![
        node_with_scripts("a", vec![script("broken", 1), script("fine", 2)]),
        node_with_scripts("ghost", vec![script("lost", 1)]),
    ];
    let pusher = fast_pusher();

    let summaries = ScriptScheduler::new(&pusher, LOCALHOST)
        .with_stage_delay(Duration::ZERO)
        .run(&nodes, &record)
        .await;

    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[0].script_name, "broken");
    assert_eq!(summaries[0].exit_code, Some(3));
    assert_eq!(summaries[0].error.as_deref(), Some("exit=3"));
    assert_eq!(summaries[1].script_name, "lost");
    assert_eq!(
        summaries[1].error.as_deref(),
        Some("Node 'ghost' not found in config")
    );
    assert!(summaries[2].success);
    assert_eq!(summaries[2].exit_code, Some(0));
}
