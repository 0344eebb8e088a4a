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

use gns3_lab::{fake::FakeGns3, script::PushTimings, ConsoleSettings, ScriptPusher};

use crate::{
    collector::CollectorTimings,
    record::DeployedConfigRecord,
    topology::{EmbeddedScript, NodeSpec},
};

mod builder;
mod deploy;
mod scheduler;
mod store;

/// Address under which the fake consoles are reachable.
pub(crate) const LOCALHOST: &str = "127.0.0.1";

pub(crate) fn fast_settings() -> ConsoleSettings {
    ConsoleSettings {
        newline: String::from("\r"),
        connect_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(20),
        drain: Duration::from_millis(20),
    }
}

pub(crate) fn fast_pusher() -> ScriptPusher {
    ScriptPusher::new(fast_settings()).with_timings(PushTimings {
        exists_check: Duration::from_secs(1),
        heredoc_settle: Duration::from_millis(20),
        mkdir: Duration::from_secs(1),
        decode: Duration::from_secs(1),
        cleanup: Duration::from_secs(1),
        chmod: Duration::from_secs(1),
    })
}

pub(crate) fn fast_timings() -> CollectorTimings {
    CollectorTimings {
        boot: Duration::from_millis(10),
        console_settle: Duration::from_millis(10),
        banner: Duration::from_millis(200),
        command: Duration::from_millis(300),
        dhcp_request: Duration::from_millis(300),
        dhcp_wait: Duration::from_millis(10),
        syslog_settle: Duration::from_millis(10),
        harvest: Duration::from_millis(500),
        restart: Duration::from_millis(10),
    }
}

/// A node specification created from `template`.
pub(crate) fn node(name: &str, template: &str) -> NodeSpec {
    NodeSpec {
        name: name.to_string(),
        template_id: Some(template.to_string()),
        ..Default::default()
    }
}

/// A node specification with scripts, to be used with [`record_on_console`].
pub(crate) fn node_with_scripts(name: &str, scripts: Vec<EmbeddedScript>) -> NodeSpec {
    NodeSpec {
        name: name.to_string(),
        scripts,
        ..Default::default()
    }
}

/// A deployed record in which every node of `names` has its console on `console` (or no console
/// at all if `None`).
pub(crate) fn record_on_console(
    gns3: &FakeGns3,
    names: &[(&str, Option<u16>)],
) -> DeployedConfigRecord {
    let project = gns3.add_project("deployed");
    let nodes: Vec<_> = names
        .iter()
        .map(|(name, console)| gns3.add_node(&project, name, *console, 0, 0))
        .collect();
    DeployedConfigRecord::from_details(&project, Some(String::from("deployed")), &nodes, &[])
}
