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

//! Priority-staged execution of the scripts embedded in a topology.
//!
//! All scripts of all nodes are pooled and grouped by priority. Groups run one after the other,
//! in ascending order of priority, with a pause in between. Within a group, scripts run
//! concurrently (bounded by the concurrency limit). This allows, for instance, to set up servers
//! (priority 1) before the clients that connect to them (priority 10).

use std::time::Duration;

use gns3_lab::{parallel::bounded_join, HasConsole, ScriptPusher, ScriptSpec};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    record::DeployedConfigRecord,
    topology::{EmbeddedScript, NodeSpec},
};

/// Default number of scripts that run at the same time.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default pause between two priority groups.
pub const DEFAULT_STAGE_DELAY: Duration = Duration::from_millis(500);

/// Outcome of a single embedded script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptExecutionSummary {
    /// Node on which the script ran
    pub node_name: String,
    /// Name of the script
    pub script_name: String,
    /// Priority of the script
    pub priority: u32,
    /// Destination on the node
    pub remote_path: String,
    /// The script was uploaded and (if requested) executed successfully.
    pub success: bool,
    /// Exit code of the execution, if the script was executed
    pub exit_code: Option<i32>,
    /// What went wrong
    pub error: Option<String>,
}

/// A group of scripts with equal priority.
pub type PriorityGroup<'a> = (u32, Vec<(&'a NodeSpec, &'a EmbeddedScript)>);

/// Pool all scripts of all nodes, and group them by priority in ascending order. Within a group,
/// scripts keep the order of the nodes and of the scripts within each node.
pub fn priority_groups(nodes: &[NodeSpec]) -> Vec<PriorityGroup<'_>> {
    let pool = nodes
        .iter()
        .flat_map(|n| n.scripts.iter().map(move |s| (n, s)))
        .sorted_by_key(|(_, s)| s.priority);
    let mut groups: Vec<PriorityGroup<'_>> = Vec::new();
    for (node, script) in pool {
        match groups.last_mut() {
            Some((priority, group)) if *priority == script.priority => group.push((node, script)),
            _ => groups.push((script.priority, vec![(node, script)])),
        }
    }
    groups
}

/// Executes embedded scripts on a deployed topology.
#[derive(Debug, Clone)]
pub struct ScriptScheduler<'a> {
    /// Pusher used for each script
    pusher: &'a ScriptPusher,
    /// Address that replaces wildcard console hosts
    server_host: String,
    /// Maximum number of concurrent scripts
    concurrency: usize,
    /// Pause between two priority groups
    stage_delay: Duration,
}

impl<'a> ScriptScheduler<'a> {
    /// Create a new scheduler with the default concurrency and stage delay.
    pub fn new(pusher: &'a ScriptPusher, server_host: impl Into<String>) -> Self {
        Self {
            pusher,
            server_host: server_host.into(),
            concurrency: DEFAULT_CONCURRENCY,
            stage_delay: DEFAULT_STAGE_DELAY,
        }
    }

    /// Set the maximum number of concurrent scripts.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the pause between two priority groups.
    pub fn with_stage_delay(mut self, stage_delay: Duration) -> Self {
        self.stage_delay = stage_delay;
        self
    }

    /// Run all scripts of `nodes`, group by group. Every script produces exactly one summary; a
    /// failing script does not stop the others.
    pub async fn run(
        &self,
        nodes: &[NodeSpec],
        record: &DeployedConfigRecord,
    ) -> Vec<ScriptExecutionSummary> {
        let mut summaries = Vec::new();
        for (i, (priority, group)) in priority_groups(nodes).into_iter().enumerate() {
            if i > 0 && !self.stage_delay.is_zero() {
                tokio::time::sleep(self.stage_delay).await;
            }
            log::info!(
                "[{}] running {} scripts with priority {priority}",
                record.project_id,
                group.len()
            );
            let results = bounded_join(group, self.concurrency, |(node, script)| {
                self.run_one(node, script, record)
            })
            .await;
            summaries.extend(results);
        }
        let failed = summaries.iter().filter(|s| !s.success).count();
        if failed > 0 {
            log::warn!(
                "[{}] {failed} of {} scripts failed",
                record.project_id,
                summaries.len()
            );
        }
        summaries
    }

    /// Upload and run a single script.
    async fn run_one(
        &self,
        node: &NodeSpec,
        script: &EmbeddedScript,
        record: &DeployedConfigRecord,
    ) -> ScriptExecutionSummary {
        let summary = |success, exit_code, error| ScriptExecutionSummary {
            node_name: node.name.clone(),
            script_name: script.name.clone(),
            priority: script.priority,
            remote_path: script.remote_path.clone(),
            success,
            exit_code,
            error,
        };

        let Some(deployed) = record.node(&node.name) else {
            log::error!("[{}] not found in the deployed topology", node.name);
            return summary(
                false,
                None,
                Some(format!("Node '{}' not found in config", node.name)),
            );
        };
        let Some(target) = deployed.console_target(&self.server_host) else {
            log::error!("[{}] has no telnet console", node.name);
            return summary(
                false,
                None,
                Some(format!(
                    "Node '{}' does not expose a telnet console",
                    node.name
                )),
            );
        };

        let mut spec = ScriptSpec::inline(&script.remote_path, &script.content).shell(&script.shell);
        if script.run_after_upload {
            spec = spec.run_after_upload(script.timeout());
        }
        let result = self.pusher.push(&node.name, &target, &spec).await;
        summary(
            result.success(),
            result.execution.as_ref().and_then(|e| e.exit_code),
            if result.success() { None } else { result.error() },
        )
    }
}
