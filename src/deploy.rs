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

//! Deploy a topology end to end: build it, store the resulting record, and run the embedded
//! scripts.

use std::time::Duration;

use gns3_lab::{Gns3Client, ScriptPusher};
use serde::{Deserialize, Serialize};

use crate::{
    builder::{BuildError, TopologyBuilder},
    scheduler::{ScriptExecutionSummary, ScriptScheduler, DEFAULT_CONCURRENCY, DEFAULT_STAGE_DELAY},
    store::ProjectStore,
    topology::TopologyDefinition,
};

/// Options of [`deploy`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOptions {
    /// Start the nodes after creating them
    pub start_nodes: bool,
    /// Run the embedded scripts. Requires `start_nodes`.
    pub run_scripts: bool,
    /// Pause after each REST request
    pub request_delay: Duration,
    /// Pause between starting the nodes and running the first script
    pub boot_delay: Duration,
    /// Pause between two priority groups
    pub stage_delay: Duration,
    /// Maximum number of concurrent scripts
    pub concurrency: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            start_nodes: true,
            run_scripts: true,
            request_delay: Duration::ZERO,
            boot_delay: Duration::from_secs(2),
            stage_delay: DEFAULT_STAGE_DELAY,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Outcome of [`deploy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    /// Project id
    pub project_id: String,
    /// Project name, if known
    pub project_name: Option<String>,
    /// Number of created nodes
    pub nodes_created: usize,
    /// Number of created links
    pub links_created: usize,
    /// Outcome of every embedded script
    pub scripts_executed: Vec<ScriptExecutionSummary>,
    /// No script failed and at least one node was created
    pub success: bool,
    /// Failed scripts, formatted as `node/script: error`
    pub errors: Vec<String>,
    /// Problems that did not affect the outcome
    pub warnings: Vec<String>,
}

/// Build the topology, store the deployed record, and run the embedded scripts (if the nodes
/// were started). Only structural problems of the build are returned as errors; failing scripts
/// are reported in the [`DeployReport`].
pub async fn deploy(
    client: &Gns3Client,
    pusher: &ScriptPusher,
    store: &dyn ProjectStore,
    def: &TopologyDefinition,
    server_host: &str,
    options: &DeployOptions,
) -> Result<DeployReport, BuildError> {
    let build = TopologyBuilder::new(client)
        .with_request_delay(options.request_delay)
        .build(def, options.start_nodes)
        .await?;
    let mut warnings = build.warnings;

    if let Err(e) = store.write(&build.record).await {
        log::warn!("[{}] cannot store the deployed topology: {e}", build.project_id);
        warnings.push(format!("Failed to store the deployed topology: {e}"));
    }

    let mut scripts_executed = Vec::new();
    if options.run_scripts && options.start_nodes && def.num_scripts() > 0 {
        log::info!(
            "[{}] waiting {:?} for the nodes to boot",
            build.project_id,
            options.boot_delay
        );
        tokio::time::sleep(options.boot_delay).await;
        scripts_executed = ScriptScheduler::new(pusher, server_host)
            .with_concurrency(options.concurrency)
            .with_stage_delay(options.stage_delay)
            .run(&def.nodes, &build.record)
            .await;
    }

    let errors: Vec<String> = scripts_executed
        .iter()
        .filter(|s| !s.success)
        .map(|s| {
            format!(
                "{}/{}: {}",
                s.node_name,
                s.script_name,
                s.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();
    let nodes_created = build.nodes_created.len();

    Ok(DeployReport {
        project_id: build.project_id,
        project_name: build.project_name,
        nodes_created,
        links_created: build.links_created.len(),
        scripts_executed,
        success: errors.is_empty() && nodes_created > 0,
        errors,
        warnings,
    })
}
