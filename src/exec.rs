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

//! Ad-hoc script execution: push stored scripts to nodes of the deployed topology, run scripts
//! that are already on the nodes, and upload-and-run one script on a list of project nodes.

use std::time::Duration;

use gns3_lab::{
    parallel::bounded_join,
    script::{ScriptExecutionResult, ScriptPushResult, ScriptTask},
    ApiError, ConsoleTarget, Gns3Client, HasConsole, ScriptPusher, ScriptSpec,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    record::DeployedConfigRecord,
    store::{ScriptRepository, StoreError},
};

/// Default timeout of scripts, in seconds.
fn default_timeout() -> f64 {
    10.0
}

/// Default shell.
fn default_shell() -> String {
    String::from("sh")
}

/// Helper for serde defaults.
fn default_true() -> bool {
    true
}

/// Push a stored script to a node of the deployed topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushItem {
    /// Node name in the deployed topology
    pub node_name: String,
    /// Id of the stored script
    pub script_id: String,
    /// Destination on the node
    pub remote_path: String,
    /// Run the script after uploading it
    #[serde(default)]
    pub run_after_upload: bool,
    /// `chmod +x` the script
    #[serde(default = "default_true")]
    pub executable: bool,
    /// Replace an existing file
    #[serde(default = "default_true")]
    pub overwrite: bool,
    /// Execution timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Interpreter
    #[serde(default = "default_shell")]
    pub shell: String,
}

/// Run a script that is already on a node of the deployed topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunItem {
    /// Node name in the deployed topology
    pub node_name: String,
    /// Path of the script on the node
    pub remote_path: String,
    /// Execution timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Interpreter
    #[serde(default = "default_shell")]
    pub shell: String,
}

/// Convert seconds into a duration, treating invalid values as zero.
fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or_default()
}

/// Find the console of a node in the deployed topology.
fn record_target(
    record: &DeployedConfigRecord,
    node_name: &str,
    server_host: &str,
) -> Result<ConsoleTarget, ExecError> {
    record
        .node(node_name)
        .ok_or_else(|| ExecError::NodeNotInRecord(node_name.to_string()))?
        .console_target(server_host)
        .ok_or_else(|| ExecError::NoConsole(node_name.to_string()))
}

/// Push stored scripts to nodes of the deployed topology. All nodes, consoles, and scripts are
/// resolved before the first upload starts; a failure to resolve any of them aborts the whole
/// request. Failures during the uploads are reported in the results.
pub async fn push_stored_scripts(
    record: &DeployedConfigRecord,
    scripts: &dyn ScriptRepository,
    pusher: &ScriptPusher,
    server_host: &str,
    items: &[PushItem],
    concurrency: usize,
) -> Result<Vec<ScriptPushResult>, ExecError> {
    let mut tasks = Vec::with_capacity(items.len());
    for item in items {
        let target = record_target(record, &item.node_name, server_host)?;
        let content = scripts.content(&item.script_id).await?;
        let mut spec = ScriptSpec::inline(&item.remote_path, content).shell(&item.shell);
        spec.executable = item.executable;
        spec.overwrite = item.overwrite;
        if item.run_after_upload {
            spec = spec.run_after_upload(secs(item.timeout));
        }
        tasks.push(ScriptTask {
            node_name: item.node_name.clone(),
            target,
            spec,
        });
    }
    Ok(pusher.push_many(&tasks, concurrency).await)
}

/// Run scripts that were uploaded before. Nodes and consoles are resolved before the first script
/// runs.
pub async fn run_uploaded_scripts(
    record: &DeployedConfigRecord,
    pusher: &ScriptPusher,
    server_host: &str,
    items: &[RunItem],
    concurrency: usize,
) -> Result<Vec<ScriptExecutionResult>, ExecError> {
    let targets = items
        .iter()
        .map(|item| record_target(record, &item.node_name, server_host))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bounded_join(items.iter().zip(targets), concurrency, |(item, target)| async move {
        pusher
            .run(
                &item.node_name,
                &target,
                &item.remote_path,
                &item.shell,
                secs(item.timeout),
            )
            .await
    })
    .await)
}

/// Outcome of running a script on one node with [`execute_on_nodes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    /// Node name
    pub node_name: String,
    /// Upload and execution succeeded
    pub success: bool,
    /// Output of the script
    pub output: String,
    /// What went wrong
    pub error: Option<String>,
    /// Exit code of the script
    pub exit_code: Option<i32>,
}

/// Outcome of [`execute_on_nodes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Number of targeted nodes
    pub total: usize,
    /// Number of nodes on which the script succeeded
    pub successful: usize,
    /// Number of nodes on which the script failed
    pub failed: usize,
    /// One result per node, in the order of the request
    pub results: Vec<NodeExecutionResult>,
}

/// Upload `spec` to every node in `node_names` (nodes of the live project, not of the deployed
/// record) and run it. Node names that do not exist in the project abort the request. A node
/// without a telnet console, or a node on which the script fails, does not affect the others.
pub async fn execute_on_nodes(
    client: &Gns3Client,
    pusher: &ScriptPusher,
    project_id: &str,
    server_host: &str,
    node_names: &[String],
    spec: &ScriptSpec,
    concurrency: usize,
) -> Result<ExecutionReport, ExecError> {
    let nodes = client.list_nodes(project_id).await?;
    let missing = node_names
        .iter()
        .filter(|name| !nodes.iter().any(|n| &&n.name == name))
        .cloned()
        .collect_vec();
    if !missing.is_empty() {
        return Err(ExecError::UnknownNodes(missing));
    }

    let nodes = &nodes;
    let results = bounded_join(node_names, concurrency, |name| async move {
        let node = nodes.iter().find(|n| &n.name == name);
        let Some(target) = node.and_then(|n| n.console_target(server_host)) else {
            return NodeExecutionResult {
                node_name: name.clone(),
                success: false,
                output: String::new(),
                error: Some(format!("Node '{name}' does not expose a telnet console")),
                exit_code: None,
            };
        };
        let result = pusher.push(name, &target, spec).await;
        NodeExecutionResult {
            node_name: name.clone(),
            success: result.success(),
            output: result
                .execution
                .as_ref()
                .map(|e| e.output.clone())
                .unwrap_or_else(|| result.upload.output.clone()),
            error: if result.success() { None } else { result.error() },
            exit_code: result.execution.as_ref().and_then(|e| e.exit_code),
        }
    })
    .await;

    let successful = results.iter().filter(|r| r.success).count();
    log::info!(
        "[{project_id}] script succeeded on {successful} of {} nodes",
        results.len()
    );
    Ok(ExecutionReport {
        total: results.len(),
        successful,
        failed: results.len() - successful,
        results,
    })
}

/// Error that aborts an execution request before any script runs.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Nodes are missing in the project.
    #[error("Nodes not found in project: {}", .0.join(", "))]
    UnknownNodes(Vec<String>),
    /// The node is not part of the deployed topology.
    #[error("Node '{0}' not found in config")]
    NodeNotInRecord(String),
    /// The node has no telnet console.
    #[error("Node '{0}' does not expose a telnet console")]
    NoConsole(String),
    /// A store failed.
    #[error("{0}")]
    Store(#[from] StoreError),
    /// The GNS3 server returned an error.
    #[error("{0}")]
    Api(#[from] ApiError),
}
