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

//! # Log collectors
//!
//! Every student gets two syslog collector nodes, one attached to the IT switch and one to the OT
//! switch. All other nodes of the project are instrumented such that every shell command is
//! forwarded to one of the collectors. Later, the captured commands are harvested from the
//! collectors over their telnet consoles.
//!
//! ```text
//! provision ──> discover address ──> verify syslog-ng ──> instrument nodes
//!                                                          ... student works ...
//!                                                          harvest ──> teardown
//! ```

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use gns3_lab::{
    parallel::bounded_join, ApiError, ConsoleError, ConsoleSettings, Gns3Client, HasConsole,
    LinkEndpoint, Node, NodeStatus, TelnetConsole,
};
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;

use crate::{config::CollectorSection, store::StoreError};

mod classify;
mod session;

pub use classify::{group_by_layer, KeywordClassifier, Layer, NodeClassifier, NodeSummary};
pub use session::{
    display_name_from_sanitized, sanitize_student_name, LogPreview, LoggingStatus, ProjectRef,
    SetupReport, StudentLogging, StudentSession, TeardownReport,
};

/// UDP port on which the collectors receive syslog messages.
pub const SYSLOG_PORT: u16 = 514;

/// Syslog tag of the forwarded commands.
pub const SYSLOG_TAG: &str = "Student-CMD";

/// Adapters of a switch that may be used for the collector uplink, in the order in which they are
/// tried. Adapter 0 is never used.
const UPLINK_ADAPTERS: std::ops::RangeInclusive<u32> = 1..=15;

lazy_static! {
    /// An IPv4 address
    static ref IPV4: Regex = Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b"
    )
    .unwrap();
}

/// A collector role: the name suffix of the node and the switch it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorRole {
    /// Suffix of the node name, e.g., `IT-Collector`.
    pub suffix: String,
    /// Name of the switch to which the collector is attached
    pub switch_name: String,
}

impl CollectorRole {
    /// Create a new role
    pub fn new(suffix: impl Into<String>, switch_name: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            switch_name: switch_name.into(),
        }
    }
}

/// What to deploy for each student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Name of the collector template
    pub template: String,
    /// Collectors deployed for each student
    pub roles: Vec<CollectorRole>,
    /// Maximum number of console sessions during instrumentation
    pub concurrency: usize,
    /// File on the collectors that holds the captured commands
    pub log_file: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::from(&CollectorSection::default())
    }
}

impl From<&CollectorSection> for CollectorConfig {
    fn from(section: &CollectorSection) -> Self {
        Self {
            template: section.template.clone(),
            roles: vec![
                CollectorRole::new("IT-Collector", &section.it_switch),
                CollectorRole::new("OT-Collector", &section.ot_switch),
            ],
            concurrency: section.concurrency,
            log_file: section.log_file.clone(),
        }
    }
}

/// Pauses and read windows of the console interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorTimings {
    /// Wait after starting a new collector
    pub boot: Duration,
    /// Wait after connecting to a console
    pub console_settle: Duration,
    /// Read window used to discard the banner of a console
    pub banner: Duration,
    /// Read window of short commands. Commands on the collectors always read for the whole
    /// window, a log line may end in `#` or `>` like a prompt.
    pub command: Duration,
    /// Read window of the DHCP request
    pub dhcp_request: Duration,
    /// Wait after the DHCP request
    pub dhcp_wait: Duration,
    /// Wait after starting syslog-ng
    pub syslog_settle: Duration,
    /// Read window when dumping the log file
    pub harvest: Duration,
    /// Wait after restarting a stopped collector before harvesting
    pub restart: Duration,
}

impl Default for CollectorTimings {
    fn default() -> Self {
        Self {
            boot: Duration::from_secs(3),
            console_settle: Duration::from_millis(500),
            banner: Duration::from_secs(1),
            command: Duration::from_secs(2),
            dhcp_request: Duration::from_secs(10),
            dhcp_wait: Duration::from_secs(2),
            syslog_settle: Duration::from_millis(1500),
            harvest: Duration::from_secs(5),
            restart: Duration::from_secs(2),
        }
    }
}

/// A deployed collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnitchNodeInfo {
    /// Node UUID
    pub node_id: String,
    /// Node name, e.g., `alice-IT-Collector`
    pub name: String,
    /// Address on which the collector receives syslog messages
    pub ip_address: String,
    /// Syslog port
    #[serde(default = "default_syslog_port")]
    pub port: u16,
    /// Switch to which the collector is attached
    pub connected_to_switch: String,
    /// Console port
    #[serde(default)]
    pub console_port: Option<u16>,
    /// Console host
    #[serde(default)]
    pub console_host: Option<String>,
}

/// Serde default of [`SnitchNodeInfo::port`].
fn default_syslog_port() -> u16 {
    SYSLOG_PORT
}

/// Outcome of provisioning the collectors of a student.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provisioning {
    /// Collectors that are ready
    pub snitch_nodes: Vec<SnitchNodeInfo>,
    /// Errors and warnings of all roles
    pub errors: Vec<String>,
    /// At least one collector existed already.
    pub any_reused: bool,
}

/// Outcome of instrumenting the nodes of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instrumentation {
    /// Nodes that forward their commands now
    pub injected: Vec<String>,
    /// Nodes that were not touched, with the reason in parenthesis
    pub skipped: Vec<String>,
    /// Nodes on which the instrumentation failed
    pub errors: Vec<String>,
}

/// Outcome of setting up the logging of a student.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogCollectorResult {
    /// Collectors that are ready
    pub snitch_nodes: Vec<SnitchNodeInfo>,
    /// Instrumented nodes
    pub injected_nodes: Vec<String>,
    /// Nodes that were not instrumented
    pub skipped_nodes: Vec<String>,
    /// Errors and warnings
    pub errors: Vec<String>,
    /// At least one collector existed already.
    pub reused_existing: bool,
}

/// Logs harvested from the collectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    /// Captured commands, keyed by `it`, `ot`, or the lowercased collector name.
    pub logs: BTreeMap<String, String>,
    /// Errors and warnings
    pub errors: Vec<String>,
}

/// Outcome of a single role.
type RoleOutcome = (Option<SnitchNodeInfo>, Vec<String>, bool);

/// Manages the collectors of a single project.
#[derive(Debug, Clone)]
pub struct LogCollector<'a> {
    /// GNS3 server
    client: &'a Gns3Client,
    /// Project in which the collectors live
    project_id: String,
    /// Address of the GNS3 server, used for wildcard console hosts
    server_host: String,
    /// What to deploy
    config: CollectorConfig,
    /// Pauses and read windows
    timings: CollectorTimings,
    /// Console settings
    console: ConsoleSettings,
    /// Name heuristics
    classifier: Arc<dyn NodeClassifier>,
}

impl<'a> LogCollector<'a> {
    /// Create a collector manager with default settings.
    pub fn new(
        client: &'a Gns3Client,
        project_id: impl Into<String>,
        server_host: impl Into<String>,
    ) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            server_host: server_host.into(),
            config: Default::default(),
            timings: Default::default(),
            console: Default::default(),
            classifier: Arc::new(KeywordClassifier),
        }
    }

    /// Use a different configuration.
    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use different timings.
    pub fn with_timings(mut self, timings: CollectorTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Use different console settings.
    pub fn with_console_settings(mut self, console: ConsoleSettings) -> Self {
        self.console = console;
        self
    }

    /// Use a different classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn NodeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set up the logging of a student: provision the collectors and instrument all nodes. If no
    /// collector could be provisioned, nothing is instrumented.
    pub async fn setup(&self, student: &str) -> Result<LogCollectorResult, CollectorError> {
        let provisioning = self.provision(student).await?;
        if provisioning.snitch_nodes.is_empty() {
            let errors = if provisioning.errors.is_empty() {
                vec![CollectorError::NoCollectors.to_string()]
            } else {
                provisioning.errors
            };
            return Ok(LogCollectorResult {
                errors,
                reused_existing: provisioning.any_reused,
                ..Default::default()
            });
        }

        let instrumentation = self.instrument(&provisioning.snitch_nodes).await?;
        let mut errors = provisioning.errors;
        errors.extend(instrumentation.errors);
        Ok(LogCollectorResult {
            snitch_nodes: provisioning.snitch_nodes,
            injected_nodes: instrumentation.injected,
            skipped_nodes: instrumentation.skipped,
            errors,
            reused_existing: provisioning.any_reused,
        })
    }

    /// Create (or reuse) and start the collectors of a student. The roles are provisioned
    /// concurrently, and a failure of one role does not affect the other. Only a missing
    /// collector template is fatal.
    pub async fn provision(&self, student: &str) -> Result<Provisioning, CollectorError> {
        let template_id = self.template_id().await?;
        let template_id = template_id.as_str();
        let outcomes = bounded_join(&self.config.roles, self.config.roles.len(), |role| {
            self.provision_role(student, role, template_id)
        })
        .await;

        let mut result = Provisioning::default();
        for (snitch, errors, reused) in outcomes {
            result.errors.extend(errors);
            result.any_reused |= reused;
            result.snitch_nodes.extend(snitch);
        }
        Ok(result)
    }

    /// Find the id of the collector template.
    async fn template_id(&self) -> Result<String, CollectorError> {
        self.client
            .list_templates()
            .await?
            .into_iter()
            .find(|t| t.name == self.config.template)
            .map(|t| t.template_id)
            .ok_or_else(|| CollectorError::TemplateNotFound(self.config.template.clone()))
    }

    /// Find a node of the project by name.
    async fn find_node(&self, name: &str) -> Result<Option<Node>, ApiError> {
        Ok(self
            .client
            .list_nodes(&self.project_id)
            .await?
            .into_iter()
            .find(|n| n.name == name))
    }

    /// Find a switch of the project by name.
    async fn find_switch(&self, name: &str) -> Result<Node, CollectorError> {
        self.find_node(name)
            .await?
            .ok_or_else(|| CollectorError::SwitchNotFound(name.to_string()))
    }

    /// Provision a single role. Errors are reported as strings.
    async fn provision_role(
        &self,
        student: &str,
        role: &CollectorRole,
        template_id: &str,
    ) -> RoleOutcome {
        let mut errors = Vec::new();
        let (node, reused) = match self.create_or_reuse(student, role, template_id).await {
            Ok(x) => x,
            Err(e) => {
                let msg = format!("Failed to setup {}: {e}", role.suffix);
                log::error!("[{student}] {msg}");
                errors.push(msg);
                return (None, errors, false);
            }
        };

        match self.start_collector(student, &node).await {
            Ok((Some(snitch), syslog_running)) => {
                if !syslog_running {
                    let msg = format!("Warning: syslog-ng may not be running on {}", role.suffix);
                    log::warn!("[{student}] {msg}");
                    errors.push(msg);
                }
                let snitch = SnitchNodeInfo {
                    connected_to_switch: role.switch_name.clone(),
                    ..snitch
                };
                (Some(snitch), errors, reused)
            }
            Ok((None, _)) => {
                let msg = format!(
                    "Failed to obtain IP for {} - ensure DHCP server is running or assign static IP",
                    role.suffix
                );
                log::error!("[{student}] {msg}");
                errors.push(msg);
                (None, errors, reused)
            }
            Err(e) => {
                let msg = format!("Failed to setup {}: {e}", role.suffix);
                log::error!("[{student}] {msg}");
                errors.push(msg);
                (None, errors, reused)
            }
        }
    }

    /// Reuse the collector node if it exists. Otherwise, create it next to its switch and link it
    /// to a free switch adapter. A failed link is only logged.
    async fn create_or_reuse(
        &self,
        student: &str,
        role: &CollectorRole,
        template_id: &str,
    ) -> Result<(Node, bool), CollectorError> {
        let name = format!("{student}-{}", role.suffix);
        if let Some(node) = self.find_node(&name).await? {
            log::info!("[{student}] reusing existing collector {name}");
            return Ok((node, true));
        }

        let switch = self.find_switch(&role.switch_name).await?;
        let node = self
            .client
            .add_node_from_template(
                &self.project_id,
                template_id,
                &name,
                switch.x + 150,
                switch.y + 100,
            )
            .await?;
        log::info!("[{student}] created collector {name}");

        if let Err(e) = self.connect_to_switch(&node, &switch).await {
            log::error!("[{student}] cannot connect {name} to {}: {e}", switch.name);
        }
        Ok((node, false))
    }

    /// Link adapter 0 of the collector to a free adapter of the switch.
    async fn connect_to_switch(&self, node: &Node, switch: &Node) -> Result<(), CollectorError> {
        let links = self.client.list_links(&self.project_id).await?;
        let used = links
            .iter()
            .flat_map(|l| l.nodes.iter())
            .filter(|e| e.node_id == switch.node_id)
            .map(|e| e.adapter_number)
            .collect_vec();
        let adapter = free_uplink_adapter(&used)
            .ok_or_else(|| CollectorError::NoFreeAdapter(switch.name.clone()))?;
        log::debug!("[{}] using adapter {adapter} of {}", node.name, switch.name);
        self.client
            .create_link(
                &self.project_id,
                &LinkEndpoint::new(&node.node_id, 0, 0),
                &LinkEndpoint::new(&switch.node_id, adapter, 0),
            )
            .await?;
        log::info!("[{}] connected to {}", node.name, switch.name);
        Ok(())
    }

    /// Refresh the node, start it, wait for it to boot, and discover its address. Returns `None`
    /// if no address could be found, and whether syslog-ng is confirmed to run.
    async fn start_collector(
        &self,
        student: &str,
        node: &Node,
    ) -> Result<(Option<SnitchNodeInfo>, bool), CollectorError> {
        let node = self.client.get_node(&self.project_id, &node.node_id).await?;
        self.client.start_node(&self.project_id, &node.node_id).await?;
        log::debug!("[{student}] started {}, waiting for it to boot", node.name);
        sleep(self.timings.boot).await;

        let Some(ip_address) = self.discover_address(&node).await else {
            return Ok((None, false));
        };
        let syslog_running = self.ensure_syslog(&node).await;

        let console_host = node
            .console_host
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| self.server_host.clone());
        let snitch = SnitchNodeInfo {
            node_id: node.node_id.clone(),
            name: node.name.clone(),
            ip_address,
            port: SYSLOG_PORT,
            connected_to_switch: String::new(),
            console_port: node.console,
            console_host: Some(console_host),
        };
        Ok((Some(snitch), syslog_running))
    }

    /// Open the console of a node and discard the banner.
    async fn open_console(&self, node: &Node) -> Result<TelnetConsole, CollectorError> {
        let target = node
            .console_target(&self.server_host)
            .ok_or_else(|| CollectorError::NoConsole(node.name.clone()))?;
        let mut console = TelnetConsole::connect(&target, self.console.clone()).await?;
        sleep(self.timings.console_settle).await;
        console.read(self.timings.banner).await?;
        Ok(console)
    }

    /// Find the address of the collector. If none is assigned yet, request one over DHCP, once.
    async fn discover_address(&self, node: &Node) -> Option<String> {
        match self.try_discover_address(node).await {
            Ok(ip) => ip,
            Err(e) => {
                log::error!("[{}] cannot get the address: {e}", node.name);
                None
            }
        }
    }

    /// Implementation of [`LogCollector::discover_address`].
    async fn try_discover_address(&self, node: &Node) -> Result<Option<String>, CollectorError> {
        let mut console = self.open_console(node).await?;
        let t = self.timings;

        let output = console.run_command("hostname -I", t.command, false).await?;
        if let Some(ip) = parse_ipv4(&output) {
            log::info!("[{}] found address {ip}", node.name);
            console.close().await;
            return Ok(Some(ip));
        }

        log::info!("[{}] no address found, requesting one over DHCP", node.name);
        console.run_command("dhclient -v -1", t.dhcp_request, false).await?;
        sleep(t.dhcp_wait).await;
        let output = console.run_command("hostname -I", t.command, false).await?;
        console.close().await;
        let ip = parse_ipv4(&output);
        match &ip {
            Some(ip) => log::info!("[{}] obtained address {ip} over DHCP", node.name),
            None => log::error!("[{}] no DHCP server or static address", node.name),
        }
        Ok(ip)
    }

    /// Start syslog-ng (which is idempotent) and check that it runs. Retries once. Returns
    /// `false` if syslog-ng could not be confirmed to run.
    async fn ensure_syslog(&self, node: &Node) -> bool {
        match self.try_ensure_syslog(node).await {
            Ok(running) => running,
            Err(e) => {
                log::error!("[{}] cannot check syslog-ng: {e}", node.name);
                false
            }
        }
    }

    /// Implementation of [`LogCollector::ensure_syslog`].
    async fn try_ensure_syslog(&self, node: &Node) -> Result<bool, CollectorError> {
        let mut console = self.open_console(node).await?;
        let t = self.timings;
        for attempt in 1..=2 {
            console.run_command("syslog-ng", t.command, false).await?;
            sleep(t.syslog_settle).await;
            let output = console.run_command("pgrep syslog-ng", t.command, false).await?;
            if output.chars().any(|c| c.is_ascii_digit()) {
                log::debug!("[{}] syslog-ng is running (attempt {attempt})", node.name);
                console.close().await;
                return Ok(true);
            }
            log::warn!("[{}] syslog-ng is not running (attempt {attempt})", node.name);
        }
        console.close().await;
        Ok(false)
    }

    /// Make every eligible node of the project forward its shell commands to a collector. Nodes
    /// without telnet console and infrastructure nodes are skipped.
    pub async fn instrument(
        &self,
        snitches: &[SnitchNodeInfo],
    ) -> Result<Instrumentation, CollectorError> {
        let nodes = self.client.list_nodes(&self.project_id).await?;
        let mut result = Instrumentation::default();
        let mut eligible = Vec::new();
        for node in nodes {
            let console_type = node.console_type.as_deref().unwrap_or_default();
            if console_type != "telnet" {
                result
                    .skipped
                    .push(format!("{} (console_type={console_type})", node.name));
            } else if self.classifier.is_infrastructure(&node.name) {
                result
                    .skipped
                    .push(format!("{} (infrastructure node)", node.name));
            } else {
                eligible.push(node);
            }
        }

        let outcomes = bounded_join(&eligible, self.config.concurrency, |node| {
            self.instrument_node(node, snitches)
        })
        .await;
        for (node, outcome) in eligible.iter().zip(outcomes) {
            match outcome {
                Ok(()) => result.injected.push(node.name.clone()),
                Err(CollectorError::NoConsole(name)) => {
                    result.skipped.push(format!("{name} (no console)"))
                }
                Err(e) => {
                    let msg = format!("Failed to inject into {}: {e}", node.name);
                    log::error!("[{}] {msg}", self.project_id);
                    result.errors.push(msg);
                }
            }
        }
        Ok(result)
    }

    /// Install the history hook on a single node, for the running shell and in `~/.bashrc`.
    async fn instrument_node(
        &self,
        node: &Node,
        snitches: &[SnitchNodeInfo],
    ) -> Result<(), CollectorError> {
        let collector = self
            .classifier
            .collector_for(&node.name, snitches)
            .ok_or(CollectorError::NoCollectors)?;
        let hook = prompt_command(&collector.ip_address);
        let mut console = self.open_console(node).await?;
        console.run_command(&hook, self.timings.command, false).await?;
        console
            .run_command(
                &format!("echo \"{hook}\" >> ~/.bashrc"),
                self.timings.command,
                false,
            )
            .await?;
        console.close().await;
        log::info!("[{}] forwarding commands to {}", node.name, collector.ip_address);
        Ok(())
    }

    /// Dump the captured commands of all collectors, concurrently.
    pub async fn harvest(&self, snitches: &[SnitchNodeInfo]) -> Harvest {
        let outcomes = bounded_join(snitches, snitches.len(), |snitch| async move {
            (snitch, self.harvest_one(snitch).await)
        })
        .await;

        let mut result = Harvest::default();
        for (snitch, outcome) in outcomes {
            let key = self.classifier.collector_key(&snitch.name);
            let content = match outcome {
                Ok(content) if content.trim().is_empty() => {
                    let msg = format!(
                        "{}: Log file is empty - commands may not be reaching the collector",
                        snitch.name
                    );
                    log::warn!("[{}] {msg}", self.project_id);
                    result.errors.push(msg);
                    String::new()
                }
                Ok(content) => content,
                Err(e) => {
                    let msg = format!("Failed to retrieve logs from {}: {e}", snitch.name);
                    log::error!("[{}] {msg}", self.project_id);
                    result.errors.push(msg);
                    String::new()
                }
            };
            result.logs.insert(key, content);
        }
        result
    }

    /// Dump the captured commands of a single collector. A stopped collector is started first.
    async fn harvest_one(&self, snitch: &SnitchNodeInfo) -> Result<String, CollectorError> {
        let mut node = self
            .client
            .get_node(&self.project_id, &snitch.node_id)
            .await?;
        if node.status != NodeStatus::Started {
            log::info!("[{}] starting collector (was {})", snitch.name, node.status);
            self.client
                .start_node(&self.project_id, &snitch.node_id)
                .await?;
            sleep(self.timings.restart).await;
            node = self
                .client
                .get_node(&self.project_id, &snitch.node_id)
                .await?;
        }
        if node.console_target(&self.server_host).is_none() {
            return Err(CollectorError::NoConsole(snitch.name.clone()));
        }

        self.ensure_syslog(&node).await;

        let mut console = self.open_console(&node).await?;
        let output = console
            .run_command(
                &format!("cat {}", self.config.log_file),
                self.timings.harvest,
                false,
            )
            .await?;
        console.close().await;
        Ok(clean_log(&output))
    }

    /// Delete all collectors of a student. Returns the names of the deleted nodes. Failures to
    /// delete a node are logged and skipped.
    pub async fn teardown(&self, student: &str) -> Result<Vec<String>, CollectorError> {
        let prefix = format!("{student}-");
        let mut deleted = Vec::new();
        for node in self.client.list_nodes(&self.project_id).await? {
            if !(node.name.starts_with(&prefix) && node.name.contains("Collector")) {
                continue;
            }
            match self
                .client
                .delete_node(&self.project_id, &node.node_id)
                .await
            {
                Ok(()) => {
                    log::info!("[{student}] deleted collector {}", node.name);
                    deleted.push(node.name);
                }
                Err(e) => log::error!("[{student}] cannot delete {}: {e}", node.name),
            }
        }
        Ok(deleted)
    }
}

/// The first adapter in 15 down to 1 that is not in `used`.
pub fn free_uplink_adapter(used: &[u32]) -> Option<u32> {
    UPLINK_ADAPTERS.rev().find(|a| !used.contains(a))
}

/// The first IPv4 address in `output` that is neither a loopback nor a link-local address.
pub fn parse_ipv4(output: &str) -> Option<String> {
    IPV4.find_iter(output)
        .map(|m| m.as_str())
        .find(|ip| !ip.starts_with("127.") && !ip.starts_with("169.254."))
        .map(String::from)
}

/// The shell hook that appends every command to the history and forwards it to `collector_ip`.
pub fn prompt_command(collector_ip: &str) -> String {
    format!(
        "export PROMPT_COMMAND='history -a >(tee -a ~/.bash_history | logger -n {collector_ip} -P {SYSLOG_PORT} -t \"{SYSLOG_TAG}\")'"
    )
}

/// Remove the echoed command and prompts from the output of `cat`.
fn clean_log(output: &str) -> String {
    output
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| {
            let line = line.trim();
            !(line.starts_with("cat ") || line.starts_with('#') || line.starts_with("/ #"))
        })
        .join("\n")
        .trim()
        .to_string()
}

/// Error of the log collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The collector template does not exist.
    #[error("Template '{0}' not found on GNS3 server")]
    TemplateNotFound(String),
    /// The switch of a collector does not exist.
    #[error("Switch '{0}' not found in project")]
    SwitchNotFound(String),
    /// All uplink adapters of a switch are in use.
    #[error("No available ports on node '{0}' (adapters 1-15 all in use)")]
    NoFreeAdapter(String),
    /// The node has no telnet console.
    #[error("No console available for {0}")]
    NoConsole(String),
    /// No collector is deployed.
    #[error("No collectors could be deployed. Ensure DHCP server is running or assign static IPs.")]
    NoCollectors,
    /// The project id does not exist.
    #[error("Project with ID '{0}' not found")]
    ProjectNotFound(String),
    /// The student name is empty after sanitization.
    #[error("Student name cannot be empty or contain only special characters")]
    InvalidStudentName,
    /// The student already has a session for a different project.
    #[error("Student '{student}' already has an active session for project '{project}'. Teardown first or use the same project.")]
    SessionConflict {
        /// Display name of the student
        student: String,
        /// Project of the existing session
        project: String,
    },
    /// The student has no session.
    #[error("No active logging session for student '{0}'")]
    NoSession(String),
    /// The session of the student has no collectors.
    #[error("No syslog collectors found for this student")]
    NoSessionCollectors,
    /// Error of the GNS3 API
    #[error("{0}")]
    Api(#[from] ApiError),
    /// Error of a console session
    #[error("{0}")]
    Console(#[from] ConsoleError),
    /// Error of the session store
    #[error("{0}")]
    Store(#[from] StoreError),
}
