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

//! Turn a [`TopologyDefinition`] into nodes and links on the GNS3 server.
//!
//! The build happens in phases, each of which finishes before the next one starts:
//!
//! 1. Resolve the project (by id, or by name).
//! 2. Create all nodes from their templates, remembering the id of each node under its name and
//!    under a set of aliases (see [`alias_variants`]).
//! 3. Create all links. Link endpoints may refer to nodes by name, alias, or id.
//! 4. Start all nodes (if requested). A node that fails to start only produces a warning.
//! 5. Fetch the details of all nodes and links, and assemble the [`DeployedConfigRecord`].
//!
//! Structural problems (no project, no nodes, an unresolvable template or endpoint, a link
//! without exactly two endpoints) abort the build with a [`BuildError`].

use std::{collections::HashMap, time::Duration};

use gns3_lab::{
    rest_types::{Link, LinkEndpoint, Node, Template},
    ApiError, Gns3Client,
};
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::{
    record::DeployedConfigRecord,
    topology::{LinkSpec, NodeSpec, TopologyDefinition},
};

lazy_static! {
    /// Runs of characters that are replaced by `_` in aliases.
    static ref NON_ALNUM: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
}

/// Prefix of all node aliases.
const ALIAS_PREFIX: &str = "NODE_";

/// All aliases under which a node can be referenced in a link. The base alias is `NODE_` followed
/// by the node name in upper case, with every run of non-alphanumeric characters replaced by `_`.
/// In addition:
///
/// - names containing `OPENVSWITCH` can also be referenced with `OVS` instead,
/// - names containing `FIREWALL` can be referenced as `NODE_FIREWALL`,
/// - names starting with `IPTABLES_` can be referenced without that prefix.
pub fn alias_variants(name: &str) -> Vec<String> {
    let base = NON_ALNUM
        .replace_all(name, "_")
        .trim_matches('_')
        .to_uppercase();
    let mut variants = vec![format!("{ALIAS_PREFIX}{base}")];
    if base.contains("OPENVSWITCH") {
        variants.push(format!("{ALIAS_PREFIX}{}", base.replace("OPENVSWITCH", "OVS")));
    }
    if base.contains("FIREWALL") {
        variants.push(format!("{ALIAS_PREFIX}FIREWALL"));
    }
    if base.starts_with("IPTABLES_") {
        variants.push(format!("{ALIAS_PREFIX}{}", base.replace("IPTABLES_", "")));
    }
    variants.into_iter().unique().collect()
}

/// Lookup table from node names and aliases to node ids.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    /// Exact node names
    by_name: HashMap<String, String>,
    /// Aliases (upper case). The first node claiming an alias keeps it.
    by_alias: HashMap<String, String>,
}

impl NodeIndex {
    /// Register a node.
    pub fn insert(&mut self, name: &str, node_id: &str) {
        self.by_name.insert(name.to_string(), node_id.to_string());
        for alias in alias_variants(name) {
            self.by_alias
                .entry(alias)
                .or_insert_with(|| node_id.to_string());
        }
    }

    /// Resolve a link endpoint reference. Aliases are tried first, then exact names. Strings that
    /// look like a UUID (at least four `-`) are taken as node ids.
    pub fn resolve(&self, reference: &str) -> Result<String, BuildError> {
        let is_alias = reference.to_uppercase().starts_with(ALIAS_PREFIX);
        if is_alias {
            if let Some(id) = self.by_alias.get(&reference.to_uppercase()) {
                return Ok(id.clone());
            }
        }
        if let Some(id) = self.by_name.get(reference) {
            return Ok(id.clone());
        }
        if is_alias {
            return Err(BuildError::UnresolvedPlaceholder(reference.to_string()));
        }
        if reference.matches('-').count() >= 4 {
            return Ok(reference.to_string());
        }
        Err(BuildError::UnresolvedEndpoint(reference.to_string()))
    }
}

/// Output of [`TopologyBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Project id
    pub project_id: String,
    /// Project name, if known
    pub project_name: Option<String>,
    /// Nodes as returned when creating them
    pub nodes_created: Vec<Node>,
    /// Links as returned when creating them
    pub links_created: Vec<Link>,
    /// Snapshot of the deployed topology
    pub record: DeployedConfigRecord,
    /// Problems that did not abort the build
    pub warnings: Vec<String>,
}

/// Builds topologies on a GNS3 server.
#[derive(Debug, Clone)]
pub struct TopologyBuilder<'a> {
    /// REST client
    client: &'a Gns3Client,
    /// Pause after each request
    request_delay: Duration,
}

impl<'a> TopologyBuilder<'a> {
    /// Create a new builder.
    pub fn new(client: &'a Gns3Client) -> Self {
        Self {
            client,
            request_delay: Duration::ZERO,
        }
    }

    /// Pause for `delay` after each request that creates or queries a node or link.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Wait for the configured request delay.
    async fn throttle(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// Determine the project id (and name) of the definition.
    pub async fn resolve_project(
        &self,
        def: &TopologyDefinition,
    ) -> Result<(String, Option<String>), BuildError> {
        match (&def.project_id, &def.project_name) {
            (Some(id), name) => Ok((id.clone(), name.clone())),
            (None, Some(name)) => Ok((self.client.find_project_id(name).await?, Some(name.clone()))),
            (None, None) => Err(BuildError::MissingProject),
        }
    }

    /// Build the topology. See the [module documentation](self) for the individual phases.
    pub async fn build(
        &self,
        def: &TopologyDefinition,
        start_nodes: bool,
    ) -> Result<BuildResult, BuildError> {
        let (project_id, project_name) = self.resolve_project(def).await?;
        let project = project_name.as_deref().unwrap_or(&project_id).to_string();
        if def.nodes.is_empty() {
            return Err(BuildError::EmptyTopology);
        }

        // create all nodes
        let mut templates = TemplateResolver::new(self.client, &def.templates);
        let mut index = NodeIndex::default();
        let mut nodes_created = Vec::with_capacity(def.nodes.len());
        for spec in &def.nodes {
            let template_id = templates.resolve(spec).await?;
            let node = self
                .client
                .add_node_from_template(&project_id, &template_id, &spec.name, spec.x, spec.y)
                .await?;
            log::debug!("[{project}] created node {} ({})", node.name, node.node_id);
            index.insert(&node.name, &node.node_id);
            nodes_created.push(node);
            self.throttle().await;
        }

        // create all links
        let mut links_created = Vec::with_capacity(def.links.len());
        for (i, link) in def.links.iter().enumerate() {
            let (a, b) = resolve_link(&index, i, link)?;
            let link = self.client.create_link(&project_id, &a, &b).await?;
            log::debug!("[{project}] created link {}", link.link_id);
            links_created.push(link);
            self.throttle().await;
        }

        // start all nodes
        let mut warnings = Vec::new();
        if start_nodes {
            for node in &nodes_created {
                if let Err(e) = self.client.start_node(&project_id, &node.node_id).await {
                    log::warn!("[{project}] cannot start {}: {e}", node.name);
                    warnings.push(format!("Failed to start node {}: {e}", node.name));
                }
            }
        }

        // collect the details
        let mut nodes_detail = Vec::with_capacity(nodes_created.len());
        for node in &nodes_created {
            nodes_detail.push(self.client.get_node(&project_id, &node.node_id).await?);
            self.throttle().await;
        }
        let links_detail = match self.client.list_links(&project_id).await {
            Ok(links) => links,
            Err(e) => {
                log::warn!("[{project}] cannot list links: {e}");
                warnings.push(format!("Failed to fetch links detail: {e}"));
                Vec::new()
            }
        };

        log::info!(
            "[{project}] created {} nodes and {} links",
            nodes_created.len(),
            links_created.len()
        );

        let record = DeployedConfigRecord::from_details(
            &project_id,
            project_name.clone(),
            &nodes_detail,
            &links_detail,
        );

        Ok(BuildResult {
            project_id,
            project_name,
            nodes_created,
            links_created,
            record,
            warnings,
        })
    }
}

/// Resolve both endpoints of the `i`-th link.
fn resolve_link(
    index: &NodeIndex,
    i: usize,
    link: &LinkSpec,
) -> Result<(LinkEndpoint, LinkEndpoint), BuildError> {
    let [a, b] = link.nodes.as_slice() else {
        return Err(BuildError::MalformedLink(i));
    };
    Ok((
        LinkEndpoint::new(index.resolve(&a.name)?, a.adapter_number, a.port_number),
        LinkEndpoint::new(index.resolve(&b.name)?, b.adapter_number, b.port_number),
    ))
}

/// Resolves template references of nodes. The template catalog is fetched at most once.
#[derive(Debug)]
struct TemplateResolver<'a> {
    /// REST client
    client: &'a Gns3Client,
    /// Template map of the topology
    map: &'a HashMap<String, String>,
    /// Catalog of the server, once fetched
    catalog: Option<Vec<Template>>,
}

impl<'a> TemplateResolver<'a> {
    /// Create a new resolver.
    fn new(client: &'a Gns3Client, map: &'a HashMap<String, String>) -> Self {
        Self {
            client,
            map,
            catalog: None,
        }
    }

    /// Resolve the template of a node: the template id takes precedence over the template key,
    /// which takes precedence over the template name.
    async fn resolve(&mut self, spec: &NodeSpec) -> Result<String, BuildError> {
        if let Some(id) = &spec.template_id {
            return Ok(id.clone());
        }
        if let Some(id) = spec.template_key.as_ref().and_then(|k| self.map.get(k)) {
            return Ok(id.clone());
        }
        let Some(name) = &spec.template_name else {
            return Err(BuildError::MissingTemplate(spec.name.clone()));
        };
        if self.catalog.is_none() {
            self.catalog = Some(self.client.list_templates().await?);
        }
        self.catalog
            .iter()
            .flatten()
            .find(|t| &t.name == name)
            .map(|t| t.template_id.clone())
            .ok_or_else(|| BuildError::TemplateNotFound(name.clone()))
    }
}

/// Error that aborts a build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Neither a project id nor a project name is given.
    #[error("The topology must specify either project_id or project_name")]
    MissingProject,
    /// There are no nodes to create.
    #[error("The topology must include a non-empty 'nodes' array")]
    EmptyTopology,
    /// The node has no (resolvable) template reference.
    #[error("Node '{0}' requires template_id, a known template_key, or template_name")]
    MissingTemplate(String),
    /// No template with that name exists on the server.
    #[error("Template '{0}' not found on GNS3 server")]
    TemplateNotFound(String),
    /// A link does not have exactly two endpoints.
    #[error("Link #{0} must specify exactly two endpoints")]
    MalformedLink(usize),
    /// An alias does not match any created node.
    #[error("Unresolved link placeholder '{0}'")]
    UnresolvedPlaceholder(String),
    /// A link endpoint does not match any created node.
    #[error("Unresolved link endpoint '{0}'")]
    UnresolvedEndpoint(String),
    /// The GNS3 server returned an error.
    #[error("{0}")]
    Api(#[from] ApiError),
}
