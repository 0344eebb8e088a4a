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

//! Client for the GNS3 REST API (version 2).

use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::rest_types::{Link, LinkEndpoint, Node, Project, Template};

/// Maximum number of characters of a raw error body that is kept in an [`ApiError`].
const MAX_DETAIL_LEN: usize = 500;

/// Client to a single GNS3 server.
///
/// The client is cheap to clone; all clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct Gns3Client {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl Gns3Client {
    /// Create a new client talking to `base_url` (for instance `http://192.168.56.101:80`).
    /// Requests use HTTP basic authentication if `credentials` are given.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Network {
                context: String::from("building the HTTP client"),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// The base URL of the server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    /// Send the request and return the body of a successful response.
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<String, ApiError> {
        let context = format!("{method} {path}");
        log::trace!("[{}] {}", self.base_url, context);
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder.send().await.map_err(|source| ApiError::Network {
            context: context.clone(),
            source,
        })?;
        extract(response, context).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let context = format!("{method} {path}");
        let text = self.send(method, path, body).await?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            context,
            source,
            body: truncate(&text),
        })
    }

    /// List all projects on the server.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.send_json(Method::GET, "/v2/projects", None).await
    }

    /// Find the id of the project called `name`.
    pub async fn find_project_id(&self, name: &str) -> Result<String, ApiError> {
        self.list_projects()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.project_id)
            .ok_or_else(|| ApiError::ProjectNotFound(name.to_string()))
    }

    /// Get the project with the given id, or `None` if no such project exists.
    pub async fn project_by_id(&self, project_id: &str) -> Result<Option<Project>, ApiError> {
        Ok(self
            .list_projects()
            .await?
            .into_iter()
            .find(|p| p.project_id == project_id))
    }

    /// List the template catalog.
    pub async fn list_templates(&self) -> Result<Vec<Template>, ApiError> {
        self.send_json(Method::GET, "/v2/templates", None).await
    }

    /// Instantiate a template as a new node at position `(x, y)`.
    pub async fn add_node_from_template(
        &self,
        project_id: &str,
        template_id: &str,
        name: &str,
        x: i64,
        y: i64,
    ) -> Result<Node, ApiError> {
        let path = format!("/v2/projects/{project_id}/templates/{template_id}");
        let body = json!({ "x": x, "y": y, "name": name });
        self.send_json(Method::POST, &path, Some(body)).await
    }

    /// Get the current state of a node.
    pub async fn get_node(&self, project_id: &str, node_id: &str) -> Result<Node, ApiError> {
        let path = format!("/v2/projects/{project_id}/nodes/{node_id}");
        self.send_json(Method::GET, &path, None).await
    }

    /// List all nodes of a project.
    pub async fn list_nodes(&self, project_id: &str) -> Result<Vec<Node>, ApiError> {
        let path = format!("/v2/projects/{project_id}/nodes");
        self.send_json(Method::GET, &path, None).await
    }

    /// Start a node.
    pub async fn start_node(&self, project_id: &str, node_id: &str) -> Result<(), ApiError> {
        let path = format!("/v2/projects/{project_id}/nodes/{node_id}/start");
        self.send(Method::POST, &path, Some(json!({}))).await.map(|_| ())
    }

    /// Stop all nodes of a project.
    pub async fn stop_all_nodes(&self, project_id: &str) -> Result<(), ApiError> {
        let path = format!("/v2/projects/{project_id}/nodes/stop");
        self.send(Method::POST, &path, Some(json!({}))).await.map(|_| ())
    }

    /// Delete a node (and all links attached to it).
    pub async fn delete_node(&self, project_id: &str, node_id: &str) -> Result<(), ApiError> {
        let path = format!("/v2/projects/{project_id}/nodes/{node_id}");
        self.send(Method::DELETE, &path, None).await.map(|_| ())
    }

    /// Connect two node ports with a link.
    pub async fn create_link(
        &self,
        project_id: &str,
        a: &LinkEndpoint,
        b: &LinkEndpoint,
    ) -> Result<Link, ApiError> {
        let path = format!("/v2/projects/{project_id}/links");
        self.send_json(Method::POST, &path, Some(json!({ "nodes": [a, b] })))
            .await
    }

    /// List all links of a project.
    pub async fn list_links(&self, project_id: &str) -> Result<Vec<Link>, ApiError> {
        let path = format!("/v2/projects/{project_id}/links");
        self.send_json(Method::GET, &path, None).await
    }

    /// Delete a link.
    pub async fn delete_link(&self, project_id: &str, link_id: &str) -> Result<(), ApiError> {
        let path = format!("/v2/projects/{project_id}/links/{link_id}");
        self.send(Method::DELETE, &path, None).await.map(|_| ())
    }

    /// Remove everything from a project. All nodes are stopped first, then every link and
    /// afterwards every node is deleted. Failures do not stop the cleanup; they are collected in
    /// [`DeleteReport::errors`]. Nothing is rolled back.
    pub async fn delete_all_nodes(&self, project_id: &str) -> DeleteReport {
        let mut report = DeleteReport::default();

        if let Err(e) = self.stop_all_nodes(project_id).await {
            log::warn!("[{}] Cannot stop nodes of {project_id}: {e}", self.base_url);
            report.errors.push(format!("Failed to stop nodes: {e}"));
        }

        match self.list_links(project_id).await {
            Ok(links) => {
                for link in links {
                    match self.delete_link(project_id, &link.link_id).await {
                        Ok(()) => report.links_deleted += 1,
                        Err(e) => report
                            .errors
                            .push(format!("Failed to delete link {}: {e}", link.link_id)),
                    }
                }
            }
            Err(e) => report.errors.push(format!("Failed to list links: {e}")),
        }

        match self.list_nodes(project_id).await {
            Ok(nodes) => {
                for node in nodes {
                    match self.delete_node(project_id, &node.node_id).await {
                        Ok(()) => report.nodes_deleted += 1,
                        Err(e) => report
                            .errors
                            .push(format!("Failed to delete node {}: {e}", node.name)),
                    }
                }
            }
            Err(e) => report.errors.push(format!("Failed to list nodes: {e}")),
        }

        log::info!(
            "[{}] Deleted {} nodes and {} links from {project_id} ({} errors)",
            self.base_url,
            report.nodes_deleted,
            report.links_deleted,
            report.errors.len()
        );

        report
    }
}

/// Result of [`Gns3Client::delete_all_nodes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// Number of deleted nodes
    pub nodes_deleted: usize,
    /// Number of deleted links
    pub links_deleted: usize,
    /// Everything that went wrong along the way
    pub errors: Vec<String>,
}

/// Turn the response into its body, or into an [`ApiError::Status`] if it is not successful.
async fn extract(response: Response, context: String) -> Result<String, ApiError> {
    let status = response.status();
    let url = response.url().to_string();
    let text = response.text().await.map_err(|source| ApiError::Network {
        context: context.clone(),
        source,
    })?;
    if status.is_success() {
        return Ok(text);
    }
    let detail = error_detail(&text);
    log::debug!("{context} returned {status}: {detail:?}");
    Err(ApiError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        context,
        url,
        detail,
    })
}

/// Extract the message of an error body. GNS3 puts it into `message`, but proxies in front of it
/// use `error` or `detail`. Anything else is returned as (truncated) raw text.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            match map.get(key) {
                Some(Value::String(s)) => return Some(s.clone()),
                Some(Value::Null) | None => {}
                Some(v) => return Some(v.to_string()),
            }
        }
    }
    let body = body.trim();
    (!body.is_empty()).then(|| truncate(body))
}

fn truncate(s: &str) -> String {
    s.chars().take(MAX_DETAIL_LEN).collect()
}

/// Error raised by [`Gns3Client`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server could not be reached, or the connection broke.
    #[error("Network error during {context}: {source}")]
    Network {
        /// The request, like `GET /v2/projects`
        context: String,
        /// Error of the HTTP client
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a status code other than 2xx.
    #[error(
        "GNS3 API error ({context}): {status} {reason}{}",
        .detail.as_ref().map(|d| format!(" - {d}")).unwrap_or_default()
    )]
    Status {
        /// HTTP status code
        status: u16,
        /// Canonical reason of the status code
        reason: String,
        /// The request, like `GET /v2/projects`
        context: String,
        /// The full URL
        url: String,
        /// Message sent back by the server
        detail: Option<String>,
    },
    /// The response body does not have the expected shape.
    #[error("Unexpected response of {context}: {source}")]
    Decode {
        /// The request, like `GET /v2/projects`
        context: String,
        /// Parse error
        #[source]
        source: serde_json::Error,
        /// The (truncated) body
        body: String,
    },
    /// There is no project with the given name.
    #[error("Project named '{0}' not found")]
    ProjectNotFound(String),
}

impl ApiError {
    /// The HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
