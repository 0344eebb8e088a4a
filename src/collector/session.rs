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

//! Logging sessions of students. A session remembers which collectors were deployed for a
//! student in which project, such that the logs can be harvested and the collectors removed
//! later on.

use std::sync::Arc;

use gns3_lab::{ConsoleSettings, Gns3Client};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{
    CollectorConfig, CollectorError, CollectorTimings, KeywordClassifier, LogCollector,
    NodeClassifier, SnitchNodeInfo,
};
use crate::store::SessionStore;

lazy_static! {
    /// Characters that are removed from student names
    static ref FORBIDDEN: Regex = Regex::new(r"[^\w\-]").unwrap();
}

/// Turn a student name into a key that is safe to use in node and file names: spaces become
/// underscores, everything except word characters and `-` is removed, and the result is
/// lowercased.
pub fn sanitize_student_name(name: &str) -> Result<String, CollectorError> {
    let name = name.trim().replace(' ', "_");
    let name = FORBIDDEN.replace_all(&name, "");
    if name.is_empty() {
        return Err(CollectorError::InvalidStudentName);
    }
    Ok(name.to_lowercase())
}

/// Turn a sanitized name back into something readable: underscores become spaces and every word
/// is capitalized.
pub fn display_name_from_sanitized(sanitized: &str) -> String {
    let mut result = String::with_capacity(sanitized.len());
    let mut in_word = false;
    for c in sanitized.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

/// The active logging session of a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSession {
    /// Sanitized name
    pub name: String,
    /// Name as entered by the student
    pub display_name: String,
    /// When the session was set up
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Project UUID
    pub project_id: String,
    /// Project name
    pub project_name: String,
    /// Address of the GNS3 server
    pub gns3_server_ip: String,
    /// Port of the GNS3 server
    #[serde(default = "default_server_port")]
    pub gns3_server_port: u16,
    /// Deployed collectors
    #[serde(default)]
    pub snitch_nodes: Vec<SnitchNodeInfo>,
    /// Nodes that forward their commands
    #[serde(default)]
    pub injected_nodes: Vec<String>,
}

/// Serde default of [`StudentSession::gns3_server_port`].
fn default_server_port() -> u16 {
    80
}

/// How a project is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    /// By UUID
    Id(String),
    /// By name
    Name(String),
}

/// Outcome of [`StudentLogging::setup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    /// Sanitized name
    pub student_name: String,
    /// Name as entered
    pub display_name: String,
    /// Project name
    pub project_name: String,
    /// Deployed collectors
    pub snitch_nodes: Vec<SnitchNodeInfo>,
    /// Number of instrumented nodes
    pub injected_node_count: usize,
    /// Instrumented nodes
    pub injected_nodes: Vec<String>,
    /// Nodes that were not instrumented
    pub skipped_nodes: Vec<String>,
    /// Errors and warnings
    pub errors: Vec<String>,
    /// Summary
    pub message: String,
    /// At least one collector existed already.
    pub reused_existing: bool,
}

/// Outcome of [`StudentLogging::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingStatus {
    /// Sanitized name
    pub student_name: String,
    /// Readable name
    pub display_name: String,
    /// Whether the student has a session
    pub is_active: bool,
    /// Project of the session
    pub project_name: Option<String>,
    /// Collectors of the session
    pub snitch_nodes: Vec<SnitchNodeInfo>,
    /// Instrumented nodes
    pub injected_nodes: Vec<String>,
    /// When the session was set up
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Outcome of [`StudentLogging::preview`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPreview {
    /// Sanitized name
    pub student_name: String,
    /// Commands captured by the IT collector
    pub it_logs: Option<String>,
    /// Commands captured by the OT collector
    pub ot_logs: Option<String>,
    /// Errors and warnings
    pub errors: Vec<String>,
    /// When the logs were read
    #[serde(with = "time::serde::rfc3339")]
    pub retrieved_at: OffsetDateTime,
}

/// Outcome of [`StudentLogging::teardown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Sanitized name
    pub student_name: String,
    /// Deleted collector nodes
    pub removed_nodes: Vec<String>,
    /// Summary
    pub message: String,
}

/// Student-facing logging operations. Each operation sanitizes the student name and works on the
/// session stored for that name.
pub struct StudentLogging<'a> {
    /// GNS3 server
    client: &'a Gns3Client,
    /// Where sessions are kept
    store: &'a dyn SessionStore,
    /// Address of the GNS3 server
    server_host: String,
    /// Port of the GNS3 server
    server_port: u16,
    /// What to deploy
    config: CollectorConfig,
    /// Pauses and read windows
    timings: CollectorTimings,
    /// Console settings
    console: ConsoleSettings,
    /// Name heuristics
    classifier: Arc<dyn NodeClassifier>,
}

impl std::fmt::Debug for StudentLogging<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudentLogging")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> StudentLogging<'a> {
    /// Create the logging operations with default settings.
    pub fn new(
        client: &'a Gns3Client,
        store: &'a dyn SessionStore,
        server_host: impl Into<String>,
        server_port: u16,
    ) -> Self {
        Self {
            client,
            store,
            server_host: server_host.into(),
            server_port,
            config: Default::default(),
            timings: Default::default(),
            console: Default::default(),
            classifier: Arc::new(KeywordClassifier),
        }
    }

    /// Use a different collector configuration.
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

    /// Collector manager for a project.
    fn collector(&self, project_id: &str) -> LogCollector<'a> {
        LogCollector::new(self.client, project_id, self.server_host.clone())
            .with_config(self.config.clone())
            .with_timings(self.timings)
            .with_console_settings(self.console.clone())
            .with_classifier(self.classifier.clone())
    }

    /// Resolve the id and name of a project.
    async fn resolve_project(&self, project: &ProjectRef) -> Result<(String, String), CollectorError> {
        match project {
            ProjectRef::Id(id) => self
                .client
                .project_by_id(id)
                .await?
                .map(|p| (p.project_id, p.name))
                .ok_or_else(|| CollectorError::ProjectNotFound(id.clone())),
            ProjectRef::Name(name) => Ok((self.client.find_project_id(name).await?, name.clone())),
        }
    }

    /// Get the session of a student, or fail if there is none.
    async fn session(&self, student: &str) -> Result<(String, StudentSession), CollectorError> {
        let name = sanitize_student_name(student)?;
        match self.store.get(&name).await? {
            Some(session) => Ok((name, session)),
            None => Err(CollectorError::NoSession(student.to_string())),
        }
    }

    /// Deploy the collectors of a student and instrument all nodes of the project. Running setup
    /// again for the same project reuses the collectors. A student can only have a session in a
    /// single project at a time.
    pub async fn setup(
        &self,
        student: &str,
        project: &ProjectRef,
    ) -> Result<SetupReport, CollectorError> {
        let name = sanitize_student_name(student)?;
        let display_name = student.trim().to_string();
        let existing = self.store.get(&name).await?;
        let (project_id, project_name) = self.resolve_project(project).await?;

        if let Some(existing) = existing.filter(|s| s.project_id != project_id) {
            return Err(CollectorError::SessionConflict {
                student: display_name,
                project: existing.project_name,
            });
        }

        log::info!("[{name}] setting up logging in {project_name}");
        let result = self.collector(&project_id).setup(&name).await?;

        let session = StudentSession {
            name: name.clone(),
            display_name: display_name.clone(),
            created_at: OffsetDateTime::now_utc(),
            project_id,
            project_name: project_name.clone(),
            gns3_server_ip: self.server_host.clone(),
            gns3_server_port: self.server_port,
            snitch_nodes: result.snitch_nodes.clone(),
            injected_nodes: result.injected_nodes.clone(),
        };
        self.store.save(&session).await?;

        let mut message = String::from("Logging setup complete");
        if result.reused_existing {
            message.push_str(" (reused existing collectors)");
        }
        if !result.errors.is_empty() {
            message.push_str(&format!(" with {} warning(s)", result.errors.len()));
        }

        Ok(SetupReport {
            student_name: name,
            display_name,
            project_name,
            snitch_nodes: result.snitch_nodes,
            injected_node_count: result.injected_nodes.len(),
            injected_nodes: result.injected_nodes,
            skipped_nodes: result.skipped_nodes,
            errors: result.errors,
            message,
            reused_existing: result.reused_existing,
        })
    }

    /// Describe the session of a student. A student without a session is reported as inactive.
    pub async fn status(&self, student: &str) -> Result<LoggingStatus, CollectorError> {
        let name = sanitize_student_name(student)?;
        Ok(match self.store.get(&name).await? {
            Some(session) => LoggingStatus {
                student_name: session.name,
                display_name: session.display_name,
                is_active: true,
                project_name: Some(session.project_name),
                snitch_nodes: session.snitch_nodes,
                injected_nodes: session.injected_nodes,
                created_at: Some(session.created_at),
            },
            None => LoggingStatus {
                display_name: display_name_from_sanitized(&name),
                student_name: name,
                is_active: false,
                project_name: None,
                snitch_nodes: Vec::new(),
                injected_nodes: Vec::new(),
                created_at: None,
            },
        })
    }

    /// Read the captured commands of a student without storing them.
    pub async fn preview(&self, student: &str) -> Result<LogPreview, CollectorError> {
        let (name, session) = self.session(student).await?;
        if session.snitch_nodes.is_empty() {
            return Err(CollectorError::NoSessionCollectors);
        }
        let harvest = self
            .collector(&session.project_id)
            .harvest(&session.snitch_nodes)
            .await;
        Ok(LogPreview {
            student_name: name,
            it_logs: harvest.logs.get("it").cloned(),
            ot_logs: harvest.logs.get("ot").cloned(),
            errors: harvest.errors,
            retrieved_at: OffsetDateTime::now_utc(),
        })
    }

    /// Delete the collectors of a student, and then the session.
    pub async fn teardown(&self, student: &str) -> Result<TeardownReport, CollectorError> {
        let (name, session) = self.session(student).await?;
        let removed_nodes = self.collector(&session.project_id).teardown(&name).await?;
        self.store.delete(&name).await?;
        log::info!("[{name}] removed {} collectors", removed_nodes.len());
        Ok(TeardownReport {
            student_name: name,
            removed_nodes,
            message: String::from("Logging teardown complete"),
        })
    }
}
