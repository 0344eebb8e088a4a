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

//! Persistence of deployed topologies, stored scripts, and student sessions.
//!
//! The core only depends on the traits [`ProjectStore`], [`ScriptRepository`], and
//! [`SessionStore`]. The JSON file implementations in this module are used by the command line
//! tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{collector::StudentSession, record::DeployedConfigRecord};

/// Stores the snapshot of the deployed topology.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Replace the stored record.
    async fn write(&self, record: &DeployedConfigRecord) -> Result<(), StoreError>;
    /// Load the stored record.
    async fn load(&self) -> Result<DeployedConfigRecord, StoreError>;
}

/// Looks up scripts by id.
#[async_trait]
pub trait ScriptRepository: Send + Sync {
    /// Get the content of the script with the given id.
    async fn content(&self, script_id: &str) -> Result<String, StoreError>;
}

/// Stores one session per student.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the session of a student, if any.
    async fn get(&self, student: &str) -> Result<Option<StudentSession>, StoreError>;
    /// Create or replace the session of a student.
    async fn save(&self, session: &StudentSession) -> Result<(), StoreError>;
    /// Delete the session of a student. Returns `false` if there was none.
    async fn delete(&self, student: &str) -> Result<bool, StoreError>;
}

/// Read and parse a JSON file. Returns `None` if the file does not exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Json(path.to_path_buf(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io(path.to_path_buf(), e)),
    }
}

/// Write a value as pretty-printed JSON, creating the parent directories if necessary.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
    }
    let mut content =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Json(path.to_path_buf(), e))?;
    content.push('\n');
    tokio::fs::write(path, content)
        .await
        .map_err(|e| StoreError::Io(path.to_path_buf(), e))
}

/// [`ProjectStore`] backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonProjectStore {
    /// Location of the file
    path: PathBuf,
}

impl JsonProjectStore {
    /// Create a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProjectStore for JsonProjectStore {
    async fn write(&self, record: &DeployedConfigRecord) -> Result<(), StoreError> {
        write_json(&self.path, record).await?;
        log::debug!("Stored the deployed topology in {:?}", self.path);
        Ok(())
    }

    async fn load(&self) -> Result<DeployedConfigRecord, StoreError> {
        read_json(&self.path)
            .await?
            .ok_or_else(|| StoreError::NotFound(self.path.to_string_lossy().into_owned()))
    }
}

/// A stored script, as written by the script management front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredScript {
    /// Script id
    pub id: String,
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Content
    pub content: String,
}

/// [`ScriptRepository`] reading `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonScriptRepository {
    /// Directory of the script files
    dir: PathBuf,
}

impl JsonScriptRepository {
    /// Create a repository reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store a script.
    pub async fn put(&self, script: &StoredScript) -> Result<(), StoreError> {
        write_json(&self.path(&script.id)?, script).await
    }

    /// Path of the file of a script. Ids that could escape the directory are rejected.
    fn path(&self, id: &str) -> Result<PathBuf, StoreError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(StoreError::InvalidKey(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl ScriptRepository for JsonScriptRepository {
    async fn content(&self, script_id: &str) -> Result<String, StoreError> {
        read_json::<StoredScript>(&self.path(script_id)?)
            .await?
            .map(|s| s.content)
            .ok_or_else(|| StoreError::NotFound(format!("script {script_id}")))
    }
}

/// [`SessionStore`] keeping one JSON file per student in a directory.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    /// Directory of the session files
    dir: PathBuf,
}

impl JsonSessionStore {
    /// Create a store in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the session file. Student names are sanitized before they reach the store, this
    /// only guards against names that would escape the directory.
    fn path(&self, student: &str) -> Result<PathBuf, StoreError> {
        if student.is_empty() || student.contains(['/', '\\']) || student.starts_with('.') {
            return Err(StoreError::InvalidKey(student.to_string()));
        }
        Ok(self.dir.join(format!("{student}.json")))
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn get(&self, student: &str) -> Result<Option<StudentSession>, StoreError> {
        read_json(&self.path(student)?).await
    }

    async fn save(&self, session: &StudentSession) -> Result<(), StoreError> {
        write_json(&self.path(&session.name)?, session).await
    }

    async fn delete(&self, student: &str) -> Result<bool, StoreError> {
        let path = self.path(student)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }
}

/// Error of a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// The key cannot be used as a file name
    #[error("Invalid key {0:?}")]
    InvalidKey(String),
    /// Cannot read or write a file
    #[error("Cannot access {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    /// Cannot parse or serialize a file
    #[error("Invalid JSON in {0:?}: {1}")]
    Json(PathBuf, #[source] serde_json::Error),
}
