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

//! Upload and execute shell scripts on nodes through their telnet console.
//!
//! The console is the only channel into a node, so files are transferred by typing them. The
//! content is base64 encoded (which makes it safe to type), written into a temporary file with a
//! here-document, and decoded on the node:
//!
//! ```text
//! cat <<'EOF' > /tmp/.upload_<random>.b64
//! IyEvYmluL3NoCmVjaG8gaGVsbG8K
//! EOF
//! mkdir -p /opt/scripts
//! base64 -d /tmp/.upload_<random>.b64 > /opt/scripts/hello.sh
//! rm -f /tmp/.upload_<random>.b64
//! chmod +x /opt/scripts/hello.sh
//! ```
//!
//! Each of these commands goes through [`TelnetConsole::run_command_with_status`], such that a
//! failing decode or chmod is detected. Nothing in this module returns an error to the caller:
//! every push produces a [`ScriptPushResult`].

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    time::Duration,
};

use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::{
    console::{ConsoleError, ConsoleSettings, TelnetConsole},
    parallel::bounded_join,
    rest_types::ConsoleTarget,
};

/// Width of the lines of the base64 payload typed into the here-document.
const BASE64_LINE_WIDTH: usize = 120;

/// Default number of concurrent console sessions for [`ScriptPusher::push_many`].
pub const DEFAULT_PUSH_CONCURRENCY: usize = 5;

/// Where the content of a script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// The content itself.
    Inline(String),
    /// A file below the local root of the [`ScriptPusher`].
    Local(PathBuf),
}

/// What to upload where, and what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    /// Destination on the node
    pub remote_path: String,
    /// Content of the script
    pub source: ScriptSource,
    /// Run the script once it is uploaded
    pub run_after_upload: bool,
    /// `chmod +x` the script after uploading
    pub executable: bool,
    /// Replace the file if it already exists
    pub overwrite: bool,
    /// How long to wait for the script to terminate
    pub run_timeout: Duration,
    /// Interpreter used to run the script
    pub shell: String,
}

impl ScriptSpec {
    /// Upload `content` to `remote_path`, with the default options (executable, overwrite, do
    /// not run).
    pub fn inline(remote_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(remote_path, ScriptSource::Inline(content.into()))
    }

    /// Upload the local file at `path` to `remote_path`, with the default options.
    pub fn local(remote_path: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(remote_path, ScriptSource::Local(path.into()))
    }

    fn new(remote_path: impl Into<String>, source: ScriptSource) -> Self {
        Self {
            remote_path: remote_path.into(),
            source,
            run_after_upload: false,
            executable: true,
            overwrite: true,
            run_timeout: Duration::from_secs(10),
            shell: String::from("sh"),
        }
    }

    /// Run the script after uploading it, waiting at most `timeout` for it to finish.
    pub fn run_after_upload(mut self, timeout: Duration) -> Self {
        self.run_after_upload = true;
        self.run_timeout = timeout;
        self
    }

    /// Interpreter used to run the script.
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Leave the file alone if it already exists on the node.
    pub fn keep_existing(mut self) -> Self {
        self.overwrite = false;
        self
    }
}

/// A script to push to a specific node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTask {
    /// Name of the node, used for reporting
    pub node_name: String,
    /// Console of the node
    pub target: ConsoleTarget,
    /// What to push
    pub spec: ScriptSpec,
}

/// Why an upload did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailure {
    /// The file exists and `overwrite` was not set. Nothing was written.
    Exists,
    /// `base64 -d` returned a non-zero exit code (or none at all).
    DecodeFailed,
    /// `chmod +x` returned a non-zero exit code (or none at all).
    ChmodFailed,
    /// The console could not be reached, or the session broke.
    ConnectionFailed,
    /// The local script file could not be read.
    SourceUnavailable,
}

impl Display for UploadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UploadFailure::Exists => "exists",
            UploadFailure::DecodeFailed => "decode_failed",
            UploadFailure::ChmodFailed => "chmod_failed",
            UploadFailure::ConnectionFailed => "connection_failed",
            UploadFailure::SourceUnavailable => "source_unavailable",
        })
    }
}

/// Outcome of uploading a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptUploadResult {
    /// Node name
    pub node_name: String,
    /// Console host
    pub host: String,
    /// Console port
    pub port: u16,
    /// Destination on the node
    pub remote_path: String,
    /// Whether the file is now on the node.
    pub success: bool,
    /// Whether the upload was skipped because the file already exists.
    pub skipped: bool,
    /// Why the upload did not succeed.
    pub reason: Option<UploadFailure>,
    /// Output of the decode and chmod commands.
    pub output: String,
    /// Error message
    pub error: Option<String>,
    /// When the upload finished
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Outcome of executing a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptExecutionResult {
    /// Node name
    pub node_name: String,
    /// Console host
    pub host: String,
    /// Console port
    pub port: u16,
    /// Path of the script on the node
    pub remote_path: String,
    /// Whether the script exited with code 0.
    pub success: bool,
    /// The exit code, if it was observed.
    pub exit_code: Option<i32>,
    /// Everything the script printed
    pub output: String,
    /// Error message
    pub error: Option<String>,
    /// When the execution finished
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Outcome of [`ScriptPusher::push`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPushResult {
    /// The upload
    pub upload: ScriptUploadResult,
    /// The execution, if the script was uploaded and should be run.
    pub execution: Option<ScriptExecutionResult>,
}

impl ScriptPushResult {
    /// The upload succeeded, and so did the execution (if there was one).
    pub fn success(&self) -> bool {
        self.upload.success && self.execution.as_ref().map(|e| e.success).unwrap_or(true)
    }

    /// The first error that occurred: the upload error, the upload reason, or the execution error.
    pub fn error(&self) -> Option<String> {
        self.upload
            .error
            .clone()
            .or_else(|| self.upload.reason.map(|r| r.to_string()))
            .or_else(|| self.execution.as_ref().and_then(|e| e.error.clone()))
    }
}

/// How long to read after each step of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTimings {
    /// `[ -e path ]`
    pub exists_check: Duration,
    /// After the here-document
    pub heredoc_settle: Duration,
    /// `mkdir -p`
    pub mkdir: Duration,
    /// `base64 -d`
    pub decode: Duration,
    /// `rm -f`
    pub cleanup: Duration,
    /// `chmod +x`
    pub chmod: Duration,
}

impl Default for PushTimings {
    fn default() -> Self {
        Self {
            exists_check: Duration::from_secs(1),
            heredoc_settle: Duration::from_millis(200),
            mkdir: Duration::from_secs(2),
            decode: Duration::from_secs(5),
            cleanup: Duration::from_secs(1),
            chmod: Duration::from_secs(2),
        }
    }
}

/// Uploads and executes scripts. Each push opens its own console session.
#[derive(Debug, Clone, Default)]
pub struct ScriptPusher {
    console: ConsoleSettings,
    local_root: Option<PathBuf>,
    timings: PushTimings,
}

impl ScriptPusher {
    /// Create a new pusher that opens console sessions with the given settings.
    pub fn new(console: ConsoleSettings) -> Self {
        Self {
            console,
            local_root: None,
            timings: PushTimings::default(),
        }
    }

    /// Allow [`ScriptSource::Local`] files below `root`.
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    /// Change the read durations of the individual upload steps.
    pub fn with_timings(mut self, timings: PushTimings) -> Self {
        self.timings = timings;
        self
    }

    /// The console settings used for each session.
    pub fn console_settings(&self) -> &ConsoleSettings {
        &self.console
    }

    /// Resolve a local script path. Relative paths are interpreted relative to the local root.
    /// The resolved file must exist and must not leave the local root.
    pub fn resolve_local_path(&self, path: &Path) -> Result<PathBuf, ScriptSourceError> {
        let root = self
            .local_root
            .as_ref()
            .ok_or_else(|| ScriptSourceError::NoLocalRoot(path.to_path_buf()))?;
        let root = root
            .canonicalize()
            .map_err(|e| ScriptSourceError::Io(root.clone(), e))?;
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        if !candidate.exists() {
            return Err(ScriptSourceError::NotFound(candidate));
        }
        let candidate = candidate
            .canonicalize()
            .map_err(|e| ScriptSourceError::Io(candidate.clone(), e))?;
        if !candidate.starts_with(&root) {
            return Err(ScriptSourceError::OutsideRoot(candidate));
        }
        if !candidate.is_file() {
            return Err(ScriptSourceError::NotFound(candidate));
        }
        Ok(candidate)
    }

    async fn load(&self, source: &ScriptSource) -> Result<Vec<u8>, ScriptSourceError> {
        match source {
            ScriptSource::Inline(content) => Ok(content.as_bytes().to_vec()),
            ScriptSource::Local(path) => {
                let path = self.resolve_local_path(path)?;
                tokio::fs::read(&path)
                    .await
                    .map_err(|e| ScriptSourceError::Io(path, e))
            }
        }
    }

    /// Upload a script to a node, and run it if requested. This function never fails; everything
    /// that goes wrong is reported in the result.
    pub async fn push(
        &self,
        node_name: &str,
        target: &ConsoleTarget,
        spec: &ScriptSpec,
    ) -> ScriptPushResult {
        let upload = |success, reason: Option<UploadFailure>, output: String, error| {
            ScriptUploadResult {
                node_name: node_name.to_string(),
                host: target.host.clone(),
                port: target.port,
                remote_path: spec.remote_path.clone(),
                success,
                skipped: reason == Some(UploadFailure::Exists),
                reason,
                output,
                error,
                timestamp: OffsetDateTime::now_utc(),
            }
        };

        let content = match self.load(&spec.source).await {
            Ok(content) => content,
            Err(e) => {
                log::error!("[{node_name}] Cannot read the script: {e}");
                let result = upload(
                    false,
                    Some(UploadFailure::SourceUnavailable),
                    String::new(),
                    Some(e.to_string()),
                );
                return ScriptPushResult {
                    upload: result,
                    execution: None,
                };
            }
        };

        log::debug!(
            "[{node_name}] pushing {} bytes to {} via {target}",
            content.len(),
            spec.remote_path
        );

        let mut console = match TelnetConsole::connect(target, self.console.clone()).await {
            Ok(c) => c,
            Err(e) => {
                log::error!("[{node_name}] {e}");
                let result = upload(
                    false,
                    Some(UploadFailure::ConnectionFailed),
                    String::new(),
                    Some(e.to_string()),
                );
                return ScriptPushResult {
                    upload: result,
                    execution: None,
                };
            }
        };

        let result = match self.upload(&mut console, spec, &content).await {
            Ok(Ok(output)) => {
                let upload = upload(true, None, output, None);
                let execution = if spec.run_after_upload {
                    Some(
                        self.execute(
                            &mut console,
                            node_name,
                            target,
                            &spec.remote_path,
                            &spec.shell,
                            spec.run_timeout,
                        )
                        .await,
                    )
                } else {
                    None
                };
                ScriptPushResult { upload, execution }
            }
            Ok(Err((reason, output, error))) => {
                log::warn!("[{node_name}] upload of {} failed: {reason}", spec.remote_path);
                ScriptPushResult {
                    upload: upload(false, Some(reason), output, error),
                    execution: None,
                }
            }
            Err(e) => {
                log::error!("[{node_name}] console session broke: {e}");
                ScriptPushResult {
                    upload: upload(
                        false,
                        Some(UploadFailure::ConnectionFailed),
                        String::new(),
                        Some(e.to_string()),
                    ),
                    execution: None,
                }
            }
        };

        console.close().await;
        result
    }

    /// Perform the upload steps. The outer error is a broken console session, the inner error is
    /// a step that failed on the node.
    async fn upload(
        &self,
        console: &mut TelnetConsole,
        spec: &ScriptSpec,
        content: &[u8],
    ) -> Result<Result<String, (UploadFailure, String, Option<String>)>, ConsoleError> {
        let t = &self.timings;
        let dst = shell_quote(&spec.remote_path);

        if !spec.overwrite {
            let exists = console
                .run_command_with_status(&format!("[ -e {dst} ]"), t.exists_check)
                .await?;
            if exists.success() {
                return Ok(Err((UploadFailure::Exists, String::new(), None)));
            }
        }

        let tmp = shell_quote(&temp_upload_path());
        console.send(&format!("cat <<'EOF' > {tmp}")).await?;
        for line in base64_lines(content) {
            console.send(&line).await?;
        }
        console.send("EOF").await?;
        tokio::time::sleep(t.heredoc_settle).await;
        console.read_for(t.heredoc_settle, None).await?;

        if let Some(parent) = remote_parent(&spec.remote_path) {
            console
                .run_command_with_status(&format!("mkdir -p {}", shell_quote(parent)), t.mkdir)
                .await?;
        }

        let decode = console
            .run_command_with_status(&format!("base64 -d {tmp} > {dst}"), t.decode)
            .await?;
        console
            .run_command_with_status(&format!("rm -f {tmp}"), t.cleanup)
            .await?;
        if !decode.success() {
            return Ok(Err((
                UploadFailure::DecodeFailed,
                decode.output,
                Some(format!(
                    "base64 decode exited with {}",
                    fmt_exit_code(decode.exit_code)
                )),
            )));
        }

        let mut chmod_output = String::new();
        if spec.executable {
            let chmod = console
                .run_command_with_status(&format!("chmod +x {dst}"), t.chmod)
                .await?;
            if !chmod.success() {
                return Ok(Err((
                    UploadFailure::ChmodFailed,
                    chmod.output,
                    Some(format!("chmod exited with {}", fmt_exit_code(chmod.exit_code))),
                )));
            }
            chmod_output = chmod.output;
        }

        let output = [decode.output.trim(), chmod_output.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .join("\n");
        Ok(Ok(output))
    }

    /// Run a script on an open console.
    async fn execute(
        &self,
        console: &mut TelnetConsole,
        node_name: &str,
        target: &ConsoleTarget,
        remote_path: &str,
        shell: &str,
        timeout: Duration,
    ) -> ScriptExecutionResult {
        let command = format!("{shell} {}", shell_quote(remote_path));
        let (output, exit_code, error) = match console.run_command_with_status(&command, timeout).await
        {
            Ok(out) if out.success() => (out.output, out.exit_code, None),
            Ok(out) => {
                let error = format!("exit={}", fmt_exit_code(out.exit_code));
                (out.output, out.exit_code, Some(error))
            }
            Err(e) => (String::new(), None, Some(e.to_string())),
        };
        let success = exit_code == Some(0);
        if success {
            log::debug!("[{node_name}] {remote_path} finished successfully");
        } else {
            log::warn!("[{node_name}] {remote_path} failed: {error:?}");
        }
        ScriptExecutionResult {
            node_name: node_name.to_string(),
            host: target.host.clone(),
            port: target.port,
            remote_path: remote_path.to_string(),
            success,
            exit_code,
            output,
            error,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Run a script that was already uploaded. This function never fails; a console that cannot
    /// be reached yields an unsuccessful result.
    pub async fn run(
        &self,
        node_name: &str,
        target: &ConsoleTarget,
        remote_path: &str,
        shell: &str,
        timeout: Duration,
    ) -> ScriptExecutionResult {
        match TelnetConsole::connect(target, self.console.clone()).await {
            Ok(mut console) => {
                let result = self
                    .execute(&mut console, node_name, target, remote_path, shell, timeout)
                    .await;
                console.close().await;
                result
            }
            Err(e) => {
                log::error!("[{node_name}] {e}");
                ScriptExecutionResult {
                    node_name: node_name.to_string(),
                    host: target.host.clone(),
                    port: target.port,
                    remote_path: remote_path.to_string(),
                    success: false,
                    exit_code: None,
                    output: String::new(),
                    error: Some(e.to_string()),
                    timestamp: OffsetDateTime::now_utc(),
                }
            }
        }
    }

    /// Push many scripts, with at most `concurrency` console sessions open at the same time. The
    /// results are in the same order as `tasks`.
    pub async fn push_many(&self, tasks: &[ScriptTask], concurrency: usize) -> Vec<ScriptPushResult> {
        bounded_join(tasks, concurrency, |task| {
            self.push(&task.node_name, &task.target, &task.spec)
        })
        .await
    }
}

/// Quote a string for a POSIX shell. Strings consisting only of safe characters are returned
/// unchanged.
pub fn shell_quote(s: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c);
    if !s.is_empty() && s.chars().all(safe) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r#"'"'"'"#))
    }
}

/// Encode `content` as base64, split into lines of [`BASE64_LINE_WIDTH`] characters.
fn base64_lines(content: &[u8]) -> Vec<String> {
    let encoded = base64::encode(content);
    encoded
        .as_bytes()
        .chunks(BASE64_LINE_WIDTH)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

/// Parent directory of a remote path, if there is one worth creating.
fn remote_parent(path: &str) -> Option<&str> {
    let (parent, _) = path.rsplit_once('/')?;
    (!parent.is_empty() && parent != ".").then_some(parent)
}

fn temp_upload_path() -> String {
    format!("/tmp/.upload_{:032x}.b64", rand::thread_rng().gen::<u128>())
}

fn fmt_exit_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| String::from("unknown"))
}

/// The content of a local script cannot be loaded.
#[derive(Debug, Error)]
pub enum ScriptSourceError {
    /// No local root is configured.
    #[error("Cannot load {0:?}: no local script directory is configured")]
    NoLocalRoot(PathBuf),
    /// The file does not exist.
    #[error("Local script {0:?} not found")]
    NotFound(PathBuf),
    /// The path leaves the local root.
    #[error("Local script {0:?} is outside of the script directory")]
    OutsideRoot(PathBuf),
    /// Cannot read the file.
    #[error("Cannot read {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
}
