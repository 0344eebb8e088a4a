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

//! Telnet console to a node.
//!
//! GNS3 exposes the serial console of each node as a raw telnet stream. The stream has no notion
//! of commands or responses: bytes written are typed into the shell, and bytes read are whatever
//! the terminal prints. This module therefore reads for a bounded amount of time after each
//! command, optionally returning early once a shell prompt shows up.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{timeout, Instant},
};

use crate::rest_types::ConsoleTarget;

/// Marker printed right before the exit code by [`TelnetConsole::run_command_with_status`].
pub const EXIT_SENTINEL: &str = "__EXIT__";

/// Prompt endings that indicate that the shell waits for the next command.
pub const SHELL_PROMPTS: [&str; 4] = ["# ", "$ ", "> ", "/ # "];

lazy_static! {
    static ref COMPLETE_SENTINEL: Regex =
        Regex::new(&format!(r"{}\d+\r?\n", regex::escape(EXIT_SENTINEL))).unwrap();
}

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;
const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Settings of a console session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    /// Line terminator appended to each command.
    pub newline: String,
    /// Maximum time to establish the TCP connection.
    pub connect_timeout: Duration,
    /// Granularity of [`TelnetConsole::read_for`].
    pub poll_interval: Duration,
    /// How long to keep reading after the exit code of a command was received.
    pub drain: Duration,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            newline: String::from("\r"),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            drain: Duration::from_millis(200),
        }
    }
}

/// Output of a command executed with [`TelnetConsole::run_command_with_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything printed before the exit code.
    pub output: String,
    /// The exit code, or `None` if it could not be observed within the read window.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Check if the command terminated with exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// An open telnet session with a node.
#[derive(Debug)]
pub struct TelnetConsole {
    name: String,
    stream: TcpStream,
    settings: ConsoleSettings,
    filter: TelnetFilter,
    closed: bool,
}

impl TelnetConsole {
    /// Connect to the console at `target`.
    pub async fn connect(
        target: &ConsoleTarget,
        settings: ConsoleSettings,
    ) -> Result<Self, ConsoleError> {
        let name = target.to_string();
        log::trace!("[{name}] connecting...");
        let stream = match timeout(
            settings.connect_timeout,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                log::debug!("[{name}] cannot connect: {e}");
                return Err(ConsoleError::Connect(name, e));
            }
            Err(_) => {
                log::debug!("[{name}] connection timeout!");
                return Err(ConsoleError::ConnectTimeout(name));
            }
        };
        log::trace!("[{name}] connection established!");
        Ok(Self {
            name,
            stream,
            settings,
            filter: TelnetFilter::default(),
            closed: false,
        })
    }

    /// Get the name (`host:port`) of the session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a line, followed by the configured newline.
    pub async fn send(&mut self, line: &str) -> Result<(), ConsoleError> {
        log::trace!("[{}] > {}", self.name, line);
        let mut data = Vec::with_capacity(line.len() + self.settings.newline.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.settings.newline.as_bytes());
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read whatever arrives within `wait`. Returns an empty string if nothing arrived.
    pub async fn read(&mut self, wait: Duration) -> Result<String, ConsoleError> {
        let mut buf = Vec::new();
        self.read_chunk(wait, &mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read for `duration`. If `prompts` are given, return as soon as the output ends with one of
    /// them (see [`ends_with_prompt`]). Reading also stops once the remote side closes the
    /// connection.
    pub async fn read_for(
        &mut self,
        duration: Duration,
        prompts: Option<&[&str]>,
    ) -> Result<String, ConsoleError> {
        self.read_until(duration, |output| match prompts {
            Some(prompts) => ends_with_prompt(output, prompts),
            None => false,
        })
        .await
    }

    /// Read for at most `duration`, and stop earlier as soon as `done` returns true on the output
    /// read so far.
    async fn read_until(
        &mut self,
        duration: Duration,
        done: impl Fn(&str) -> bool,
    ) -> Result<String, ConsoleError> {
        let deadline = Instant::now() + duration;
        let mut buf = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline || self.closed {
                break;
            }
            let wait = self.settings.poll_interval.min(deadline - now);
            if self.read_chunk(wait, &mut buf).await? && done(&String::from_utf8_lossy(&buf)) {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read a single chunk into `buf`, waiting at most `wait`. Returns `true` if new data was
    /// appended.
    async fn read_chunk(&mut self, wait: Duration, buf: &mut Vec<u8>) -> Result<bool, ConsoleError> {
        if self.closed {
            return Ok(false);
        }
        let mut raw = [0u8; 1024];
        let n = match timeout(wait, self.stream.read(&mut raw)).await {
            Err(_) => return Ok(false),
            Ok(Ok(0)) => {
                log::trace!("[{}] connection closed by the remote", self.name);
                self.closed = true;
                return Ok(false);
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
        };
        let (data, replies) = self.filter.feed(&raw[..n]);
        if !replies.is_empty() {
            self.stream.write_all(&replies).await?;
        }
        buf.extend_from_slice(&data);
        Ok(!data.is_empty())
    }

    /// Send a command and read its output for `read_duration`. With `early_return`, reading stops
    /// as soon as a shell prompt appears.
    pub async fn run_command(
        &mut self,
        command: &str,
        read_duration: Duration,
        early_return: bool,
    ) -> Result<String, ConsoleError> {
        self.send(command).await?;
        let prompts: &[&str] = &SHELL_PROMPTS;
        self.read_for(read_duration, early_return.then_some(prompts))
            .await
    }

    /// Send a command and report its exit code. The command is suffixed with a `printf` that
    /// writes [`EXIT_SENTINEL`] followed by `$?`. Reading stops after `read_duration`, or as soon
    /// as the complete sentinel line has arrived. If the sentinel is not observed in time, the
    /// exit code is `None`.
    pub async fn run_command_with_status(
        &mut self,
        command: &str,
        read_duration: Duration,
    ) -> Result<CommandOutput, ConsoleError> {
        let line = format!("{command}; printf '{EXIT_SENTINEL}%s\\n' $?");
        self.send(&line).await?;
        let raw = self
            .read_until(read_duration, |out| COMPLETE_SENTINEL.is_match(out))
            .await?;
        // drain the prompt that follows the sentinel
        self.read_for(self.settings.drain, None).await?;
        let mut result = parse_status_output(&raw);
        result.output = strip_echo(&result.output, &line);
        log::trace!("[{}] `{}` exited with {:?}", self.name, command, result.exit_code);
        Ok(result)
    }

    /// Send `exit` and close the connection. Errors are ignored.
    pub async fn close(mut self) {
        if !self.closed {
            let _ = self.send("exit").await;
        }
        let _ = self.stream.shutdown().await;
        log::trace!("[{}] closed", self.name);
    }
}

/// Check if the last line of `output` is a shell prompt, i.e., ends with one of the `prompts`.
/// The prompt either makes up the whole line, or directly follows a non-blank character (like
/// `root@host:~# `). Output that merely stops at a `>` or `#` (for instance in the middle of a
/// line that contains a redirection) is not a prompt.
pub fn ends_with_prompt(output: &str, prompts: &[&str]) -> bool {
    let last_line = output.rsplit('\n').next().unwrap_or_default();
    let last_line = last_line.rsplit('\r').next().unwrap_or_default();
    prompts.iter().filter(|p| !p.is_empty()).any(|p| {
        last_line == *p
            || last_line
                .strip_suffix(p)
                .and_then(|rest| rest.chars().last())
                .map_or(false, |c| !c.is_whitespace())
    })
}

/// Remove the echo of `command` from the beginning of `output`. Shells with echo enabled repeat
/// the command line (possibly after the prompt) before printing anything else.
pub fn strip_echo(output: &str, command: &str) -> String {
    match output.split_once('\n') {
        Some((first, rest)) if first.trim_end_matches('\r').ends_with(command) => rest.to_string(),
        None if output.trim_end_matches(['\r', '\n']).ends_with(command) => String::new(),
        _ => output.to_string(),
    }
}

/// Split raw console output at the last [`EXIT_SENTINEL`]. Everything before is the output of
/// the command, the first line after it is the exit code. The last occurrence is used since the
/// shell may echo the command line, which contains the sentinel as well.
pub fn parse_status_output(raw: &str) -> CommandOutput {
    match raw.rfind(EXIT_SENTINEL) {
        Some(pos) => {
            let exit_code = raw[pos + EXIT_SENTINEL.len()..]
                .lines()
                .next()
                .and_then(|l| l.trim().parse().ok());
            CommandOutput {
                output: raw[..pos].to_string(),
                exit_code,
            }
        }
        None => CommandOutput {
            output: raw.to_string(),
            exit_code: None,
        },
    }
}

/// State of the telnet parser between two chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum FilterState {
    #[default]
    Data,
    Iac,
    Option(u8),
    Sub,
    SubIac,
}

/// Removes telnet negotiation from the stream. Every option request is refused, except that the
/// server may echo and suppress go-ahead.
#[derive(Debug, Clone, Default)]
pub(crate) struct TelnetFilter {
    state: FilterState,
}

impl TelnetFilter {
    /// Feed raw bytes. Returns the payload and the negotiation replies to send back.
    pub(crate) fn feed(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(input.len());
        let mut replies = Vec::new();
        for &b in input {
            self.state = match (self.state, b) {
                (FilterState::Data, IAC) => FilterState::Iac,
                (FilterState::Data, b) => {
                    data.push(b);
                    FilterState::Data
                }
                (FilterState::Iac, IAC) => {
                    data.push(IAC);
                    FilterState::Data
                }
                (FilterState::Iac, cmd @ (WILL | WONT | DO | DONT)) => FilterState::Option(cmd),
                (FilterState::Iac, SB) => FilterState::Sub,
                (FilterState::Iac, _) => FilterState::Data,
                (FilterState::Option(cmd), opt) => {
                    match cmd {
                        WILL if opt == OPT_ECHO || opt == OPT_SGA => {
                            replies.extend_from_slice(&[IAC, DO, opt])
                        }
                        WILL => replies.extend_from_slice(&[IAC, DONT, opt]),
                        DO => replies.extend_from_slice(&[IAC, WONT, opt]),
                        _ => {}
                    }
                    FilterState::Data
                }
                (FilterState::Sub, IAC) => FilterState::SubIac,
                (FilterState::Sub, _) => FilterState::Sub,
                (FilterState::SubIac, SE) => FilterState::Data,
                (FilterState::SubIac, _) => FilterState::Sub,
            };
        }
        (data, replies)
    }
}

/// Errors of the console session.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Cannot open the TCP connection.
    #[error("Cannot connect to {0}: {1}")]
    Connect(String, #[source] std::io::Error),
    /// The connection was not established in time.
    #[error("Timeout while connecting to {0}")]
    ConnectTimeout(String),
    /// I/O error on an established connection.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
