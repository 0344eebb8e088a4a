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

//! This library contains the plumbing to drive a GNS3 simulation server and the virtual machines
//! running inside of it.
//!
//! # Structure
//!
//! The library is split into three layers that build on each other:
//!
//! - [`rest`] talks to the GNS3 REST API (version 2). It creates, starts, links and deletes nodes
//!   of a project. Every non-successful response is turned into an [`rest::ApiError`] that carries
//!   the status code, the request and the message sent back by the server.
//! - [`console`] implements the telnet console that GNS3 exposes for each node. It is a plain
//!   character stream without any framing, so the only way to know when a command is done is to
//!   read for a given duration, or to wait for a shell prompt. To obtain the exit code of a
//!   command, [`console::TelnetConsole::run_command_with_status`] appends a sentinel marker.
//! - [`script`] uploads shell scripts to the nodes through that console (base64 encoded, through
//!   a here-document), and optionally executes them. Uploads never fail with an error. Instead,
//!   each upload and execution produces a result that describes what happened.
//!
//! # Concurrency
//!
//! Everything in this library is async and runs on tokio. Operations that touch many nodes at
//! once go through [`parallel::bounded_join`], which limits the number of concurrent tasks and
//! returns one result per task in the order in which the tasks were given.
//!
//! # Testing
//!
//! With the feature `fake`, the module [`fake`] provides an in-process fake of the GNS3 server
//! (based on `wiremock`) and a fake telnet shell listening on a local TCP port.

pub mod console;
pub mod parallel;
pub mod rest;
pub mod rest_types;
pub mod script;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use console::{ConsoleError, ConsoleSettings, TelnetConsole};
pub use rest::{ApiError, Gns3Client};
pub use rest_types::{ConsoleTarget, HasConsole, Link, LinkEndpoint, Node, NodeStatus};
pub use script::{ScriptPusher, ScriptSpec};

#[cfg(test)]
mod test;
