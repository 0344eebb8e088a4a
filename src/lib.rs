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

//! # CyberRange: Deploying and operating GNS3 lab topologies
//!
//! This library deploys training scenarios (networks of IT, DMZ, OT, and field devices) onto a
//! GNS3 server, provisions the nodes with scripts through their telnet consoles, and records the
//! shell commands students type while working in the scenario.
//!
//! ## Structure
//! The source code is structured as follows:
//! - The module [`topology`] defines the scenario description ([`topology::TopologyDefinition`]),
//!   and [`record`] the snapshot of a deployed scenario ([`record::DeployedConfigRecord`]).
//! - The module [`builder`] creates the nodes and links of a scenario ([`TopologyBuilder`]).
//! - The module [`scheduler`] runs the scripts embedded in a scenario, grouped by their priority
//!   ([`ScriptScheduler`]).
//! - The module [`deploy`] combines both into a single deployment ([`deploy::deploy`]), and the
//!   module [`exec`] contains ad-hoc script pushes and executions.
//! - The module [`collector`] deploys the syslog collectors of students, instruments the nodes,
//!   and harvests the captured commands ([`collector::LogCollector`]).
//! - The module [`store`] defines how records, scripts, and sessions are persisted, and
//!   [`config`] how the command line tool is configured.
//! - The GNS3 REST client, the telnet consoles, and the script upload are implemented in a
//!   separate crate: [`gns3_lab`].

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::result_large_err)]

pub mod builder;
pub mod collector;
pub mod config;
pub mod deploy;
pub mod exec;
pub mod record;
pub mod scheduler;
pub mod store;
#[cfg(test)]
mod test;
pub mod topology;

pub use builder::TopologyBuilder;
pub use config::RangeConfig;
pub use record::DeployedConfigRecord;
pub use scheduler::ScriptScheduler;
pub use topology::TopologyDefinition;
