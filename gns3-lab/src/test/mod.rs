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

use std::time::Duration;

use tokio::net::TcpListener;

use crate::{
    console::ConsoleSettings,
    script::{PushTimings, ScriptPusher},
};

mod parallel;
mod rest;

/// Console settings that poll quickly, for talking to the fake console.
pub(crate) fn fast_settings() -> ConsoleSettings {
    ConsoleSettings {
        newline: String::from("\r"),
        connect_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(20),
        drain: Duration::from_millis(20),
    }
}

pub(crate) fn fast_pusher() -> ScriptPusher {
    ScriptPusher::new(fast_settings()).with_timings(PushTimings {
        exists_check: Duration::from_secs(1),
        heredoc_settle: Duration::from_millis(20),
        mkdir: Duration::from_secs(1),
        decode: Duration::from_secs(1),
        cleanup: Duration::from_secs(1),
        chmod: Duration::from_secs(1),
    })
}

/// A local port on which nothing listens.
pub(crate) async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
