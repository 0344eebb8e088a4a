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

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use pretty_assertions::assert_eq;
use test_log::test;

use crate::parallel::bounded_join;

#[test(tokio::test)]
async fn bounded_join_keeps_order_and_limit() {
    let active = AtomicUsize::new(0);
    let max_active = AtomicUsize::new(0);
    let items = (0..12u64).collect::<Vec<_>>();

    let results = bounded_join(items, 3, |i| {
        let active = &active;
        let max_active = &max_active;
        async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);
            // later items finish earlier
            tokio::time::sleep(Duration::from_millis(5 * (12 - i))).await;
            active.fetch_sub(1, Ordering::SeqCst);
            i * 2
        }
    })
    .await;

    assert_eq!(results, (0..12).map(|i| i * 2).collect::<Vec<_>>());
    assert_eq!(max_active.load(Ordering::SeqCst), 3);
}

#[test(tokio::test)]
async fn bounded_join_zero_limit() {
    let results = bounded_join(vec!["a", "b"], 0, |s| async move { s.len() }).await;
    assert_eq!(results, vec![1, 1]);
}
