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

//! Bounded fan-out of async jobs.

use std::future::Future;

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Run `job` on every item, with at most `limit` jobs in flight at the same time. The jobs run
/// concurrently on the current task. The result contains exactly one output per item, in the
/// order of `items`. A `limit` of zero is treated as one.
pub async fn bounded_join<I, F, Fut>(items: I, limit: usize, job: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    let job = &job;
    join_all(items.into_iter().map(|item| async move {
        // the semaphore is never closed
        let _permit = semaphore.acquire().await.ok();
        job(item).await
    }))
    .await
}
