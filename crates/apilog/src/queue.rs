// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::payload::LogEntry;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Unbounded multi-producer FIFO of constructed log entries, owned by one
/// controller instance. Every pushed entry must eventually be marked done
/// (delivered, dropped by backoff, or lost) so [`PayloadQueue::wait_idle`]
/// can complete during shutdown.
#[derive(Default)]
pub struct PayloadQueue {
    entries: Mutex<VecDeque<LogEntry>>,
    outstanding: AtomicUsize,
    idle: Notify,
}

#[allow(clippy::expect_used)]
impl PayloadQueue {
    pub fn new() -> Self {
        PayloadQueue::default()
    }

    /// Never blocks, never fails; bounded only by process memory.
    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().expect("lock poisoned");
        entries.push_back(entry);
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Atomically removes and returns at most `n` entries in push order.
    pub fn drain_up_to(&self, n: usize) -> Vec<LogEntry> {
        let mut entries = self.entries.lock().expect("lock poisoned");
        let take = n.min(entries.len());
        entries.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records that `n` previously pushed entries reached a terminal state,
    /// whatever the delivery outcome was.
    pub fn mark_done(&self, n: usize) {
        if n == 0 {
            return;
        }
        let previous = self.outstanding.fetch_sub(n, Ordering::AcqRel);
        if previous <= n {
            self.idle.notify_waiters();
        }
    }

    /// Resolves once every pushed entry has been marked done.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.outstanding.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}
