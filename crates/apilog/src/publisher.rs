// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::payload::LogEntry;
use crate::queue::PayloadQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

/// Response codes that put the publisher into its cool-down window:
/// auth failures, throttling, and server-side errors.
const BACKOFF_STATUS_CODES: [u16; 5] = [401, 403, 429, 500, 503];

const DEFAULT_BACKOFF_WINDOW: Duration = Duration::from_secs(300);

pub(crate) const SDK_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION"));

/// Shared advisory flag that suppresses delivery attempts for a cool-down
/// window after the remote API signals distress. Clone the handle into every
/// publisher talking to the same endpoint; the first failure sets the expiry
/// and concurrent failures do not extend it.
#[derive(Debug, Clone)]
pub struct BackoffState {
    expires_at_ms: Arc<AtomicU64>,
    window: Duration,
}

impl Default for BackoffState {
    fn default() -> Self {
        BackoffState::new(DEFAULT_BACKOFF_WINDOW)
    }
}

impl BackoffState {
    pub fn new(window: Duration) -> Self {
        BackoffState {
            expires_at_ms: Arc::new(AtomicU64::new(0)),
            window,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(now_millis())
    }

    fn is_active_at(&self, now_ms: u64) -> bool {
        let expires = self.expires_at_ms.load(Ordering::Acquire);
        if expires == 0 {
            return false;
        }
        if now_ms < expires {
            return true;
        }
        // Lazily clear the expired window. Losing this race to a concurrent
        // fresh activation is tolerable; the flag is advisory.
        let _ = self.expires_at_ms.compare_exchange(
            expires,
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        false
    }

    pub fn activate(&self) {
        self.activate_at(now_millis());
    }

    fn activate_at(&self, now_ms: u64) {
        let expires = self.expires_at_ms.load(Ordering::Acquire);
        if expires != 0 && now_ms < expires {
            // Already active; the first failure owns the window.
            return;
        }
        let _ = self.expires_at_ms.compare_exchange(
            expires,
            now_ms + self.window.as_millis() as u64,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds a reqwest client with optional proxy configuration and timeout.
pub(crate) fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

/// Drains batches off a [`PayloadQueue`] and delivers them to the intake.
/// Delivery is at-most-once: a drained batch is never re-queued, whatever
/// the outcome.
pub struct Publisher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    backoff: BackoffState,
}

impl Publisher {
    pub fn new(config: &MetricsConfig, client: reqwest::Client, backoff: BackoffState) -> Self {
        Publisher {
            client,
            endpoint: format!("{}/v1/request", config.metrics_api.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            backoff,
        }
    }

    pub fn backoff(&self) -> &BackoffState {
        &self.backoff
    }

    /// Drains up to `batch_size` entries and attempts one delivery. All
    /// drained entries are marked done on every path, including the
    /// backoff-discard and failure paths.
    pub async fn publish_batch(&self, queue: &PayloadQueue, batch_size: usize) {
        let batch = queue.drain_up_to(batch_size);
        if batch.is_empty() {
            return;
        }
        let count = batch.len();

        if self.backoff.is_active() {
            debug!("Discarding batch of {count} entries, delivery backoff window is active");
            queue.mark_done(count);
            return;
        }

        match self.post_batch(&batch).await {
            Ok(()) => {
                info!("POST to {} with {count} items succeeded", self.endpoint);
            }
            Err(MetricsError::Delivery { status, body }) => {
                if BACKOFF_STATUS_CODES.contains(&status) {
                    self.backoff.activate();
                }
                error!(
                    "POST to {} with {count} items returned {status}: {body}",
                    self.endpoint
                );
            }
            Err(e) => {
                error!("Failed to deliver batch of {count} entries: {e}");
            }
        }

        queue.mark_done(count);
    }

    async fn post_batch(&self, batch: &[LogEntry]) -> Result<(), MetricsError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.api_key, Some(""))
            .header(reqwest::header::USER_AGENT, SDK_USER_AGENT)
            .timeout(self.timeout)
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MetricsError::Delivery {
            status: status.as_u16(),
            body,
        })
    }
}
