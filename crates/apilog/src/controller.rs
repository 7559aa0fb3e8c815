// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::base_url::get_project_base_url;
use crate::capture::{CapturedRequest, CapturedResponse};
use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::payload::PayloadBuilder;
use crate::publisher::{build_client, BackoffState, Publisher};
use crate::queue::PayloadQueue;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, error};
use uuid::Uuid;

/// Response header adapters attach the [`Metrics::process`] return value to.
pub const DOCUMENTATION_HEADER: &str = "x-documentation-url";

/// Upper bound on concurrently in-flight background deliveries. Tasks over
/// the cap wait for a permit; their entries are already queued, so nothing
/// is lost while they wait.
const MAX_CONCURRENT_PUBLISHES: usize = 4;

/// Central controller invoked by host-framework adapters. Owns the queue,
/// triggers deliveries once the buffer threshold is reached, and flushes on
/// shutdown. One instance per wrapped application.
pub struct Metrics {
    config: MetricsConfig,
    builder: PayloadBuilder,
    queue: Arc<PayloadQueue>,
    publisher: Arc<Publisher>,
    client: reqwest::Client,
    base_log_url: OnceCell<String>,
    publish_permits: Arc<Semaphore>,
}

impl Metrics {
    pub fn new(config: MetricsConfig) -> Result<Self, MetricsError> {
        Metrics::with_backoff(config, BackoffState::default())
    }

    /// Controllers delivering to the same remote endpoint should share one
    /// [`BackoffState`] handle so a throttled endpoint is left alone by all
    /// of them at once.
    pub fn with_backoff(
        config: MetricsConfig,
        backoff: BackoffState,
    ) -> Result<Self, MetricsError> {
        if config.api_key.is_empty() {
            return Err(MetricsError::InvalidConfig(
                "API key must not be empty".to_string(),
            ));
        }

        let client = build_client(config.https_proxy.as_deref(), config.timeout)
            .unwrap_or_else(|e| {
                error!("Unable to parse proxy configuration: {e}, no proxy will be used");
                reqwest::Client::new()
            });

        let publisher = Arc::new(Publisher::new(&config, client.clone(), backoff));
        let builder = PayloadBuilder::new(&config);

        Ok(Metrics {
            builder,
            queue: Arc::new(PayloadQueue::new()),
            publisher,
            client,
            base_log_url: OnceCell::new(),
            publish_permits: Arc::new(Semaphore::new(MAX_CONCURRENT_PUBLISHES)),
            config,
        })
    }

    /// Enqueues a captured request/response pair for delivery. Returns the
    /// documentation-URL header value for the adapter to attach to the
    /// response, or `None` when the request was skipped or no base URL is
    /// known. Never fails into the host application.
    pub async fn process(
        &self,
        request: &CapturedRequest,
        response: &CapturedResponse,
    ) -> Option<String> {
        if !self.host_allowed(&request.host) {
            debug!(
                "Not enqueueing request, host {} not in allowed hosts",
                request.host
            );
            return None;
        }

        let entry_id = Uuid::new_v4().to_string();
        let Some(entry) = self.builder.build(request, response, &entry_id) else {
            debug!("Not enqueueing request, no log entry was built");
            return None;
        };
        let documentation_url = self.documentation_url(&entry_id).await;

        self.queue.push(entry);
        if self.queue.len() >= self.config.buffer_length {
            if self.config.background_mode {
                let publisher = Arc::clone(&self.publisher);
                let queue = Arc::clone(&self.queue);
                let permits = Arc::clone(&self.publish_permits);
                let batch_size = self.config.buffer_length;
                tokio::spawn(async move {
                    if let Ok(_permit) = permits.acquire_owned().await {
                        publisher.publish_batch(&queue, batch_size).await;
                    }
                });
            } else {
                self.publisher
                    .publish_batch(&self.queue, self.config.buffer_length)
                    .await;
            }
        }

        documentation_url
    }

    /// Flushes everything still buffered and waits until every entry has
    /// reached a terminal state. Call from the adapter's shutdown path.
    pub async fn shutdown(&self) {
        let pending = self.queue.len();
        if pending > 0 {
            for _ in 0..pending.div_ceil(self.config.buffer_length) {
                self.publisher
                    .publish_batch(&self.queue, self.config.buffer_length)
                    .await;
            }
        }
        self.queue.wait_idle().await;
    }

    pub fn backoff(&self) -> &BackoffState {
        self.publisher.backoff()
    }

    fn host_allowed(&self, host: &str) -> bool {
        match &self.config.allowed_hosts {
            Some(hosts) => hosts.iter().any(|h| h == host),
            None => true,
        }
    }

    async fn documentation_url(&self, entry_id: &str) -> Option<String> {
        let base = self
            .base_log_url
            .get_or_init(|| async {
                match &self.config.base_log_url {
                    Some(base) => base.clone(),
                    None => {
                        get_project_base_url(
                            &self.client,
                            &self.config.metrics_api,
                            &self.config.api_key,
                            self.config.timeout,
                        )
                        .await
                    }
                }
            })
            .await;

        if base.is_empty() {
            return None;
        }
        Some(format!("{}/logs/{}", base.trim_end_matches('/'), entry_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_config() -> MetricsConfig {
        MetricsConfig::new(
            "test-key",
            Arc::new(|_req| Some(serde_json::json!({"id": "caller"}))),
        )
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let config = MetricsConfig::new("", Arc::new(|_req| None));
        let result = Metrics::new(config);
        assert!(matches!(result, Err(MetricsError::InvalidConfig(_))));
    }

    #[test]
    fn test_host_allowed_without_filter() {
        let metrics = Metrics::new(test_config()).unwrap();
        assert!(metrics.host_allowed("anything.example.com"));
    }

    #[test]
    fn test_host_allowed_with_filter() {
        let metrics =
            Metrics::new(test_config().with_allowed_hosts(&["api.example.com"])).unwrap();
        assert!(metrics.host_allowed("api.example.com"));
        assert!(!metrics.host_allowed("staging.example.com"));
    }

    #[tokio::test]
    async fn test_documentation_url_uses_configured_override() {
        let metrics = Metrics::new(
            test_config().with_base_log_url("https://project.example.io"),
        )
        .unwrap();
        assert_eq!(
            metrics.documentation_url("abc").await,
            Some("https://project.example.io/logs/abc".to_string())
        );
    }
}
