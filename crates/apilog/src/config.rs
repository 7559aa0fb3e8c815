// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::capture::CapturedRequest;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// User-supplied callback that maps an inbound request to a caller-identity
/// mapping. Returning `None` signals that the request must not be logged.
pub type GroupingFn = Arc<dyn Fn(&CapturedRequest) -> Option<Value> + Send + Sync>;

/// Default intake to deliver log entries to.
pub const DEFAULT_METRICS_API: &str = "https://metrics.apilog.io";

const DEFAULT_BUFFER_LENGTH: usize = 1;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Running configuration for a [`crate::Metrics`] controller.
#[derive(Clone)]
pub struct MetricsConfig {
    /// API key used for both intake auth and the base-URL lookup.
    pub api_key: String,
    pub grouping_function: GroupingFn,
    /// Number of entries to buffer before a delivery is triggered. Also the
    /// batch size drained per delivery. Minimum 1.
    pub buffer_length: usize,
    pub development_mode: bool,
    /// When set, deliveries run in a spawned task instead of blocking the
    /// calling request context.
    pub background_mode: bool,
    /// Header/query/JSON-body keys to redact. Overrides `allowlist` for
    /// overlapping keys.
    pub denylist: Vec<String>,
    /// When non-empty, only these keys are sent unredacted.
    pub allowlist: Vec<String>,
    /// When set, requests whose host is not in the list are skipped entirely.
    pub allowed_hosts: Option<Vec<String>>,
    /// Timeout for every call to the remote API.
    pub timeout: Duration,
    /// Intake base URL; `POST {metrics_api}/v1/request` and
    /// `GET {metrics_api}/v1`.
    pub metrics_api: String,
    /// When set, used for the documentation-URL header instead of the
    /// base-URL lookup call.
    pub base_log_url: Option<String>,
    pub https_proxy: Option<String>,
}

impl MetricsConfig {
    pub fn new(api_key: &str, grouping_function: GroupingFn) -> Self {
        MetricsConfig {
            api_key: api_key.to_string(),
            grouping_function,
            buffer_length: DEFAULT_BUFFER_LENGTH,
            development_mode: false,
            background_mode: true,
            denylist: Vec::new(),
            allowlist: Vec::new(),
            allowed_hosts: None,
            timeout: DEFAULT_TIMEOUT,
            metrics_api: DEFAULT_METRICS_API.to_string(),
            base_log_url: None,
            https_proxy: None,
        }
    }

    pub fn with_buffer_length(mut self, buffer_length: usize) -> Self {
        self.buffer_length = buffer_length.max(1);
        self
    }

    pub fn with_development_mode(mut self, development_mode: bool) -> Self {
        self.development_mode = development_mode;
        self
    }

    pub fn with_background_mode(mut self, background_mode: bool) -> Self {
        self.background_mode = background_mode;
        self
    }

    pub fn with_denylist(mut self, denylist: &[&str]) -> Self {
        self.denylist = denylist.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_allowlist(mut self, allowlist: &[&str]) -> Self {
        self.allowlist = allowlist.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_allowed_hosts(mut self, hosts: &[&str]) -> Self {
        self.allowed_hosts = Some(hosts.iter().map(|h| h.to_string()).collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metrics_api(mut self, metrics_api: &str) -> Self {
        self.metrics_api = metrics_api.trim_end_matches('/').to_string();
        self
    }

    pub fn with_base_log_url(mut self, base_log_url: &str) -> Self {
        self.base_log_url = Some(base_log_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_https_proxy(mut self, https_proxy: &str) -> Self {
        self.https_proxy = Some(https_proxy.to_string());
        self
    }
}

impl Debug for MetricsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsConfig")
            .field("buffer_length", &self.buffer_length)
            .field("development_mode", &self.development_mode)
            .field("background_mode", &self.background_mode)
            .field("denylist", &self.denylist)
            .field("allowlist", &self.allowlist)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("timeout", &self.timeout)
            .field("metrics_api", &self.metrics_api)
            .field("base_log_url", &self.base_log_url)
            .field("https_proxy", &self.https_proxy)
            .finish_non_exhaustive()
    }
}
