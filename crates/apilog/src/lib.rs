// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Instrumentation SDK that wraps a host web application's request/response
//! cycle, captures HTTP traffic as structured log entries, redacts sensitive
//! fields, groups entries by caller identity, and batches them for
//! asynchronous delivery to a remote metrics-collection API.
//!
//! Host-framework adapters populate a [`CapturedRequest`]/[`CapturedResponse`]
//! pair and hand it to [`Metrics::process`]. Identity validation, payload
//! construction, queueing, and batched delivery with a shared backoff window
//! all happen inside the SDK and never raise into the host application's
//! request path.
//!
//! ```no_run
//! use apilog::{CapturedRequest, CapturedResponse, Metrics, MetricsConfig};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let config = MetricsConfig::new(
//!     "my-api-key",
//!     Arc::new(|_req| Some(serde_json::json!({"api_key": "caller-key"}))),
//! )
//! .with_buffer_length(10)
//! .with_denylist(&["password", "authorization"]);
//!
//! let metrics = Metrics::new(config).expect("valid configuration");
//!
//! let request = CapturedRequest::new("GET", "https://api.example.com/v1/pets");
//! let response = CapturedResponse::new("200 OK", Vec::new(), None);
//! let documentation_url = metrics.process(&request, &response).await;
//! # let _ = documentation_url;
//! # }
//! ```

mod base_url;
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod group;
pub mod payload;
pub mod publisher;
pub mod queue;
pub mod redaction;

pub use capture::{CapturedRequest, CapturedResponse};
pub use config::{GroupingFn, MetricsConfig, DEFAULT_METRICS_API};
pub use controller::{Metrics, DOCUMENTATION_HEADER};
pub use error::MetricsError;
pub use group::Group;
pub use payload::{LogEntry, PayloadBuilder};
pub use publisher::{BackoffState, Publisher};
pub use queue::PayloadQueue;
