// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::MetricsError;
use crate::publisher::SDK_USER_AGENT;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    #[serde(rename = "baseUrl")]
    base_url: String,
}

/// Resolves the project base URL for the documentation-URL header. Returns
/// an empty string on any failure so the header simply goes absent; callers
/// cache the result for the life of the process.
pub(crate) async fn get_project_base_url(
    client: &reqwest::Client,
    metrics_api: &str,
    api_key: &str,
    timeout: Duration,
) -> String {
    match fetch_base_url(client, metrics_api, api_key, timeout).await {
        Ok(base_url) => base_url,
        Err(e) => {
            debug!("Failed to resolve project base URL: {e}");
            String::new()
        }
    }
}

async fn fetch_base_url(
    client: &reqwest::Client,
    metrics_api: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<String, MetricsError> {
    let response = client
        .get(format!("{}/v1", metrics_api.trim_end_matches('/')))
        .basic_auth(api_key, Some(""))
        .header(reqwest::header::USER_AGENT, SDK_USER_AGENT)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(MetricsError::BaseUrlLookup(format!(
            "service responded with status {status}"
        )));
    }

    let project: ProjectInfo = response.json().await?;
    Ok(project.base_url)
}
