// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that can occur inside the SDK. None of these ever propagate into
/// the host application's request path; public entry points log and swallow.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Base URL lookup failed: {0}")]
    BaseUrlLookup(String),

    #[error("Delivery failed with status {status}: {body}")]
    Delivery { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MetricsError::InvalidConfig("missing API key".to_string());
        assert_eq!(error.to_string(), "Invalid configuration: missing API key");
    }

    #[test]
    fn test_delivery_error_display() {
        let error = MetricsError::Delivery {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Delivery failed with status 429: slow down"
        );
    }

    #[test]
    fn test_error_debug() {
        let error = MetricsError::BaseUrlLookup("timed out".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("BaseUrlLookup"));
    }
}
