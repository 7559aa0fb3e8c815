// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Normalized view of an inbound request, populated by a host-framework
/// adapter. The core never branches on host-framework identity; anything
/// that can fill these fields can be instrumented.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Full URL without the query string, e.g. `https://api.example.com/v1/pets`.
    pub url: String,
    pub http_version: String,
    /// Ordered header pairs as received.
    pub headers: Vec<(String, String)>,
    /// Raw query string without the leading `?`.
    pub query_string: String,
    pub body: Option<Bytes>,
    /// Transport-layer remote address.
    pub remote_addr: String,
    /// Host/authority the client addressed, used by the allowed-hosts filter.
    pub host: String,
    /// Wall-clock capture-start time, stamped by the adapter before the host
    /// application runs.
    pub started_at: DateTime<Utc>,
    /// Monotonic capture-start time; elapsed time is measured against this
    /// so it can never go negative.
    pub started_instant: Instant,
}

impl CapturedRequest {
    pub fn new(method: &str, url: &str) -> Self {
        CapturedRequest {
            method: method.to_string(),
            url: url.to_string(),
            http_version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            query_string: String::new(),
            body: None,
            remote_addr: String::new(),
            host: String::new(),
            started_at: Utc::now(),
            started_instant: Instant::now(),
        }
    }

    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// The request URL with the query string appended when one is present.
    pub fn full_url(&self) -> String {
        if self.query_string.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, self.query_string)
        }
    }
}

/// Normalized view of the response the host application produced.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// Status line, either `"200 OK"` or a bare `"200"`.
    pub status: String,
    pub headers: Vec<(String, String)>,
    /// Content type as reported by the adapter; filled from the headers when
    /// the adapter leaves it empty.
    pub content_type: String,
    /// Content length as reported by the adapter; filled from the headers or
    /// the body when absent.
    pub content_length: u64,
    pub body: Option<Bytes>,
}

impl CapturedResponse {
    pub fn new(status: &str, headers: Vec<(String, String)>, body: Option<Bytes>) -> Self {
        let content_type = header_lookup(&headers, "content-type")
            .unwrap_or_default()
            .to_string();
        let content_length = header_lookup(&headers, "content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or_else(|| body.as_ref().map(|b| b.len() as u64).unwrap_or(0));

        CapturedResponse {
            status: status.to_string(),
            headers,
            content_type,
            content_length,
            body,
        }
    }
}

fn header_lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Splits a status line into its numeric code and text, e.g. `"404 Not
/// Found"` into `(404, "Not Found")`. Returns `None` when the line does not
/// start with a status code.
pub(crate) fn split_status_line(status: &str) -> Option<(u16, String)> {
    let trimmed = status.trim();
    let mut parts = trimmed.splitn(2, ' ');
    let code = parts.next()?.parse::<u16>().ok()?;
    let text = parts.next().unwrap_or("").to_string();
    Some((code, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_appends_query_string() {
        let mut request = CapturedRequest::new("GET", "https://api.example.com/v1/pets");
        assert_eq!(request.full_url(), "https://api.example.com/v1/pets");

        request.query_string = "limit=10".to_string();
        assert_eq!(request.full_url(), "https://api.example.com/v1/pets?limit=10");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut request = CapturedRequest::new("GET", "https://api.example.com/");
        request
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_response_content_fields_fall_back_to_headers() {
        let response = CapturedResponse::new(
            "200 OK",
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Content-Length".to_string(), "12".to_string()),
            ],
            None,
        );
        assert_eq!(response.content_type, "application/json");
        assert_eq!(response.content_length, 12);
    }

    #[test]
    fn test_response_content_length_falls_back_to_body() {
        let response = CapturedResponse::new("200 OK", Vec::new(), Some(Bytes::from("hello")));
        assert_eq!(response.content_type, "");
        assert_eq!(response.content_length, 5);
    }

    #[test]
    fn test_split_status_line() {
        assert_eq!(split_status_line("200 OK"), Some((200, "OK".to_string())));
        assert_eq!(
            split_status_line("404 Not Found"),
            Some((404, "Not Found".to_string()))
        );
        assert_eq!(split_status_line("500"), Some((500, String::new())));
        assert_eq!(split_status_line("teapot"), None);
        assert_eq!(split_status_line(""), None);
    }
}
