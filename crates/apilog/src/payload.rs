// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::capture::{split_status_line, CapturedRequest, CapturedResponse};
use crate::config::{GroupingFn, MetricsConfig};
use crate::group::{validate_group, Group};
use crate::redaction::{redact_map, redact_pairs};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

const NOT_VALID_UTF8: &str = "[NOT VALID UTF-8]";
const NOT_SERIALIZABLE: &str = "[ERROR: NOT SERIALIZABLE]";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// The unit stored in the queue and delivered to the remote API. HAR-style
/// envelope: one log with one entry per captured exchange.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub group: Group,
    #[serde(rename = "clientIPAddress")]
    pub client_ip_address: String,
    pub development: bool,
    pub request: RequestLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    pub log: Log,
}

#[derive(Debug, Clone, Serialize)]
pub struct Log {
    pub creator: Creator,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Creator {
    pub name: &'static str,
    pub version: &'static str,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub pageref: String,
    pub started_date_time: String,
    /// Elapsed request handling time in integer milliseconds.
    pub time: u64,
    pub request: HarRequest,
    pub response: HarResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub headers: Vec<NameValue>,
    pub query_string: Vec<NameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<NameValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<NameValue>,
    pub content: Content,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub text: String,
    pub size: u64,
    pub mime_type: String,
}

/// Builds [`LogEntry`] documents from captured request/response pairs,
/// applying redaction and identity validation on the way.
pub struct PayloadBuilder {
    denylist: Vec<String>,
    allowlist: Vec<String>,
    development_mode: bool,
    grouping_function: GroupingFn,
}

impl PayloadBuilder {
    pub fn new(config: &MetricsConfig) -> Self {
        PayloadBuilder {
            denylist: config.denylist.clone(),
            allowlist: config.allowlist.clone(),
            development_mode: config.development_mode,
            grouping_function: config.grouping_function.clone(),
        }
    }

    /// Returns `None` when the request must not be logged: the grouping
    /// callback signalled skip, the identity failed validation, or the
    /// captured data could not be assembled. The host application never
    /// observes a failure either way.
    pub fn build(
        &self,
        request: &CapturedRequest,
        response: &CapturedResponse,
        entry_id: &str,
    ) -> Option<LogEntry> {
        let group = validate_group((self.grouping_function)(request))?;

        let Some((status, status_text)) = split_status_line(&response.status) else {
            debug!(
                "Could not parse status line {:?}; not logging this request",
                response.status
            );
            return None;
        };

        let elapsed_millis = request.started_instant.elapsed().as_millis() as u64;

        Some(LogEntry {
            id: entry_id.to_string(),
            group,
            client_ip_address: request.remote_addr.clone(),
            development: self.development_mode,
            request: RequestLog {
                log: Log {
                    creator: Creator {
                        name: env!("CARGO_PKG_NAME"),
                        version: env!("CARGO_PKG_VERSION"),
                        comment: format!(
                            "{}-{}",
                            std::env::consts::ARCH,
                            std::env::consts::OS
                        ),
                    },
                    entries: vec![Entry {
                        pageref: request.full_url(),
                        started_date_time: request
                            .started_at
                            .format("%Y-%m-%dT%H:%M:%SZ")
                            .to_string(),
                        time: elapsed_millis,
                        request: self.build_request(request),
                        response: self.build_response(status, status_text, response),
                    }],
                },
            },
        })
    }

    fn build_request(&self, request: &CapturedRequest) -> HarRequest {
        let headers = redact_pairs(&request.headers, &self.allowlist, &self.denylist);
        let content_type = pair_lookup(&headers, "content-type")
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let query_pairs: Vec<(String, String)> =
            url::form_urlencoded::parse(request.query_string.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
        let query_string = to_name_values(redact_pairs(
            &query_pairs,
            &self.allowlist,
            &self.denylist,
        ));

        let post_data = request
            .body
            .as_ref()
            .filter(|body| !body.is_empty())
            .map(|body| {
                if content_type == FORM_URLENCODED {
                    let params = url::form_urlencoded::parse(body)
                        .map(|(name, value)| NameValue {
                            name: name.into_owned(),
                            value: value.into_owned(),
                        })
                        .collect();
                    PostData {
                        mime_type: content_type.clone(),
                        text: None,
                        params: Some(params),
                    }
                } else {
                    self.process_body(&content_type, body)
                }
            });

        HarRequest {
            method: request.method.clone(),
            url: request.full_url(),
            http_version: request.http_version.clone(),
            headers: to_name_values(headers),
            query_string,
            post_data,
        }
    }

    fn build_response(
        &self,
        status: u16,
        status_text: String,
        response: &CapturedResponse,
    ) -> HarResponse {
        let headers = redact_pairs(&response.headers, &self.allowlist, &self.denylist);
        let parse_content_type = pair_lookup(&headers, "content-type")
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let body = response.body.as_deref().unwrap_or_default();

        HarResponse {
            status,
            status_text,
            headers: to_name_values(headers),
            content: Content {
                text: self
                    .process_body(&parse_content_type, body)
                    .text
                    .unwrap_or_default(),
                size: response.content_length,
                mime_type: response.content_type.clone(),
            },
        }
    }

    /// Classifies a body for the payload. Non-UTF-8 content and content
    /// that cannot be re-serialized are replaced with diagnostic
    /// placeholders; JSON objects get their top level redacted; anything
    /// else is passed through as text.
    fn process_body(&self, content_type: &str, body: &[u8]) -> PostData {
        let text = match std::str::from_utf8(body) {
            Ok(text) => text,
            Err(_) => {
                return PostData {
                    mime_type: content_type.to_string(),
                    text: Some(NOT_VALID_UTF8.to_string()),
                    params: None,
                }
            }
        };

        let redacting = !self.denylist.is_empty() || !self.allowlist.is_empty();
        let text = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) if redacting => {
                let redacted = redact_map(&fields, &self.allowlist, &self.denylist);
                serde_json::to_string(&Value::Object(redacted))
                    .unwrap_or_else(|_| NOT_SERIALIZABLE.to_string())
            }
            _ => text.to_string(),
        };

        PostData {
            mime_type: content_type.to_string(),
            text: Some(text),
            params: None,
        }
    }
}

fn to_name_values(pairs: Vec<(String, String)>) -> Vec<NameValue> {
    pairs
        .into_iter()
        .map(|(name, value)| NameValue { name, value })
        .collect()
}

fn pair_lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
