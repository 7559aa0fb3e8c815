// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};
use tracing::{error, warn};

/// Caller identity attached to every log entry, produced by validating the
/// value returned from the user-supplied grouping callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One-way, length-revealing masking for API keys:
/// `sha512-<base64 digest>?<last 4 chars>`. The suffix lets the key be
/// identified in a list without exposing it.
pub(crate) fn mask(api_key: &str) -> String {
    let digest = Sha512::digest(api_key.as_bytes());
    let encoded = base64::engine::general_purpose::STANDARD.encode(digest);
    let suffix_start = api_key
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("sha512-{}?{}", encoded, &api_key[suffix_start..])
}

fn take_optional_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(_) => {
            warn!("Grouping function returned a non-string '{key}' field; discarding the field and logging request anyway");
            None
        }
        None => {
            warn!("Grouping function response missing '{key}' field; logging request anyway");
            None
        }
    }
}

/// Validates the raw grouping-callback result. Returns `None` when the
/// request must not be logged: the callback signalled skip, the value is not
/// a mapping, or no usable identity field is present.
///
/// A legacy `api_key` field is aliased into `id` and masked; an explicit
/// `id` is passed through verbatim. That asymmetry is intentional
/// backward-compatibility behavior.
pub(crate) fn validate_group(raw: Option<Value>) -> Option<Group> {
    let value = raw?;

    let Value::Object(mut fields) = value else {
        error!("Grouping function returned a non-mapping value; not logging this request");
        return None;
    };

    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(_) => {
            error!("Grouping function returned a non-string 'id' field; not logging this request");
            return None;
        }
        None => match fields.remove("api_key") {
            Some(Value::String(api_key)) => mask(&api_key),
            Some(_) => {
                error!("Grouping function returned a non-string 'api_key' field; not logging this request");
                return None;
            }
            None => {
                error!("Grouping function response missing 'api_key' field; not logging this request");
                return None;
            }
        },
    };

    let email = take_optional_string(&mut fields, "email");
    let label = take_optional_string(&mut fields, "label");

    if !fields.is_empty() {
        let extra: Vec<&str> = fields.keys().map(String::as_str).collect();
        warn!(
            "Grouping function included unexpected field(s) in response: {extra:?}; discarding those fields and logging request anyway"
        );
    }

    Some(Group { id, label, email })
}
