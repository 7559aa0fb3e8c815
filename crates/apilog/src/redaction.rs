// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::{Map, Value};

/// Replacement for a redacted value. String values keep their character
/// count in the marker so a consumer can tell "present but hidden" apart
/// from "absent" while leaking only the length; everything else gets the
/// length-less marker.
fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_str(s)),
        _ => Value::String("[REDACTED]".to_string()),
    }
}

fn redact_str(value: &str) -> String {
    format!("[REDACTED {}]", value.chars().count())
}

fn should_redact(key: &str, allowlist: &[String], denylist: &[String]) -> bool {
    // Denylist wins over allowlist for overlapping keys.
    if !denylist.is_empty() && denylist.iter().any(|k| k == key) {
        return true;
    }
    if !allowlist.is_empty() && !allowlist.iter().any(|k| k == key) {
        return true;
    }
    false
}

/// Applies the allow/deny lists to the top level of a JSON mapping and
/// returns a redacted copy. The source mapping is never mutated. Nested
/// structures are not recursed into; re-running over an already-redacted
/// mapping replaces markers with markers sized to the marker text, which is
/// why redaction is applied exactly once per payload.
pub fn redact_map(
    mapping: &Map<String, Value>,
    allowlist: &[String],
    denylist: &[String],
) -> Map<String, Value> {
    if allowlist.is_empty() && denylist.is_empty() {
        return mapping.clone();
    }

    mapping
        .iter()
        .map(|(key, value)| {
            if should_redact(key, allowlist, denylist) {
                (key.clone(), redact_value(value))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

/// Same contract as [`redact_map`] for ordered name/value pairs (headers,
/// decoded query strings). Order is preserved.
pub fn redact_pairs(
    pairs: &[(String, String)],
    allowlist: &[String],
    denylist: &[String],
) -> Vec<(String, String)> {
    if allowlist.is_empty() && denylist.is_empty() {
        return pairs.to_vec();
    }

    pairs
        .iter()
        .map(|(key, value)| {
            if should_redact(key, allowlist, denylist) {
                (key.clone(), redact_str(value))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}
