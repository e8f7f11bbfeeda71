//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `date_warning_notice`.
//! Role: Shared contract helper for CLI diagnostics (non-error events).
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use serde_json::{Map, Value, json};

use crate::core::date::DateParseWarning;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub file: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("file".to_string(), json!(notice.file));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// Wraps an unparseable `Information Date` as a `date_parse` notice.
pub fn date_warning_notice(
    warning: &DateParseWarning,
    cmd: &str,
    file: &str,
    time: String,
) -> Notice {
    let details = match serde_json::to_value(warning) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    Notice {
        kind: "date_parse".to_string(),
        time,
        cmd: cmd.to_string(),
        file: file.to_string(),
        message: warning.message(),
        details,
    }
}
