//! Phoenix channel frames used by the realtime endpoint.

use chrono::{DateTime, Utc};
use cinesync_core::serde::parse_timestamp;
use cinesync_core::store::{ChangeEvent, ChangeKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::{ClientError, Result};

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";

/// One frame of the Phoenix v1 JSON serializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Channel topic for a table.
pub fn topic_for(schema: &str, table: &str) -> String {
    format!("realtime:{schema}:{table}")
}

/// Join request subscribing to every change of `schema.table`.
pub fn join_message(schema: &str, table: &str, reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic_for(schema, table),
        event: EVENT_JOIN.to_string(),
        payload: json!({
            "config": {
                "broadcast": {"self": false},
                "presence": {"key": ""},
                "postgres_changes": [
                    {"event": "*", "schema": schema, "table": table}
                ]
            }
        }),
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_message(reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: PHOENIX_TOPIC.to_string(),
        event: EVENT_HEARTBEAT.to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Wire shape of a change notification.
#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type", alias = "eventType")]
    kind: ChangeKind,
    table: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
    #[serde(default)]
    commit_timestamp: Option<String>,
}

/// Extracts a row change from a frame, if it carries one.
///
/// Accepts both the `postgres_changes` envelope (`payload.data`) and the
/// older per-kind events whose payload is the change itself.
pub fn parse_change(message: &PhoenixMessage) -> Option<ChangeEvent> {
    let data = match message.event.as_str() {
        EVENT_POSTGRES_CHANGES => message.payload.get("data")?,
        "INSERT" | "UPDATE" | "DELETE" => &message.payload,
        _ => return None,
    };
    let data: ChangeData = serde_json::from_value(data.clone()).ok()?;
    let commit_timestamp: Option<DateTime<Utc>> =
        data.commit_timestamp.as_deref().and_then(parse_timestamp);
    Some(ChangeEvent {
        table: data.table,
        kind: data.kind,
        old: data.old_record.filter(non_empty),
        new: data.record.filter(non_empty),
        commit_timestamp,
    })
}

fn non_empty(row: &Value) -> bool {
    match row {
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

/// True when a `phx_reply` reports anything but `ok`.
pub fn reply_error(message: &PhoenixMessage) -> Option<String> {
    if message.event != EVENT_REPLY {
        return None;
    }
    let status = message.payload.get("status").and_then(Value::as_str)?;
    if status == "ok" {
        return None;
    }
    let reason = message
        .payload
        .pointer("/response/reason")
        .and_then(Value::as_str)
        .unwrap_or(status);
    Some(reason.to_string())
}

/// WebSocket endpoint for a project URL: `{base}/realtime/v1/websocket`.
pub fn realtime_endpoint(base_url: &Url, api_key: &str) -> Result<Url> {
    let mut url = base_url.join("realtime/v1/websocket")?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ClientError::InvalidInput(format!(
                "unsupported URL scheme: {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidInput(format!("cannot switch scheme to {scheme}")))?;
    url.query_pairs_mut()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}
