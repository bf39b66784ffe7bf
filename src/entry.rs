use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::level::Severity;
use crate::record::SourceLocation;

/// HTTP request metadata in the output schema shape.
///
/// One value describes both sides of an exchange: the `request`
/// attribute fills the request-side fields and a `response` attribute
/// for the same log call overlays `status` and `response_size`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_url: String,
    #[serde(skip_serializing_if = "is_zero_i64", serialize_with = "int64_as_string")]
    pub request_size: i64,
    #[serde(skip_serializing_if = "is_zero_i64", serialize_with = "int64_as_string")]
    pub response_size: i64,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub status: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub remote_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub referer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "duration_as_seconds"
    )]
    pub latency: Option<Duration>,
}

/// One step of a multi-step logical operation, used to correlate a
/// start/continue/end sequence of entries sharing the same id and
/// producer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub producer: String,
    #[serde(skip_serializing_if = "is_false")]
    pub first: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub last: bool,
}

/// Entry payload. Exactly one of the two forms is ever set: a record
/// with no leftover attributes carries its raw message as text, any
/// other record carries a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Map<String, serde_json::Value>),
}

/// The fully assembled output record, shaped after the wire schema.
///
/// Write-once per handle call: the handler builds it, serializes it,
/// and discards it.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub log_name: String,
    pub severity: Severity,
    pub timestamp: Option<DateTime<Utc>>,
    pub payload: Payload,
    pub labels: BTreeMap<String, String>,
    pub http_request: Option<HttpRequestInfo>,
    pub operation: Option<OperationInfo>,
    pub source_location: Option<SourceLocation>,
    pub trace: String,
    pub span_id: String,
    pub trace_sampled: bool,
}

impl Serialize for LogEntry {
    /// Renders the entry with the schema's external key names, omitting
    /// every zero-valued field.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry("severity", self.severity.as_str())?;

        if let Some(timestamp) = &self.timestamp {
            map.serialize_entry("timestamp", timestamp)?;
        }

        if !self.log_name.is_empty() {
            map.serialize_entry("logName", &self.log_name)?;
        }

        if let Some(request) = &self.http_request {
            map.serialize_entry("httpRequest", request)?;
        }

        match &self.payload {
            Payload::Text(message) => {
                if !message.is_empty() {
                    map.serialize_entry("message", message)?;
                }
            }
            Payload::Json(props) => {
                map.serialize_entry("message", props)?;
            }
        }

        if !self.labels.is_empty() {
            map.serialize_entry("logging.googleapis.com/labels", &self.labels)?;
        }

        if let Some(operation) = &self.operation {
            map.serialize_entry("logging.googleapis.com/operation", operation)?;
        }

        if let Some(location) = &self.source_location {
            map.serialize_entry("logging.googleapis.com/sourceLocation", location)?;
        }

        if !self.span_id.is_empty() {
            map.serialize_entry("logging.googleapis.com/spanId", &self.span_id)?;
        }

        if !self.trace.is_empty() {
            map.serialize_entry("logging.googleapis.com/trace", &self.trace)?;
        }

        if self.trace_sampled {
            map.serialize_entry("logging.googleapis.com/trace_sampled", &self.trace_sampled)?;
        }

        map.end()
    }
}

pub(crate) fn is_false(v: &bool) -> bool {
    !*v
}

pub(crate) fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

pub(crate) fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

/// Serializes an int64 quantity as a decimal string, following the
/// schema's JSON convention for 64-bit integers.
pub(crate) fn int64_as_string<S: Serializer>(v: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(v)
}

fn duration_as_seconds<S: Serializer>(
    d: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => serializer.serialize_str(&format_seconds(*d)),
        None => serializer.serialize_none(),
    }
}

/// Seconds string in the wire duration convention: whole seconds with a
/// 3, 6 or 9 digit fraction, e.g. `"3s"`, `"0.000340s"`.
fn format_seconds(d: Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();

    if nanos == 0 {
        format!("{}s", secs)
    } else if nanos % 1_000_000 == 0 {
        format!("{}.{:03}s", secs, nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!("{}.{:06}s", secs, nanos / 1_000)
    } else {
        format!("{}.{:09}s", secs, nanos)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn empty_entry() -> LogEntry {
        LogEntry {
            log_name: String::new(),
            severity: Severity::Info,
            timestamp: Some(Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap()),
            payload: Payload::Text("hi".into()),
            labels: BTreeMap::new(),
            http_request: None,
            operation: None,
            source_location: None,
            trace: String::new(),
            span_id: String::new(),
            trace_sampled: false,
        }
    }

    #[test]
    fn zero_valued_fields_are_omitted() {
        let json = serde_json::to_value(empty_entry()).expect("serialize entry");
        let object = json.as_object().expect("entry is an object");

        assert_eq!(object.len(), 3);
        assert_eq!(json["severity"], json!("INFO"));
        assert_eq!(json["message"], json!("hi"));
        let timestamp = json["timestamp"].as_str().expect("timestamp is a string");
        assert!(timestamp.starts_with("2023-01-02T03:04:05"));

        assert!(object.get("httpRequest").is_none());
        assert!(object.get("logging.googleapis.com/operation").is_none());
        assert!(object.get("logging.googleapis.com/trace_sampled").is_none());
    }

    #[test]
    fn structured_fields_use_external_names() {
        let mut entry = empty_entry();
        entry.http_request = Some(HttpRequestInfo {
            request_method: "GET".into(),
            request_url: "http://example.com/x".into(),
            response_size: 42,
            status: 200,
            latency: Some(Duration::from_micros(340)),
            ..HttpRequestInfo::default()
        });
        entry.operation = Some(OperationInfo {
            id: "op-1".into(),
            producer: "svc".into(),
            first: true,
            last: false,
        });
        entry.source_location = Some(SourceLocation {
            file: "src/main.rs".into(),
            line: 42,
            function: "main".into(),
        });

        let json = serde_json::to_value(&entry).expect("serialize entry");

        assert_eq!(
            json["httpRequest"],
            json!({
                "requestMethod": "GET",
                "requestUrl": "http://example.com/x",
                "responseSize": "42",
                "status": 200,
                "latency": "0.000340s",
            })
        );
        assert_eq!(
            json["logging.googleapis.com/operation"],
            json!({"id": "op-1", "producer": "svc", "first": true})
        );
        assert_eq!(
            json["logging.googleapis.com/sourceLocation"],
            json!({"file": "src/main.rs", "line": "42", "function": "main"})
        );
    }

    #[test]
    fn trace_fields_serialize_when_present() {
        let mut entry = empty_entry();
        entry.trace = "projects/proj1/traces/abc".into();
        entry.span_id = "0000000000000001".into();
        entry.trace_sampled = true;

        let json = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(json["logging.googleapis.com/trace"], json!("projects/proj1/traces/abc"));
        assert_eq!(json["logging.googleapis.com/spanId"], json!("0000000000000001"));
        assert_eq!(json["logging.googleapis.com/trace_sampled"], json!(true));
    }

    #[test]
    fn seconds_formatting_matches_wire_convention() {
        assert_eq!(format_seconds(Duration::from_secs(3)), "3s");
        assert_eq!(format_seconds(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_seconds(Duration::from_micros(340)), "0.000340s");
        assert_eq!(format_seconds(Duration::from_nanos(7)), "0.000000007s");
    }

    #[test]
    fn empty_text_payload_is_omitted() {
        let mut entry = empty_entry();
        entry.payload = Payload::Text(String::new());

        let json = serde_json::to_value(&entry).expect("serialize entry");
        assert!(json.get("message").is_none());
    }
}
