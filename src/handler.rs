use std::collections::BTreeMap;
use std::sync::Arc;

use crate::attr::{LABEL_KEY, NAME_KEY, OPERATION_KEY, REQUEST_KEY, RESPONSE_KEY};
use crate::entry::{HttpRequestInfo, LogEntry, OperationInfo, Payload};
use crate::env;
use crate::error::HandlerError;
use crate::level::{Level, LevelVar, Severity};
use crate::record::Record;
use crate::sink::LogSink;
use crate::value::{AnyValue, Attr, Value};

/// Options for a [`Handler`]. A default `HandlerOptions` consists
/// entirely of default values: no project, minimum level INFO, no
/// source capture, compact output.
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// Cloud project identifier. When empty, the resource name and the
    /// trace correlation fields are never populated.
    pub project_id: String,

    /// Minimum record level that will be logged. The handler reads the
    /// variable on every call, so sharing it allows runtime tuning.
    pub level: LevelVar,

    /// When true, the handler emits the call-site location captured by
    /// the front-end. Off by default to skip the cost of carrying it.
    pub add_source: bool,

    /// When true, entries are pretty-indented instead of compact.
    pub pretty: bool,
}

impl HandlerOptions {
    /// Options read from the process environment; see [`crate::env`]
    /// for the variable names. Unset or unparsable values fall back to
    /// the defaults.
    pub fn from_env() -> HandlerOptions {
        HandlerOptions {
            project_id: env::env_or(env::PROJECT_ID_ENV, ""),
            level: LevelVar::new(
                env::env_or(env::LOG_LEVEL_ENV, "info")
                    .parse()
                    .unwrap_or_default(),
            ),
            add_source: env::env_flag(env::LOG_SOURCE_ENV),
            pretty: env::env_flag(env::LOG_PRETTY_ENV),
        }
    }
}

/// Transforms [`Record`]s into wire-schema entries and writes each one
/// to the sink in a single call.
///
/// A handler is logically immutable after construction: [`with_attrs`]
/// and [`with_group`] derive new handlers instead of mutating, so a
/// parent and any number of derived children can be used concurrently.
///
/// [`with_attrs`]: Handler::with_attrs
/// [`with_group`]: Handler::with_group
#[derive(Clone)]
pub struct Handler {
    sink: Arc<dyn LogSink>,
    level: LevelVar,
    project: String,
    source: bool,
    pretty: bool,
    /// Baggage contributed by prior derivations, already scoped under
    /// the groups that were open when each batch was added.
    attrs: Vec<Attr>,
    /// Groups opened by [`Handler::with_group`], outermost first.
    groups: Vec<String>,
}

impl Handler {
    pub fn new(sink: Arc<dyn LogSink>, options: HandlerOptions) -> Handler {
        Handler {
            sink,
            level: options.level,
            project: options.project_id,
            source: options.add_source,
            pretty: options.pretty,
            attrs: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Reports whether a record at `level` would be handled. Pure
    /// comparison against the configured minimum; never blocks.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level.level()
    }

    /// Runs the full pipeline for one record: reserved-key extraction,
    /// label flattening, payload coercion, entry assembly and one
    /// buffered write to the sink.
    pub fn handle(&self, record: &Record) -> Result<(), HandlerError> {
        let attrs = self.combined(record);
        let extracted = self.extract(&attrs);

        let (trace, span_id, trace_sampled) = self.trace(record);

        let entry = LogEntry {
            log_name: extracted.name,
            severity: Severity::from(record.level),
            timestamp: Some(record.time),
            payload: payload(&record.message, &extracted.rest),
            labels: extracted.labels,
            http_request: extracted.request,
            operation: extracted.operation,
            source_location: if self.source {
                record.source.clone()
            } else {
                None
            },
            trace,
            span_id,
            trace_sampled,
        };

        let mut buf = if self.pretty {
            serde_json::to_vec_pretty(&entry)?
        } else {
            serde_json::to_vec(&entry)?
        };
        buf.push(b'\n');

        Ok(self.sink.write(&buf)?)
    }

    /// Returns a new handler whose baggage is this handler's baggage
    /// plus `attrs`. The parent's storage is never shared or mutated,
    /// so concurrent derivations stay independent.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attr>) -> Handler {
        let mut child = self.clone();

        let incoming: Vec<Attr> = attrs.into_iter().collect();
        if incoming.is_empty() {
            return child;
        }

        child.attrs.extend(nest(&child.groups, incoming));
        child
    }

    /// Returns a new handler that scopes all subsequently added
    /// attributes (baggage and record attributes alike) under `name`,
    /// surfacing in the payload as nested objects. An empty name opens
    /// no scope.
    pub fn with_group(&self, name: impl Into<String>) -> Handler {
        let name = name.into();
        let mut child = self.clone();

        if !name.is_empty() {
            child.groups.push(name);
        }
        child
    }

    /// Record attributes first, then baggage: on duplicate reserved
    /// keys the record wins.
    fn combined(&self, record: &Record) -> Vec<Attr> {
        let mut attrs = nest(&self.groups, record.attrs.clone());
        attrs.extend(self.attrs.iter().cloned());
        attrs
    }

    fn extract(&self, attrs: &[Attr]) -> Extracted {
        let mut name = String::new();
        let mut labels = BTreeMap::new();
        let mut request: Option<HttpRequestInfo> = None;
        let mut response: Option<HttpRequestInfo> = None;
        let mut operation: Option<OperationInfo> = None;
        let mut rest = Vec::new();

        // First type-matching occurrence wins per reserved key. A
        // reserved key with the wrong shape is consumed and dropped:
        // a malformed attribute must never break the logging path.
        for attr in attrs {
            match attr.key.as_str() {
                NAME_KEY => {
                    if name.is_empty() && !self.project.is_empty() {
                        if let Value::String(value) = &attr.value {
                            name = self.path("logs", &urlencoding::encode(value));
                        }
                    }
                }
                LABEL_KEY => {
                    if labels.is_empty() {
                        if let Value::Group(items) = &attr.value {
                            for item in items {
                                flatten_value(item.key.clone(), &item.value, &mut labels);
                            }
                        }
                    }
                }
                REQUEST_KEY => {
                    if request.is_none() {
                        if let Value::Any(AnyValue::Http(info)) = &attr.value {
                            request = Some(info.clone());
                        }
                    }
                }
                RESPONSE_KEY => {
                    if response.is_none() {
                        if let Value::Any(AnyValue::Http(info)) = &attr.value {
                            response = Some(info.clone());
                        }
                    }
                }
                OPERATION_KEY => {
                    if operation.is_none() {
                        if let Value::Any(AnyValue::Operation(info)) = &attr.value {
                            operation = Some(info.clone());
                        }
                    }
                }
                _ => rest.push(attr.clone()),
            }
        }

        // Request and response describe complementary halves of one
        // exchange; the response's status and size overlay the request.
        let request = match (request, response) {
            (None, None) => None,
            (request, response) => {
                let mut merged = request.unwrap_or_default();
                if let Some(response) = response {
                    merged.status = response.status;
                    merged.response_size = response.response_size;
                }
                Some(merged)
            }
        };

        Extracted {
            name,
            labels,
            request,
            operation,
            rest,
        }
    }

    fn trace(&self, record: &Record) -> (String, String, bool) {
        if !self.project.is_empty() {
            if let Some(span) = record.span.as_ref().filter(|span| span.is_valid()) {
                return (
                    self.path("traces", &span.trace_id),
                    span.span_id.clone(),
                    span.sampled,
                );
            }
        }

        (String::new(), String::new(), false)
    }

    fn path(&self, kind: &str, value: &str) -> String {
        format!("projects/{}/{}/{}", self.project, kind, value)
    }
}

struct Extracted {
    name: String,
    labels: BTreeMap<String, String>,
    request: Option<HttpRequestInfo>,
    operation: Option<OperationInfo>,
    rest: Vec<Attr>,
}

/// Wraps `attrs` into the open group scopes, innermost last.
fn nest(groups: &[String], attrs: Vec<Attr>) -> Vec<Attr> {
    if attrs.is_empty() {
        return attrs;
    }

    let mut attrs = attrs;
    for group in groups.iter().rev() {
        attrs = vec![Attr::group(group.clone(), attrs)];
    }
    attrs
}

/// Flattens the labels group depth-first into dotted keys.
fn flatten_value(key: String, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Group(items) => {
            for item in items {
                flatten_value(format!("{}.{}", key, item.key), &item.value, out);
            }
        }
        Value::Lazy(f) => flatten_value(key, &f(), out),
        leaf => {
            out.insert(key, leaf.display());
        }
    }
}

fn payload(message: &str, rest: &[Attr]) -> Payload {
    if rest.is_empty() {
        return Payload::Text(message.to_string());
    }

    let mut props = serde_json::Map::new();
    for attr in rest {
        merge_property(&mut props, attr.key.clone(), attr.value.to_json());
    }
    // The injected message field wins over a caller-supplied collision.
    props.insert(
        "message".to_string(),
        serde_json::Value::String(message.to_string()),
    );

    Payload::Json(props)
}

/// Inserts `value` under `key`, deep-merging objects so that attribute
/// groups added under the same scope accumulate instead of clobbering
/// each other.
fn merge_property(
    props: &mut serde_json::Map<String, serde_json::Value>,
    key: String,
    value: serde_json::Value,
) {
    let mergeable = matches!(
        (props.get(&key), &value),
        (Some(serde_json::Value::Object(_)), serde_json::Value::Object(_))
    );

    if !mergeable {
        props.insert(key, value);
        return;
    }

    if let (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) =
        (props.get_mut(&key), value)
    {
        for (k, v) in incoming {
            merge_property(existing, k, v);
        }
    }
}
