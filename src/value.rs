use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::entry::{HttpRequestInfo, OperationInfo};

/// A key/value pair attached to a record or a handler.
#[derive(Debug, Clone)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: Value) -> Attr {
        Attr {
            key: key.into(),
            value,
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Attr {
        Attr::new(key, Value::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Attr {
        Attr::new(key, Value::Int(value))
    }

    pub fn uint(key: impl Into<String>, value: u64) -> Attr {
        Attr::new(key, Value::Uint(value))
    }

    pub fn float(key: impl Into<String>, value: f64) -> Attr {
        Attr::new(key, Value::Float(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Attr {
        Attr::new(key, Value::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Attr {
        Attr::new(key, Value::Duration(value))
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Attr {
        Attr::new(key, Value::Time(value))
    }

    /// An ordered collection of attributes nested under one key.
    pub fn group(key: impl Into<String>, attrs: impl IntoIterator<Item = Attr>) -> Attr {
        Attr::new(key, Value::Group(attrs.into_iter().collect()))
    }

    pub fn any(key: impl Into<String>, value: AnyValue) -> Attr {
        Attr::new(key, Value::Any(value))
    }

    /// A value computed on demand, once per handled record.
    pub fn lazy(key: impl Into<String>, f: impl Fn() -> Value + Send + Sync + 'static) -> Attr {
        Attr::new(key, Value::Lazy(Arc::new(f)))
    }
}

/// Tagged value carried by an [`Attr`].
#[derive(Clone)]
pub enum Value {
    String(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Time(DateTime<Utc>),
    /// Opaque structured payload, re-encoded by the serializer through
    /// the schema structs' own rules.
    Any(AnyValue),
    /// Ordered nested attributes.
    Group(Vec<Attr>),
    /// Deferred value. Resolved at most once per handled record and
    /// never cached, so repeated handles observe fresh values.
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
}

/// Payload shapes accepted behind [`Value::Any`]: the two structured
/// messages the reserved keys expect, plus a JSON escape hatch for
/// arbitrary serializable state.
#[derive(Debug, Clone)]
pub enum AnyValue {
    Http(HttpRequestInfo),
    Operation(OperationInfo),
    Json(serde_json::Value),
}

impl Value {
    /// Coerces this value into a plain JSON tree.
    ///
    /// Durations coerce to whole nanoseconds, timestamps to RFC 3339
    /// text, groups to objects keyed by child key. Non-finite floats
    /// coerce to `null` rather than erroring.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(v) => serde_json::Value::String(v.clone()),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Uint(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(v) => serde_json::Value::from(*v),
            Value::Duration(v) => serde_json::Value::from(duration_nanos(*v)),
            Value::Time(v) => serde_json::Value::String(format_time(*v)),
            Value::Any(AnyValue::Http(v)) => {
                serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
            }
            Value::Any(AnyValue::Operation(v)) => {
                serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
            }
            Value::Any(AnyValue::Json(v)) => v.clone(),
            Value::Group(attrs) => {
                let mut kv = serde_json::Map::new();
                for attr in attrs {
                    kv.insert(attr.key.clone(), attr.value.to_json());
                }
                serde_json::Value::Object(kv)
            }
            Value::Lazy(f) => f().to_json(),
        }
    }

    /// Canonical textual form, used for label values: scalars via their
    /// natural display, durations via their unit-suffixed text
    /// (`"1.5s"`), timestamps as RFC 3339, everything else as compact
    /// JSON.
    pub fn display(&self) -> String {
        match self {
            Value::String(v) => v.clone(),
            Value::Int(v) => v.to_string(),
            Value::Uint(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Duration(v) => format!("{:?}", v),
            Value::Time(v) => format_time(*v),
            Value::Lazy(f) => f().display(),
            other => other.to_json().to_string(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => f.debug_tuple("String").field(v).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Uint(v) => f.debug_tuple("Uint").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Duration(v) => f.debug_tuple("Duration").field(v).finish(),
            Value::Time(v) => f.debug_tuple("Time").field(v).finish(),
            Value::Any(v) => f.debug_tuple("Any").field(v).finish(),
            Value::Group(v) => f.debug_tuple("Group").field(v).finish(),
            Value::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

fn duration_nanos(d: Duration) -> u64 {
    // Saturate rather than wrap; ~584 years of nanoseconds is past any
    // latency this crate will ever see.
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars_coerce_to_themselves() {
        assert_eq!(Value::String("x".into()).to_json(), json!("x"));
        assert_eq!(Value::Int(-7).to_json(), json!(-7));
        assert_eq!(Value::Uint(7).to_json(), json!(7));
        assert_eq!(Value::Float(1.25).to_json(), json!(1.25));
        assert_eq!(Value::Bool(true).to_json(), json!(true));
    }

    #[test]
    fn duration_coerces_to_nanoseconds() {
        let value = Value::Duration(Duration::from_millis(1500));
        assert_eq!(value.to_json(), json!(1_500_000_000u64));
    }

    #[test]
    fn time_coerces_to_rfc3339() {
        let time = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let value = Value::Time(time);
        assert_eq!(value.to_json(), json!("2023-01-02T03:04:05Z"));
    }

    #[test]
    fn non_finite_float_coerces_to_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(
            Value::Float(f64::INFINITY).to_json(),
            serde_json::Value::Null
        );
    }

    #[test]
    fn group_coerces_to_nested_object() {
        let value = Value::Group(vec![
            Attr::string("name", "api"),
            Attr::group("inner", [Attr::int("count", 3)]),
        ]);

        assert_eq!(
            value.to_json(),
            json!({"name": "api", "inner": {"count": 3}})
        );
    }

    #[test]
    fn lazy_resolves_once_per_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let attr = Attr::lazy("n", move || {
            Value::Int(seen.fetch_add(1, Ordering::SeqCst) as i64)
        });

        assert_eq!(attr.value.to_json(), json!(0));
        // Never cached: the next resolution observes a fresh value.
        assert_eq!(attr.value.to_json(), json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn display_uses_canonical_text() {
        assert_eq!(Value::String("v".into()).display(), "v");
        assert_eq!(Value::Int(-3).display(), "-3");
        assert_eq!(Value::Bool(false).display(), "false");
        assert_eq!(Value::Duration(Duration::from_millis(1500)).display(), "1.5s");
        assert_eq!(Value::Duration(Duration::from_nanos(3)).display(), "3ns");
    }
}
