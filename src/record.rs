use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::level::Level;
use crate::value::Attr;

/// Call-site position of a log statement, captured by the front-end at
/// the moment the log call was issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(
        skip_serializing_if = "crate::entry::is_zero_i64",
        serialize_with = "crate::entry::int64_as_string"
    )]
    pub line: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub function: String,
}

/// Distributed-trace span active at the call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
    pub sampled: bool,
}

impl SpanContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> SpanContext {
        SpanContext {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            sampled: false,
        }
    }

    pub fn sampled(mut self, sampled: bool) -> SpanContext {
        self.sampled = sampled;
        self
    }

    /// A span without a trace id cannot be correlated and is ignored.
    pub fn is_valid(&self) -> bool {
        !self.trace_id.is_empty()
    }
}

/// One structured log event handed to a handler.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub source: Option<SourceLocation>,
    pub span: Option<SpanContext>,
    pub attrs: Vec<Attr>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Record {
        Record {
            time: Utc::now(),
            level,
            message: message.into(),
            source: None,
            span: None,
            attrs: Vec::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Record {
        self.attrs.extend(attrs);
        self
    }

    pub fn with_source(mut self, source: SourceLocation) -> Record {
        self.source = Some(source);
        self
    }

    pub fn with_span(mut self, span: SpanContext) -> Record {
        self.span = Some(span);
        self
    }
}
