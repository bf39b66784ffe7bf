use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::handler::Handler;
use crate::level::Level;
use crate::record::{Record, SourceLocation, SpanContext};
use crate::value::{Attr, Value};

/// `tracing_subscriber` layer that converts events into [`Record`]s and
/// hands them to a [`Handler`] synchronously.
///
/// Scalar event fields become record attributes; the `message` field
/// becomes the record message; `trace_id`, `span_id` and
/// `trace_sampled` fields are lifted into the record's span context so
/// entries correlate with a distributed trace. Handler failures are
/// counted and printed to stderr, never propagated into the
/// application thread.
pub struct EntryLayer {
    handler: Handler,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully written to the sink.
    pub written_events: Arc<AtomicU64>,
    /// Rejected by the handler (encode or write failure).
    pub failed_events: Arc<AtomicU64>,
}

impl EntryLayer {
    pub fn new(handler: Handler) -> EntryLayer {
        EntryLayer {
            handler,
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Maps a `tracing` level onto the handler's level bands. `TRACE` has
/// no band of its own and sits below DEBUG.
pub fn map_level(level: &tracing::Level) -> Level {
    if *level == tracing::Level::TRACE {
        Level::new(Level::DEBUG.value() - 4)
    } else if *level == tracing::Level::DEBUG {
        Level::DEBUG
    } else if *level == tracing::Level::INFO {
        Level::INFO
    } else if *level == tracing::Level::WARN {
        Level::WARN
    } else {
        Level::ERROR
    }
}

impl<S> Layer<S> for EntryLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        self.handler.enabled(map_level(event.metadata().level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let level = map_level(event.metadata().level());
        if !self.handler.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let span = visitor.span_context();
        let record = Record {
            time: Utc::now(),
            level,
            message: visitor.message.unwrap_or_default(),
            source: Some(SourceLocation {
                file: meta.file().unwrap_or_default().to_string(),
                line: meta.line().map(i64::from).unwrap_or(0),
                function: meta.module_path().unwrap_or_default().to_string(),
            }),
            span,
            attrs: visitor.attrs,
        };

        if let Err(err) = self.handler.handle(&record) {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("failed to emit log entry: {}", err);
        } else {
            self.written_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Collects event fields into record attributes, separating the
/// message and the trace-correlation fields from ordinary payload
/// fields.
#[derive(Default)]
struct FieldVisitor {
    attrs: Vec<Attr>,
    message: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    trace_sampled: bool,
}

impl FieldVisitor {
    fn span_context(&self) -> Option<SpanContext> {
        let trace_id = self.trace_id.as_deref()?;

        Some(
            SpanContext::new(trace_id, self.span_id.clone().unwrap_or_default())
                .sampled(self.trace_sampled),
        )
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "trace_id" => self.trace_id = Some(value.to_string()),
            "span_id" => self.span_id = Some(value.to_string()),
            name => self.attrs.push(Attr::string(name, value)),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attrs.push(Attr::int(field.name(), value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.attrs.push(Attr::uint(field.name(), value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attrs.push(Attr::float(field.name(), value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "trace_sampled" {
            self.trace_sampled = value;
        } else {
            self.attrs.push(Attr::bool(field.name(), value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.attrs.push(Attr::string(field.name(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{:?}", value)),
            name => self
                .attrs
                .push(Attr::new(name, Value::String(format!("{:?}", value)))),
        }
    }
}
