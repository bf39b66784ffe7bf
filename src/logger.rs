use chrono::Utc;

use crate::error::HandlerError;
use crate::handler::Handler;
use crate::level::Level;
use crate::record::{Record, SourceLocation, SpanContext};
use crate::value::Attr;

/// Thin synchronous front-end over a [`Handler`], for code that does
/// not route through `tracing`.
///
/// The level methods are fire-and-forget: handler errors are reported
/// on stderr and dropped, matching the front-end contract where one
/// failing log call must not disturb the caller. Use [`Logger::log`]
/// when the error matters.
#[derive(Clone)]
pub struct Logger {
    handler: Handler,
}

impl Logger {
    pub fn new(handler: Handler) -> Logger {
        Logger { handler }
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.handler.enabled(level)
    }

    /// Returns a logger carrying extra baggage attributes.
    pub fn with(&self, attrs: impl IntoIterator<Item = Attr>) -> Logger {
        Logger {
            handler: self.handler.with_attrs(attrs),
        }
    }

    /// Returns a logger scoping subsequent attributes under `name`.
    pub fn with_group(&self, name: impl Into<String>) -> Logger {
        Logger {
            handler: self.handler.with_group(name),
        }
    }

    #[track_caller]
    pub fn debug(&self, message: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.emit(Level::DEBUG, message, attrs, None);
    }

    #[track_caller]
    pub fn info(&self, message: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.emit(Level::INFO, message, attrs, None);
    }

    #[track_caller]
    pub fn warn(&self, message: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.emit(Level::WARN, message, attrs, None);
    }

    #[track_caller]
    pub fn error(&self, message: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.emit(Level::ERROR, message, attrs, None);
    }

    /// Like the level methods, but correlated with `span`.
    #[track_caller]
    pub fn info_span(
        &self,
        span: SpanContext,
        message: &str,
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        self.emit(Level::INFO, message, attrs, Some(span));
    }

    /// Builds a record at the caller's location and handles it,
    /// returning the handler error instead of swallowing it.
    #[track_caller]
    pub fn log(
        &self,
        level: Level,
        message: &str,
        attrs: impl IntoIterator<Item = Attr>,
    ) -> Result<(), HandlerError> {
        if !self.handler.enabled(level) {
            return Ok(());
        }

        self.handler.handle(&self.record(level, message, attrs, None))
    }

    #[track_caller]
    fn emit(
        &self,
        level: Level,
        message: &str,
        attrs: impl IntoIterator<Item = Attr>,
        span: Option<SpanContext>,
    ) {
        if !self.handler.enabled(level) {
            return;
        }

        let record = self.record(level, message, attrs, span);
        if let Err(err) = self.handler.handle(&record) {
            eprintln!("failed to emit log entry: {}", err);
        }
    }

    #[track_caller]
    fn record(
        &self,
        level: Level,
        message: &str,
        attrs: impl IntoIterator<Item = Attr>,
        span: Option<SpanContext>,
    ) -> Record {
        let location = std::panic::Location::caller();

        Record {
            time: Utc::now(),
            level,
            message: message.to_string(),
            source: Some(SourceLocation {
                file: location.file().to_string(),
                line: i64::from(location.line()),
                function: String::new(),
            }),
            span,
            attrs: attrs.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::handler::HandlerOptions;
    use crate::sink::BufferSink;

    use super::*;

    fn logger_with(options: HandlerOptions) -> (Logger, BufferSink) {
        let sink = BufferSink::new();
        let handler = Handler::new(Arc::new(sink.clone()), options);
        (Logger::new(handler), sink)
    }

    fn last_entry(sink: &BufferSink) -> serde_json::Value {
        let lines = sink.lines();
        serde_json::from_str(lines.last().expect("entry written")).expect("valid JSON")
    }

    #[test]
    fn level_methods_respect_the_minimum() {
        let (logger, sink) = logger_with(HandlerOptions::default());

        logger.debug("dropped", []);
        logger.info("kept", []);

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(last_entry(&sink)["message"], json!("kept"));
    }

    #[test]
    fn source_location_points_at_the_call_site() {
        let options = HandlerOptions {
            add_source: true,
            ..HandlerOptions::default()
        };
        let (logger, sink) = logger_with(options);

        logger.warn("careful", []);

        let entry = last_entry(&sink);
        let location = &entry["logging.googleapis.com/sourceLocation"];
        assert_eq!(location["file"], json!(file!()));
        assert!(location["line"].is_string());
    }

    #[test]
    fn with_derives_an_independent_logger() {
        let (logger, sink) = logger_with(HandlerOptions::default());
        let derived = logger.with([Attr::string("component", "db")]);

        derived.info("hi", []);
        assert_eq!(
            last_entry(&sink)["message"],
            json!({"message": "hi", "component": "db"})
        );

        logger.info("hi", []);
        assert_eq!(last_entry(&sink)["message"], json!("hi"));
    }
}
