use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::handler::{Handler, HandlerOptions};
use crate::layer::EntryLayer;
use crate::sink::LogSink;

/// Install a global `tracing` subscriber that renders every event as a
/// structured entry on the provided sink.
///
/// **Parameters**
/// - `sink`: destination for serialized entries.
/// - `options`: [`HandlerOptions`] controlling project id, minimum
///   level, source capture and pretty printing.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with an [`EntryLayer`] as the
/// global default subscriber. It may be called once per process;
/// calling it again panics, which keeps initialization races loud
/// instead of silently split between two subscribers.
pub fn init_tracing_with_options(sink: Arc<dyn LogSink>, options: HandlerOptions) {
    let handler = Handler::new(sink, options);
    let subscriber = Registry::default().with(EntryLayer::new(handler));

    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
}

/// Initialize tracing with options read from the environment.
///
/// Equivalent to calling [`init_tracing_with_options`] with
/// [`HandlerOptions::from_env`]. This is the recommended entrypoint
/// for services deployed on the target platform, where the project id
/// arrives via `GOOGLE_CLOUD_PROJECT`.
pub fn init_tracing(sink: Arc<dyn LogSink>) {
    init_tracing_with_options(sink, HandlerOptions::from_env());
}
