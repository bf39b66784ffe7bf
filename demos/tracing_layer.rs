use gcloud_log_sink::handler::HandlerOptions;
use gcloud_log_sink::init::init_tracing_with_options;
use gcloud_log_sink::sink;
use tracing::{info, warn};

// Routes ordinary tracing events through the structured handler.
fn main() {
    let options = HandlerOptions {
        project_id: "prj-d-platform-952f".to_string(),
        add_source: true,
        ..HandlerOptions::default()
    };
    init_tracing_with_options(sink::stdout(), options);

    info!(user = "ada", attempts = 3, "login accepted");
    warn!(
        trace_id = "4bf92f3577b34da6a3ce929d0e0e4736",
        span_id = "00f067aa0ba902b7",
        trace_sampled = true,
        "slow upstream call"
    );
}
