use std::sync::Arc;

use gcloud_log_sink::attr;
use gcloud_log_sink::handler::{Handler, HandlerOptions};
use gcloud_log_sink::logger::Logger;
use gcloud_log_sink::sink;
use gcloud_log_sink::value::Attr;

// Walks through the attribute constructors the way an HTTP middleware
// would use them: a service-wide logger with name and labels, a
// per-request derived logger, and an operation start/end pair around
// the handler.
fn main() {
    let options = HandlerOptions {
        project_id: "prj-d-platform-952f".to_string(),
        ..HandlerOptions::default()
    };
    let handler = Handler::new(sink::stderr(), options);

    let logger = Logger::new(handler).with([
        attr::name("run.googleapis.com/user-api"),
        attr::label([
            Attr::string("my_org", "cliche-press"),
            Attr::group(
                "my_app",
                [Attr::group(
                    "service",
                    [
                        Attr::string("name", "user-api"),
                        Attr::string("version", "v1.0"),
                        Attr::string("revision", "ee2c1207"),
                    ],
                )],
            ),
        ]),
    ]);

    let request = http::Request::builder()
        .method("GET")
        .uri("http://127.0.0.1:9292/")
        .version(http::Version::HTTP_11)
        .header("user-agent", "curl/8.5.0")
        .body(())
        .expect("build request");

    let logger = logger.with([attr::request(&request)]);
    logger.info("request received", []);

    let id = "2f33e306-158f-4e5b-8d9a-3f1c1d2a4b10";
    let procedure = "acme.foo.v1.FooService/Bar";
    logger.info("execution started", [attr::operation_start(id, procedure)]);

    let response = http::Response::builder()
        .status(200)
        .header("content-length", "5")
        .body(())
        .expect("build response");

    logger.info("execution finished", [attr::operation_end(id, procedure)]);
    logger.info("request completed", [attr::response(&response)]);
}
