use http::header::{CONTENT_LENGTH, REFERER, USER_AGENT};
use http::HeaderMap;

use crate::entry::{HttpRequestInfo, OperationInfo};
use crate::value::{AnyValue, Attr, Value};

/// Reserved attribute keys. An attribute using one of these keys is
/// consumed by the handler instead of landing in the payload; a
/// reserved attribute with an unexpected value shape is dropped
/// silently.
pub const NAME_KEY: &str = "name";
pub const ERROR_KEY: &str = "error";
pub const LABEL_KEY: &str = "labels";
pub const REQUEST_KEY: &str = "request";
pub const RESPONSE_KEY: &str = "response";
pub const OPERATION_KEY: &str = "operation";

/// Returns an attribute carrying the log name.
///
/// The value is stored raw; the handler path-escapes it while building
/// the resource name, so `name("my/log")` ends up as `.../my%2Flog`.
pub fn name(value: impl Into<String>) -> Attr {
    Attr::string(NAME_KEY, value)
}

/// Returns an attribute collecting several attributes under the labels
/// key. Nested groups flatten into dotted label keys.
pub fn label(attrs: impl IntoIterator<Item = Attr>) -> Attr {
    Attr::group(LABEL_KEY, attrs)
}

/// Returns an attribute describing an HTTP request.
///
/// Forwarding headers win over the request line, so entries logged
/// behind a proxy carry the caller-facing scheme, host and address.
pub fn request<B>(r: &http::Request<B>) -> Attr {
    let headers = r.headers();

    let scheme = match header_str(headers, "x-forwarded-proto") {
        Some(proto) => proto,
        None => match r.uri().scheme_str() {
            Some(scheme) => scheme.to_string(),
            None => "http".to_string(),
        },
    };

    let host = header_str(headers, "x-forwarded-host")
        .or_else(|| r.uri().host().map(str::to_string))
        .or_else(|| header_str(headers, "host"))
        .unwrap_or_default();

    // X-Forwarded-For may hold the whole proxy chain; the first hop is
    // the caller.
    let remote_ip = header_str(headers, "x-forwarded-for")
        .map(|forwarded| forwarded.split(',').next().unwrap_or("").trim().to_string())
        .unwrap_or_default();

    let path = r
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let info = HttpRequestInfo {
        protocol: format!("{:?}", r.version()),
        request_method: r.method().as_str().to_string(),
        request_url: format!("{}://{}{}", scheme, host, path),
        request_size: content_length(headers),
        remote_ip,
        referer: header_str(headers, REFERER.as_str()).unwrap_or_default(),
        user_agent: header_str(headers, USER_AGENT.as_str()).unwrap_or_default(),
        ..HttpRequestInfo::default()
    };

    Attr::any(REQUEST_KEY, AnyValue::Http(info))
}

/// Returns an attribute carrying a caller-built [`HttpRequestInfo`],
/// for callers that measured fields (latency, server ip) themselves.
pub fn request_info(info: HttpRequestInfo) -> Attr {
    Attr::any(REQUEST_KEY, AnyValue::Http(info))
}

/// Returns an attribute describing an HTTP response. Merged into the
/// request attribute of the same log call, if any.
pub fn response<B>(r: &http::Response<B>) -> Attr {
    let info = HttpRequestInfo {
        status: i32::from(r.status().as_u16()),
        response_size: content_length(r.headers()),
        ..HttpRequestInfo::default()
    };

    Attr::any(RESPONSE_KEY, AnyValue::Http(info))
}

/// Metadata exposed by byte-counting response writers, as produced by
/// server middleware that wraps a response body to observe it.
pub trait ResponseSummary {
    fn status_code(&self) -> i32;
    fn bytes_written(&self) -> i64;
}

/// Returns a response attribute built from a byte-counting writer.
pub fn response_writer(w: &dyn ResponseSummary) -> Attr {
    let info = HttpRequestInfo {
        status: w.status_code(),
        response_size: w.bytes_written(),
        ..HttpRequestInfo::default()
    };

    Attr::any(RESPONSE_KEY, AnyValue::Http(info))
}

/// Returns an operation attribute for the first entry of a sequence.
pub fn operation_start(id: impl Into<String>, producer: impl Into<String>) -> Attr {
    operation(id, producer, true, false)
}

/// Returns an operation attribute for an intermediate entry.
pub fn operation_continue(id: impl Into<String>, producer: impl Into<String>) -> Attr {
    operation(id, producer, false, false)
}

/// Returns an operation attribute for the last entry of a sequence.
pub fn operation_end(id: impl Into<String>, producer: impl Into<String>) -> Attr {
    operation(id, producer, false, true)
}

fn operation(
    id: impl Into<String>,
    producer: impl Into<String>,
    first: bool,
    last: bool,
) -> Attr {
    let info = OperationInfo {
        id: id.into(),
        producer: producer.into(),
        first,
        last,
    };

    Attr::any(OPERATION_KEY, AnyValue::Operation(info))
}

/// Returns an error attribute. The error lands in the JSON payload as
/// a plain `error` field.
pub fn error(err: &dyn std::error::Error) -> Attr {
    Attr::string(ERROR_KEY, err.to_string())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn content_length(headers: &HeaderMap) -> i64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use http::Version;

    use super::*;

    #[test]
    fn request_reads_the_request_line() {
        let req = http::Request::builder()
            .method("GET")
            .uri("http://example.com/x?q=1")
            .version(Version::HTTP_11)
            .header("user-agent", "curl/8")
            .header("content-length", "17")
            .body(())
            .expect("build request");

        let attr = request(&req);
        assert_eq!(attr.key, REQUEST_KEY);

        let Value::Any(AnyValue::Http(info)) = attr.value else {
            panic!("expected an http payload");
        };
        assert_eq!(info.protocol, "HTTP/1.1");
        assert_eq!(info.request_method, "GET");
        assert_eq!(info.request_url, "http://example.com/x?q=1");
        assert_eq!(info.request_size, 17);
        assert_eq!(info.user_agent, "curl/8");
        assert_eq!(info.status, 0);
    }

    #[test]
    fn request_honors_forwarding_headers() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/submit")
            .header("x-forwarded-proto", "https")
            .header("x-forwarded-host", "front.example.com")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .expect("build request");

        let Value::Any(AnyValue::Http(info)) = request(&req).value else {
            panic!("expected an http payload");
        };
        assert_eq!(info.request_url, "https://front.example.com/submit");
        assert_eq!(info.remote_ip, "203.0.113.7");
    }

    #[test]
    fn response_carries_status_and_size() {
        let resp = http::Response::builder()
            .status(200)
            .header("content-length", "42")
            .body(())
            .expect("build response");

        let attr = response(&resp);
        assert_eq!(attr.key, RESPONSE_KEY);

        let Value::Any(AnyValue::Http(info)) = attr.value else {
            panic!("expected an http payload");
        };
        assert_eq!(info.status, 200);
        assert_eq!(info.response_size, 42);
        assert!(info.request_method.is_empty());
    }

    #[test]
    fn operation_constructors_set_the_flags() {
        let Value::Any(AnyValue::Operation(start)) = operation_start("op-1", "svc").value else {
            panic!("expected an operation payload");
        };
        assert!(start.first && !start.last);

        let Value::Any(AnyValue::Operation(cont)) = operation_continue("op-1", "svc").value
        else {
            panic!("expected an operation payload");
        };
        assert!(!cont.first && !cont.last);

        let Value::Any(AnyValue::Operation(end)) = operation_end("op-1", "svc").value else {
            panic!("expected an operation payload");
        };
        assert!(!end.first && end.last);
        assert_eq!(end.id, "op-1");
        assert_eq!(end.producer, "svc");
    }

    #[test]
    fn error_renders_as_string() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let attr = error(&err);

        assert_eq!(attr.key, ERROR_KEY);
        let Value::String(text) = attr.value else {
            panic!("expected a string payload");
        };
        assert_eq!(text, "boom");
    }
}
