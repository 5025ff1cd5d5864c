//! Per-call request/response logging.

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::transport::{RequestBody, ResponseBody, ResponseEnvelope, TransportRequest};

/// Identifies the call a log record belongs to.
#[derive(Debug, Clone, Copy)]
pub struct CallLabel<'a> {
    pub api: &'a str,
    pub method: &'a str,
    pub asynchronous: bool,
}

/// Receives the signed outgoing request, then exactly one of the response
/// or the error for that call.
pub trait RequestLogger: Send + Sync {
    fn log_request(&self, call: &CallLabel<'_>, request: &TransportRequest);
    fn log_response(&self, call: &CallLabel<'_>, response: &ResponseEnvelope);
    fn log_error(&self, call: &CallLabel<'_>, error: &Error);
}

impl<L: RequestLogger + ?Sized> RequestLogger for std::sync::Arc<L> {
    fn log_request(&self, call: &CallLabel<'_>, request: &TransportRequest) {
        (**self).log_request(call, request)
    }

    fn log_response(&self, call: &CallLabel<'_>, response: &ResponseEnvelope) {
        (**self).log_response(call, response)
    }

    fn log_error(&self, call: &CallLabel<'_>, error: &Error) {
        (**self).log_error(call, error)
    }
}

/// Emits `tracing` events under the `rest_kit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn log_request(&self, call: &CallLabel<'_>, request: &TransportRequest) {
        debug!(
            target: "rest_kit",
            api = call.api,
            method = call.method,
            asynchronous = call.asynchronous,
            verb = %request.method,
            url = %request.full_url(),
            body = %describe_request_body(&request.body),
            "sending request"
        );
    }

    fn log_response(&self, call: &CallLabel<'_>, response: &ResponseEnvelope) {
        info!(
            target: "rest_kit",
            api = call.api,
            method = call.method,
            asynchronous = call.asynchronous,
            status = response.status,
            body = %describe_response_body(&response.body),
            "received response"
        );
    }

    fn log_error(&self, call: &CallLabel<'_>, error: &Error) {
        warn!(
            target: "rest_kit",
            api = call.api,
            method = call.method,
            asynchronous = call.asynchronous,
            error = %error,
            "call failed"
        );
    }
}

fn describe_request_body(body: &RequestBody) -> String {
    match body {
        RequestBody::Empty => String::new(),
        RequestBody::Form(fields) => serde_urlencoded::to_string(fields).unwrap_or_default(),
        RequestBody::Multipart(fields) => format!("multipart with {} fields", fields.len()),
        RequestBody::Raw(payload) => payload.clone(),
    }
}

fn describe_response_body(body: &ResponseBody) -> String {
    match body {
        ResponseBody::Empty => String::new(),
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Binary(bytes) => format!("{} bytes", bytes.len()),
    }
}
