//! HTTP transport types and the pluggable `Transport` capability.
//!
//! Requests and responses are plain data. The executor builds a
//! [`TransportRequest`], hands it to the sign provider and the request logger,
//! and only then to a [`Transport`] for the actual round trip.

use bytes::Bytes;

use crate::descriptor::HttpVerb;
use crate::error::Result;
use crate::params::FilePart;

mod reqwest_backend;

pub use reqwest_backend::ReqwestTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Text(String),
    File(FilePart),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` fields.
    Multipart(Vec<(String, FormField)>),
    /// Already serialized payload; its content type travels in the headers.
    Raw(String),
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: HttpVerb,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub body: RequestBody,
}

impl TransportRequest {
    pub fn new(method: HttpVerb, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            basic_auth: None,
            body: RequestBody::Empty,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// The URL with the query string appended, as it goes on the wire.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        match serde_urlencoded::to_string(&self.query) {
            Ok(qs) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}{}", self.url, sep, qs)
            }
            Err(_) => self.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Binary(Bytes),
}

/// A completed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl ResponseEnvelope {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, ResponseBody::Text(body.into()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }

    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// How the transport should read the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Text,
    Binary,
}

/// Best-effort cancellation of an in-flight asynchronous call.
pub trait CancelHandle: Send + Sync {
    /// Returns false when the work had already finished.
    fn cancel(&self) -> bool;
}

/// Completion callback of an asynchronous call, invoked at most once.
pub type Completion = Box<dyn FnOnce(Result<ResponseEnvelope>) + Send + 'static>;

/// Performs network round trips on behalf of the executor.
pub trait Transport: Send + Sync {
    /// Blocks the calling thread until the response is read.
    fn execute(&self, request: TransportRequest, mode: ResponseMode) -> Result<ResponseEnvelope>;

    /// Starts the round trip on a transport-owned worker and returns immediately.
    /// `on_complete` runs on that worker unless the call is cancelled first.
    fn execute_async(
        &self,
        request: TransportRequest,
        mode: ResponseMode,
        on_complete: Completion,
    ) -> Box<dyn CancelHandle>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: TransportRequest, mode: ResponseMode) -> Result<ResponseEnvelope> {
        (**self).execute(request, mode)
    }

    fn execute_async(
        &self,
        request: TransportRequest,
        mode: ResponseMode,
        on_complete: Completion,
    ) -> Box<dyn CancelHandle> {
        (**self).execute_async(request, mode, on_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_appends_encoded_query() {
        let mut request = TransportRequest::new(HttpVerb::Get, "http://localhost/users");
        request.query.push(("name".to_string(), "a b".to_string()));
        request.query.push(("page".to_string(), "1".to_string()));
        assert_eq!(request.full_url(), "http://localhost/users?name=a+b&page=1");
    }

    #[test]
    fn test_set_header_replaces_existing_value() {
        let mut request = TransportRequest::new(HttpVerb::Post, "http://localhost");
        request.set_header("X-Sign", "a");
        request.set_header("x-sign", "b");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("X-SIGN"), Some("b"));
    }

    #[test]
    fn test_json_content_type_detection() {
        let response = ResponseEnvelope::text(200, "{}")
            .with_header("Content-Type", "application/json;charset=UTF-8");
        assert!(response.is_json());
        assert!(!ResponseEnvelope::text(200, "{}").is_json());
    }
}
