//! Translation of failed responses into errors.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, Error};
use crate::transport::{ResponseBody, ResponseEnvelope};

/// Header a server may use to carry an explicit error message.
pub const ERROR_MESSAGE_HEADER: &str = "error-msg";

pub type ErrorFactory = Arc<dyn Fn(String) -> BoxError + Send + Sync>;

/// Builds an `E` from the failure message.
pub fn construct<E>(message: String) -> BoxError
where
    E: From<String> + StdError + Send + Sync + 'static,
{
    Box::new(E::from(message))
}

/// Status code to error kind table of one method.
#[derive(Clone, Default)]
pub struct StatusErrorMapper {
    kinds: HashMap<u16, ErrorFactory>,
}

impl fmt::Debug for StatusErrorMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut statuses: Vec<_> = self.kinds.keys().collect();
        statuses.sort();
        f.debug_struct("StatusErrorMapper")
            .field("statuses", &statuses)
            .finish()
    }
}

impl StatusErrorMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E>(self, status: u16) -> Self
    where
        E: From<String> + StdError + Send + Sync + 'static,
    {
        self.register_with(status, construct::<E>)
    }

    pub fn register_with<F>(mut self, status: u16, factory: F) -> Self
    where
        F: Fn(String) -> BoxError + Send + Sync + 'static,
    {
        self.kinds.insert(status, Arc::new(factory));
        self
    }

    pub fn contains(&self, status: u16) -> bool {
        self.kinds.contains_key(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn map_failure(&self, response: &ResponseEnvelope) -> Error {
        let message = failure_message(response);
        match self.kinds.get(&response.status) {
            Some(factory) => Error::Mapped {
                status: response.status,
                source: factory(message),
            },
            None => Error::RemoteStatus {
                status: response.status,
                message,
            },
        }
    }
}

/// The `error-msg` header when present and non-empty, else the text body.
/// Binary bodies give an empty message.
pub fn failure_message(response: &ResponseEnvelope) -> String {
    if let Some(msg) = response.header(ERROR_MESSAGE_HEADER) {
        if !msg.is_empty() {
            return msg.to_string();
        }
    }
    match &response.body {
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Empty | ResponseBody::Binary(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("not found: {0}")]
    struct NotFound(String);

    impl From<String> for NotFound {
        fn from(message: String) -> Self {
            NotFound(message)
        }
    }

    #[test]
    fn test_mapped_status_prefers_header_message() {
        let mapper = StatusErrorMapper::new().register::<NotFound>(404);
        let response =
            ResponseEnvelope::text(404, "body text").with_header("Error-Msg", "no such user");

        let err = mapper.map_failure(&response);
        let kind = err.downcast_ref::<NotFound>().expect("mapped to NotFound");
        assert_eq!(kind.0, "no such user");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_mapped_status_falls_back_to_body() {
        let mapper = StatusErrorMapper::new().register::<NotFound>(404);
        let err = mapper.map_failure(&ResponseEnvelope::text(404, "body text"));
        assert_eq!(err.downcast_ref::<NotFound>().unwrap().0, "body text");

        let empty_header = ResponseEnvelope::text(404, "body text").with_header("error-msg", "");
        let err = mapper.map_failure(&empty_header);
        assert_eq!(err.downcast_ref::<NotFound>().unwrap().0, "body text");
    }

    #[test]
    fn test_unmapped_status_is_remote_status() {
        let mapper = StatusErrorMapper::new().register::<NotFound>(404);
        let err = mapper.map_failure(&ResponseEnvelope::text(500, "boom"));
        match err {
            Error::RemoteStatus { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected RemoteStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_body_gives_empty_message() {
        let response = ResponseEnvelope::new(502, ResponseBody::Binary(vec![0u8, 1, 2].into()));
        match StatusErrorMapper::new().map_failure(&response) {
            Error::RemoteStatus { message, .. } => assert!(message.is_empty()),
            other => panic!("expected RemoteStatus, got {:?}", other),
        }
    }
}
