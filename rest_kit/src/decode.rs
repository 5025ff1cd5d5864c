//! Response body → return value, one function per [`crate::ReturnShape`].
//!
//! `#[rest_client]` picks the function when it expands a method, so no type
//! inspection happens per call.

use std::fmt::Display;
use std::str::FromStr;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::transport::{ResponseBody, ResponseEnvelope};

pub fn unit(_response: ResponseEnvelope) -> Result<()> {
    Ok(())
}

/// Parses the trimmed body text with the type's `FromStr`.
pub fn primitive<T>(response: ResponseEnvelope) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let text = text(response)?;
    text.trim().parse::<T>().map_err(|e| {
        Error::Decode(format!(
            "cannot parse {:?} as {}: {}",
            text,
            std::any::type_name::<T>(),
            e
        ))
    })
}

pub fn text(response: ResponseEnvelope) -> Result<String> {
    match response.body {
        ResponseBody::Empty => Ok(String::new()),
        ResponseBody::Text(text) => Ok(text),
        ResponseBody::Binary(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Decode(format!("body is not UTF-8: {}", e))),
    }
}

pub fn binary(response: ResponseEnvelope) -> Result<Bytes> {
    Ok(match response.body {
        ResponseBody::Empty => Bytes::new(),
        ResponseBody::Text(text) => Bytes::from(text),
        ResponseBody::Binary(bytes) => bytes,
    })
}

pub fn binary_vec(response: ResponseEnvelope) -> Result<Vec<u8>> {
    binary(response).map(|b| b.to_vec())
}

/// An empty body reads as JSON `null`: `Option<T>` gets `None`, anything
/// non-nullable a decode error.
pub fn json<T: DeserializeOwned>(response: ResponseEnvelope) -> Result<T> {
    let result = match &response.body {
        ResponseBody::Empty => serde_json::from_str("null"),
        ResponseBody::Text(text) => serde_json::from_str(text),
        ResponseBody::Binary(bytes) => serde_json::from_slice(bytes),
    };
    result.map_err(|e| {
        Error::Decode(format!(
            "cannot decode {} from JSON: {}",
            std::any::type_name::<T>(),
            e
        ))
    })
}

/// A decoded value together with the response it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub value: T,
    pub response: ResponseEnvelope,
}

impl<T> Reply<T> {
    /// Runs `decode` on a copy of the response and keeps the original alongside.
    pub fn capture<F>(response: ResponseEnvelope, decode: F) -> Result<Self>
    where
        F: FnOnce(ResponseEnvelope) -> Result<T>,
    {
        let value = decode(response.clone())?;
        Ok(Self { value, response })
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        a: i32,
    }

    #[test]
    fn test_json_round_trip_and_malformed_body() {
        let thing: Thing = json(ResponseEnvelope::text(200, r#"{"a":1}"#)).unwrap();
        assert_eq!(thing, Thing { a: 1 });

        let err = json::<Thing>(ResponseEnvelope::text(200, r#"{"a":"#)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        let err = json::<Thing>(ResponseEnvelope::text(200, r#"{"b":1}"#)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let empty = || ResponseEnvelope::new(204, ResponseBody::Empty);
        assert_eq!(json::<Option<Thing>>(empty()).unwrap(), None);
        assert_eq!(json::<serde_json::Value>(empty()).unwrap(), serde_json::Value::Null);
        json::<()>(empty()).unwrap();
        assert!(matches!(json::<Thing>(empty()), Err(Error::Decode(_))));
    }

    #[test]
    fn test_primitive_uses_canonical_parser() {
        assert_eq!(primitive::<i64>(ResponseEnvelope::text(200, "42\n")).unwrap(), 42);
        assert!(primitive::<bool>(ResponseEnvelope::text(200, "true")).unwrap());
        assert!(matches!(
            primitive::<i32>(ResponseEnvelope::text(200, "forty-two")),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            primitive::<i32>(ResponseEnvelope::new(200, ResponseBody::Empty)),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_text_and_binary_pass_through() {
        assert_eq!(text(ResponseEnvelope::text(200, " raw ")).unwrap(), " raw ");
        let bytes = Bytes::from_static(&[0, 159, 146, 150]);
        let response = ResponseEnvelope::new(200, ResponseBody::Binary(bytes.clone()));
        assert_eq!(binary(response.clone()).unwrap(), bytes);
        assert!(matches!(text(response), Err(Error::Decode(_))));
    }

    #[test]
    fn test_reply_keeps_the_response() {
        let response = ResponseEnvelope::text(201, r#"{"a":7}"#).with_header("X-Request-Id", "r1");
        let reply = Reply::capture(response, json::<Thing>).unwrap();
        assert_eq!(reply.status(), 201);
        assert_eq!(reply.response.header("x-request-id"), Some("r1"));
        assert_eq!(reply.into_value(), Thing { a: 7 });
    }
}
