//! Static description of client methods, as emitted by `#[rest_client]`.
//!
//! A [`MethodDescriptor`] says what the method looks like (name, parameters,
//! return shape); a [`MethodMetadata`] carries the routing annotations. The
//! pair is handed to [`crate::template::compile`] once per method.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::status::StatusErrorMapper;
use crate::success::SuccessProperty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "DELETE" => Ok(HttpVerb::Delete),
            "PATCH" => Ok(HttpVerb::Patch),
            "HEAD" => Ok(HttpVerb::Head),
            "OPTIONS" => Ok(HttpVerb::Options),
            "TRACE" => Ok(HttpVerb::Trace),
            other => Err(Error::Configuration(format!("unknown HTTP verb {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamRole {
    /// Substituted into a `{key}` placeholder of the URL.
    Route,
    /// Query string for GET, form field for POST.
    Query,
    /// Serialized as the whole request body.
    Body,
    /// Sent in the `Cookie` header.
    Cookie,
    /// Declared but not sent.
    Unbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub role: ParamRole,
    pub key: String,
    pub type_name: String,
}

impl ParamDescriptor {
    pub fn new(role: ParamRole, key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            role,
            key: key.into(),
            type_name: type_name.into(),
        }
    }

    pub fn route(key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(ParamRole::Route, key, type_name)
    }

    pub fn query(key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(ParamRole::Query, key, type_name)
    }

    pub fn body(key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(ParamRole::Body, key, type_name)
    }

    pub fn cookie(key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(ParamRole::Cookie, key, type_name)
    }

    pub fn unbound(key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(ParamRole::Unbound, key, type_name)
    }
}

/// How the response body becomes the method's return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    Unit,
    Primitive,
    Text,
    Binary,
    Json,
    Future(Box<ReturnShape>),
}

impl ReturnShape {
    pub fn is_async(&self) -> bool {
        matches!(self, ReturnShape::Future(_))
    }

    /// True when the payload (or the future's payload) is read as raw bytes.
    pub fn is_binary(&self) -> bool {
        match self {
            ReturnShape::Binary => true,
            ReturnShape::Future(inner) => inner.is_binary(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Name of the declaring trait; the key handed to the base-URL provider.
    pub api: String,
    pub name: String,
    pub return_shape: ReturnShape,
    pub params: Vec<ParamDescriptor>,
}

impl MethodDescriptor {
    pub fn new(api: impl Into<String>, name: impl Into<String>, return_shape: ReturnShape) -> Self {
        Self {
            api: api.into(),
            name: name.into(),
            return_shape,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }
}

/// Routing annotations of one method.
#[derive(Debug, Clone, Default)]
pub struct MethodMetadata {
    pub verbs: Vec<HttpVerb>,
    pub path: String,
    pub fixed_params: Vec<(String, String)>,
    pub query_keys: Vec<String>,
    pub success: Option<SuccessProperty>,
    pub status_errors: StatusErrorMapper,
    pub consumes: Option<String>,
}

impl MethodMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verb(mut self, verb: HttpVerb) -> Self {
        self.verbs.push(verb);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn fixed(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fixed_params.push((key.into(), value.into()));
        self
    }

    /// Keys that a POST sends on the query string instead of the form body.
    pub fn query_key(mut self, key: impl Into<String>) -> Self {
        self.query_keys.push(key.into());
        self
    }

    pub fn success(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.success = Some(SuccessProperty::new(key, value));
        self
    }

    pub fn status_errors(mut self, mapper: StatusErrorMapper) -> Self {
        self.status_errors = mapper;
        self
    }

    pub fn consumes(mut self, content_type: impl Into<String>) -> Self {
        self.consumes = Some(content_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpVerb>().unwrap(), HttpVerb::Get);
        assert_eq!("Post".parse::<HttpVerb>().unwrap(), HttpVerb::Post);
        assert!(matches!(
            "FETCH".parse::<HttpVerb>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_future_shape_inherits_binary_mode() {
        let shape = ReturnShape::Future(Box::new(ReturnShape::Binary));
        assert!(shape.is_async());
        assert!(shape.is_binary());
        assert!(!ReturnShape::Future(Box::new(ReturnShape::Json)).is_binary());
        assert!(!ReturnShape::Text.is_async());
    }
}
