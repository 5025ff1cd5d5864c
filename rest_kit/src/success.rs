//! Logical success of a completed response.

use serde_json::{Map, Value};

use crate::transport::{ResponseBody, ResponseEnvelope};

/// A JSON property whose stringified value must equal `value` for a 2xx
/// response to count as a success, e.g. `{"code":"0", ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessProperty {
    pub key: String,
    pub value: String,
}

impl SuccessProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Non-2xx is always a failure. A 2xx response is checked against `expected`
/// only when it is a JSON text body; any other body passes unchecked.
pub fn is_success(response: &ResponseEnvelope, expected: Option<&SuccessProperty>) -> bool {
    if !response.is_http_success() {
        return false;
    }

    let Some(expected) = expected else {
        return true;
    };
    if !response.is_json() {
        return true;
    }

    let text = match &response.body {
        ResponseBody::Binary(_) => return true,
        ResponseBody::Empty => "",
        ResponseBody::Text(text) => text.as_str(),
    };

    match serde_json::from_str::<Map<String, Value>>(text) {
        Ok(object) => stringify(object.get(&expected.key)) == expected.value,
        Err(_) => false,
    }
}

fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
