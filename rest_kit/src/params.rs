//! Argument values and the per-call context they are gathered into.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use bytes::Bytes;

/// An in-memory file attached to a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            content: content.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Reads the whole file; the part is named after the path's final component.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, content))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    File(FilePart),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Textual form used for query strings, route segments and cookies.
    /// Files render as their file name, lists as comma separated elements.
    pub fn to_text(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::File(f) => f.file_name.clone(),
            ParamValue::List(items) => items
                .iter()
                .map(ParamValue::to_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ParamValue::File(_))
    }

    /// Flattens into `(key, text)` pairs, repeating the key for list elements.
    pub fn push_pairs(&self, key: &str, out: &mut Vec<(String, String)>) {
        match self {
            ParamValue::List(items) => {
                for item in items {
                    item.push_pairs(key, out);
                }
            }
            other => out.push((key.to_string(), other.to_text())),
        }
    }
}

pub type ParamMap = BTreeMap<String, ParamValue>;

/// Conversion of a method argument into a request parameter.
///
/// Returning `None` leaves the parameter out of the request.
pub trait ToParam {
    fn to_param(&self) -> Option<ParamValue>;
}

impl<T: ToParam + ?Sized> ToParam for &T {
    fn to_param(&self) -> Option<ParamValue> {
        (**self).to_param()
    }
}

impl ToParam for str {
    fn to_param(&self) -> Option<ParamValue> {
        Some(ParamValue::Text(self.to_string()))
    }
}

impl ToParam for String {
    fn to_param(&self) -> Option<ParamValue> {
        Some(ParamValue::Text(self.clone()))
    }
}

macro_rules! display_params {
    ($($ty:ty),*) => {
        $(
            impl ToParam for $ty {
                fn to_param(&self) -> Option<ParamValue> {
                    Some(ParamValue::Text(self.to_string()))
                }
            }
        )*
    };
}

display_params!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char
);

impl ToParam for FilePart {
    fn to_param(&self) -> Option<ParamValue> {
        Some(ParamValue::File(self.clone()))
    }
}

impl ToParam for ParamValue {
    fn to_param(&self) -> Option<ParamValue> {
        Some(self.clone())
    }
}

impl<T: ToParam> ToParam for Option<T> {
    fn to_param(&self) -> Option<ParamValue> {
        self.as_ref().and_then(ToParam::to_param)
    }
}

impl<T: ToParam> ToParam for [T] {
    fn to_param(&self) -> Option<ParamValue> {
        Some(ParamValue::List(
            self.iter().filter_map(ToParam::to_param).collect(),
        ))
    }
}

impl<T: ToParam> ToParam for Vec<T> {
    fn to_param(&self) -> Option<ParamValue> {
        self.as_slice().to_param()
    }
}

/// Runtime values of one invocation. Built fresh for every call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub(crate) route: BTreeMap<String, String>,
    /// Route keys whose argument had no value.
    pub(crate) missing_route: Vec<String>,
    pub(crate) params: ParamMap,
    pub(crate) cookies: BTreeMap<String, String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A route value that turns out to be `None` fails the call before dispatch.
    pub fn route<T: ToParam + ?Sized>(&mut self, key: &str, value: &T) -> &mut Self {
        match value.to_param() {
            Some(v) => {
                self.route.insert(key.to_string(), v.to_text());
            }
            None => self.missing_route.push(key.to_string()),
        }
        self
    }

    pub fn query<T: ToParam + ?Sized>(&mut self, key: &str, value: &T) -> &mut Self {
        if let Some(v) = value.to_param() {
            self.params.insert(key.to_string(), v);
        }
        self
    }

    pub fn cookie<T: ToParam + ?Sized>(&mut self, key: &str, value: &T) -> &mut Self {
        if let Some(v) = value.to_param() {
            self.cookies.insert(key.to_string(), v.to_text());
        }
        self
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }
}
