//! Compilation of a method's metadata into an immutable request template.

use std::collections::BTreeSet;

use crate::descriptor::{HttpVerb, MethodDescriptor, MethodMetadata, ParamRole, ReturnShape};
use crate::error::{Error, Result};
use crate::plan::ParameterPlan;
use crate::status::StatusErrorMapper;
use crate::success::SuccessProperty;
use crate::transport::ResponseMode;

/// Encoding of `#[body]` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Xml,
}

impl BodyFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyFormat::Json => "application/json;charset=UTF-8",
            BodyFormat::Xml => "application/xml;charset=UTF-8",
        }
    }
}

/// Everything needed to turn one call of a method into a request.
/// Never mutated after [`compile`]; shared freely across threads.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    api: String,
    method: String,
    prefix: String,
    verb: HttpVerb,
    fixed_params: Vec<(String, String)>,
    query_keys: BTreeSet<String>,
    plan: ParameterPlan,
    success: Option<SuccessProperty>,
    status_errors: StatusErrorMapper,
    return_shape: ReturnShape,
    consumes: Option<String>,
}

impl RequestTemplate {
    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Class-level and method-level route fragments, placeholders unresolved.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    pub fn fixed_params(&self) -> &[(String, String)] {
        &self.fixed_params
    }

    pub fn is_query_key(&self, key: &str) -> bool {
        self.query_keys.contains(key)
    }

    pub fn plan(&self) -> &ParameterPlan {
        &self.plan
    }

    pub fn success(&self) -> Option<&SuccessProperty> {
        self.success.as_ref()
    }

    pub fn status_errors(&self) -> &StatusErrorMapper {
        &self.status_errors
    }

    pub fn return_shape(&self) -> &ReturnShape {
        &self.return_shape
    }

    pub fn consumes(&self) -> Option<&str> {
        self.consumes.as_deref()
    }

    pub fn is_async(&self) -> bool {
        self.return_shape.is_async()
    }

    pub fn response_mode(&self) -> ResponseMode {
        if self.return_shape.is_binary() {
            ResponseMode::Binary
        } else {
            ResponseMode::Text
        }
    }

    /// XML when the consumed content type names an `/xml` type, JSON otherwise.
    pub fn body_format(&self) -> BodyFormat {
        match &self.consumes {
            Some(ct) if ct.contains("/xml") => BodyFormat::Xml,
            _ => BodyFormat::Json,
        }
    }
}

/// Only GET and POST are ever produced: no verb or a lone POST is POST,
/// a lone GET is GET, anything else is rejected.
pub fn resolve_verb(verbs: &[HttpVerb]) -> Result<HttpVerb> {
    match verbs {
        [] | [HttpVerb::Post] => Ok(HttpVerb::Post),
        [HttpVerb::Get] => Ok(HttpVerb::Get),
        [other] => Err(Error::Configuration(format!(
            "unsupported HTTP verb {}, only GET or POST",
            other
        ))),
        many => Err(Error::Configuration(format!(
            "{} HTTP verbs declared, at most one allowed",
            many.len()
        ))),
    }
}

pub fn compile(
    descriptor: &MethodDescriptor,
    class_prefix: &str,
    metadata: MethodMetadata,
) -> Result<RequestTemplate> {
    let context = |msg: String| {
        Error::Configuration(format!("{}::{}: {}", descriptor.api, descriptor.name, msg))
    };

    let verb = resolve_verb(&metadata.verbs).map_err(|e| match e {
        Error::Configuration(msg) => context(msg),
        other => other,
    })?;
    let plan = ParameterPlan::classify(&descriptor.params).map_err(|e| match e {
        Error::Configuration(msg) => context(msg),
        other => other,
    })?;

    if verb == HttpVerb::Get {
        if let Some(body) = plan.body() {
            return Err(context(format!("GET method cannot take body parameter {}", body.key)));
        }
    }

    let declared: BTreeSet<&str> = plan
        .params()
        .iter()
        .filter(|p| p.role != ParamRole::Unbound)
        .map(|p| p.key.as_str())
        .collect();
    let mut fixed_keys = BTreeSet::new();
    for (key, _) in &metadata.fixed_params {
        if declared.contains(key.as_str()) {
            return Err(context(format!(
                "fixed parameter {} collides with a declared parameter",
                key
            )));
        }
        if !fixed_keys.insert(key.as_str()) {
            return Err(context(format!("fixed parameter {} is declared twice", key)));
        }
    }

    let prefix = format!("{}{}", class_prefix, metadata.path);
    for key in plan.keys(ParamRole::Route) {
        if !prefix.contains(&format!("{{{}}}", key)) {
            return Err(context(format!(
                "route parameter {} has no {{{}}} placeholder in {}",
                key, key, prefix
            )));
        }
    }

    let query_params: BTreeSet<&str> = plan.keys(ParamRole::Query).collect();
    for key in &metadata.query_keys {
        if !query_params.contains(key.as_str()) && !fixed_keys.contains(key.as_str()) {
            return Err(context(format!("query key {} names no query or fixed parameter", key)));
        }
    }

    Ok(RequestTemplate {
        api: descriptor.api.clone(),
        method: descriptor.name.clone(),
        prefix,
        verb,
        fixed_params: metadata.fixed_params,
        query_keys: metadata.query_keys.into_iter().collect(),
        plan,
        success: metadata.success,
        status_errors: metadata.status_errors,
        return_shape: descriptor.return_shape.clone(),
        consumes: metadata.consumes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamDescriptor;

    fn descriptor(shape: ReturnShape) -> MethodDescriptor {
        MethodDescriptor::new("UserApi", "find", shape)
            .param(ParamDescriptor::route("id", "u64"))
            .param(ParamDescriptor::query("name", "String"))
    }

    #[test]
    fn test_zero_or_one_get_post_verb_compiles() {
        let cases: [(&[HttpVerb], HttpVerb); 3] = [
            (&[], HttpVerb::Post),
            (&[HttpVerb::Post], HttpVerb::Post),
            (&[HttpVerb::Get], HttpVerb::Get),
        ];
        for (verbs, expected) in cases {
            let mut metadata = MethodMetadata::new().path("/{id}");
            metadata.verbs = verbs.to_vec();
            let template = compile(&descriptor(ReturnShape::Json), "/users", metadata).unwrap();
            assert_eq!(template.verb(), expected);
            assert_eq!(template.prefix(), "/users/{id}");
        }
    }

    #[test]
    fn test_other_verb_combinations_are_rejected() {
        let cases: [&[HttpVerb]; 4] = [
            &[HttpVerb::Put],
            &[HttpVerb::Delete],
            &[HttpVerb::Get, HttpVerb::Post],
            &[HttpVerb::Get, HttpVerb::Get],
        ];
        for verbs in cases {
            let mut metadata = MethodMetadata::new().path("/{id}");
            metadata.verbs = verbs.to_vec();
            let err = compile(&descriptor(ReturnShape::Json), "/users", metadata).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{:?}", verbs);
        }
    }

    #[test]
    fn test_fixed_param_collision_rejected() {
        let metadata = MethodMetadata::new().path("/{id}").fixed("name", "x");
        let err = compile(&descriptor(ReturnShape::Json), "", metadata).unwrap_err();
        assert!(err.to_string().contains("UserApi::find"));
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn test_get_with_body_rejected() {
        let d = MethodDescriptor::new("UserApi", "create", ReturnShape::Unit)
            .param(ParamDescriptor::body("user", "NewUser"));
        let err = compile(&d, "/users", MethodMetadata::new().verb(HttpVerb::Get)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(compile(&d, "/users", MethodMetadata::new()).is_ok());
    }

    #[test]
    fn test_route_key_needs_placeholder() {
        let metadata = MethodMetadata::new().path("/all");
        let err = compile(&descriptor(ReturnShape::Json), "/users", metadata).unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_query_override_must_name_a_parameter() {
        let ok = MethodMetadata::new()
            .path("/{id}")
            .fixed("token", "t")
            .query_key("token")
            .query_key("name");
        let template = compile(&descriptor(ReturnShape::Json), "", ok).unwrap();
        assert!(template.is_query_key("token"));
        assert!(template.is_query_key("name"));

        let bad = MethodMetadata::new().path("/{id}").query_key("page");
        assert!(compile(&descriptor(ReturnShape::Json), "", bad).is_err());
    }

    #[test]
    fn test_modes_follow_return_shape_and_consumes() {
        let shape = ReturnShape::Future(Box::new(ReturnShape::Binary));
        let template =
            compile(&descriptor(shape), "", MethodMetadata::new().path("/{id}")).unwrap();
        assert!(template.is_async());
        assert_eq!(template.response_mode(), ResponseMode::Binary);
        assert_eq!(template.body_format(), BodyFormat::Json);

        let xml = MethodMetadata::new().path("/{id}").consumes("application/xml");
        let template = compile(&descriptor(ReturnShape::Text), "", xml).unwrap();
        assert_eq!(template.body_format(), BodyFormat::Xml);
        assert_eq!(template.response_mode(), ResponseMode::Text);
    }
}
