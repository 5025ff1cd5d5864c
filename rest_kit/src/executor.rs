//! Turns a compiled [`RequestTemplate`] plus one call's arguments into an HTTP
//! exchange and a decoded result.
//!
//! Three call shapes exist: query-string GET, form POST and serialized-body
//! POST. Each comes in a blocking flavour and one returning a [`CallFuture`].
//! Every dispatched call produces one request log record followed by exactly
//! one response or error record.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::ClientConfig;
use crate::descriptor::HttpVerb;
use crate::error::{Error, Result};
use crate::future::{CallFuture, DROPPED};
use crate::logger::{CallLabel, RequestLogger, TracingLogger};
use crate::params::{CallContext, ParamMap, ParamValue};
use crate::provider::{
    BaseUrlProvider, BasicAuth, BasicAuthProvider, ConfigBaseUrls, NoSign, SignProvider,
    StaticBaseUrl,
};
use crate::success::is_success;
use crate::template::{BodyFormat, RequestTemplate};
use crate::transport::{
    FormField, ReqwestTransport, RequestBody, ResponseEnvelope, Transport, TransportRequest,
};

/// Sign-provider key under which a serialized body is exposed.
pub const JSON_BODY_PARAM: &str = "_json";

/// Shared, cheaply clonable request engine used by every generated client.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    base_urls: Arc<dyn BaseUrlProvider>,
    signer: Arc<dyn SignProvider>,
    basic_auth: Option<Arc<dyn BasicAuthProvider>>,
    logger: Arc<dyn RequestLogger>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("basic_auth", &self.basic_auth.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ExecutorBuilder {
    transport: Option<Arc<dyn Transport>>,
    base_urls: Option<Arc<dyn BaseUrlProvider>>,
    signer: Option<Arc<dyn SignProvider>>,
    basic_auth: Option<Arc<dyn BasicAuthProvider>>,
    logger: Option<Arc<dyn RequestLogger>>,
}

impl ExecutorBuilder {
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn base_url_provider(mut self, provider: impl BaseUrlProvider + 'static) -> Self {
        self.base_urls = Some(Arc::new(provider));
        self
    }

    /// Same base URL for every API.
    pub fn base_url(self, url: impl Into<String>) -> Self {
        self.base_url_provider(StaticBaseUrl(url.into()))
    }

    pub fn sign_provider(mut self, signer: impl SignProvider + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    pub fn basic_auth(mut self, provider: impl BasicAuthProvider + 'static) -> Self {
        self.basic_auth = Some(Arc::new(provider));
        self
    }

    pub fn logger(mut self, logger: impl RequestLogger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Fails when no base URL provider was given. Without an explicit
    /// transport a default [`ReqwestTransport`] is started.
    pub fn build(self) -> Result<Executor> {
        let base_urls = self.base_urls.ok_or_else(|| {
            Error::Configuration("executor requires a base URL provider".to_string())
        })?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        Ok(Executor {
            transport,
            base_urls,
            signer: self.signer.unwrap_or_else(|| Arc::new(NoSign)),
            basic_auth: self.basic_auth,
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
        })
    }
}

impl Executor {
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    /// Reqwest transport, config-backed base URLs, optional basic auth,
    /// tracing logger and no signing.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .transport(ReqwestTransport::from_config(&config.transport)?)
            .base_url_provider(ConfigBaseUrls::from_config(config));
        if let Some(auth) = &config.basic_auth {
            builder = builder.basic_auth(BasicAuth::from(auth));
        }
        builder.build()
    }

    /// Dispatches on the template's verb: GET for GET, form POST otherwise.
    pub fn call<T, D>(&self, template: &RequestTemplate, call: CallContext, decode: D) -> Result<T>
    where
        D: FnOnce(ResponseEnvelope) -> Result<T>,
    {
        match template.verb() {
            HttpVerb::Get => self.get(template, call, decode),
            _ => self.post(template, call, decode),
        }
    }

    pub fn call_async<T, D>(
        &self,
        template: &Arc<RequestTemplate>,
        call: CallContext,
        decode: D,
    ) -> Result<CallFuture<T>>
    where
        T: Send + 'static,
        D: FnOnce(ResponseEnvelope) -> Result<T> + Send + 'static,
    {
        match template.verb() {
            HttpVerb::Get => self.get_async(template, call, decode),
            _ => self.post_async(template, call, decode),
        }
    }

    pub fn get<T, D>(&self, template: &RequestTemplate, call: CallContext, decode: D) -> Result<T>
    where
        D: FnOnce(ResponseEnvelope) -> Result<T>,
    {
        let (params, request) = self.get_request(template, &call)?;
        self.dispatch(template, &params, request, decode)
    }

    pub fn get_async<T, D>(
        &self,
        template: &Arc<RequestTemplate>,
        call: CallContext,
        decode: D,
    ) -> Result<CallFuture<T>>
    where
        T: Send + 'static,
        D: FnOnce(ResponseEnvelope) -> Result<T> + Send + 'static,
    {
        let (params, request) = self.get_request(template, &call)?;
        Ok(self.dispatch_async(template, &params, request, decode))
    }

    pub fn post<T, D>(&self, template: &RequestTemplate, call: CallContext, decode: D) -> Result<T>
    where
        D: FnOnce(ResponseEnvelope) -> Result<T>,
    {
        let (params, request) = self.post_request(template, &call)?;
        self.dispatch(template, &params, request, decode)
    }

    pub fn post_async<T, D>(
        &self,
        template: &Arc<RequestTemplate>,
        call: CallContext,
        decode: D,
    ) -> Result<CallFuture<T>>
    where
        T: Send + 'static,
        D: FnOnce(ResponseEnvelope) -> Result<T> + Send + 'static,
    {
        let (params, request) = self.post_request(template, &call)?;
        Ok(self.dispatch_async(template, &params, request, decode))
    }

    pub fn post_body<B, T, D>(
        &self,
        template: &RequestTemplate,
        call: CallContext,
        body: &B,
        decode: D,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        D: FnOnce(ResponseEnvelope) -> Result<T>,
    {
        let (params, request) = self.post_body_request(template, &call, body)?;
        self.dispatch(template, &params, request, decode)
    }

    pub fn post_body_async<B, T, D>(
        &self,
        template: &Arc<RequestTemplate>,
        call: CallContext,
        body: &B,
        decode: D,
    ) -> Result<CallFuture<T>>
    where
        B: Serialize + ?Sized,
        T: Send + 'static,
        D: FnOnce(ResponseEnvelope) -> Result<T> + Send + 'static,
    {
        let (params, request) = self.post_body_request(template, &call, body)?;
        Ok(self.dispatch_async(template, &params, request, decode))
    }

    fn base_request(
        &self,
        template: &RequestTemplate,
        verb: HttpVerb,
        call: &CallContext,
    ) -> Result<TransportRequest> {
        let base = self.base_urls.base_url(template.api());
        if base.is_empty() {
            return Err(Error::Configuration(format!(
                "no base URL configured for {}",
                template.api()
            )));
        }

        if let Some(key) = call.missing_route.first() {
            return Err(Error::Configuration(format!(
                "{}::{} has no value for route key {{{}}}",
                template.api(),
                template.method(),
                key
            )));
        }

        let url = expand_route(&base, template.prefix(), &call.route);
        let mut request = TransportRequest::new(verb, url);
        if let Some(cookie) = cookie_header(&call.cookies) {
            request.set_header("Cookie", cookie);
        }
        if let Some(auth) = &self.basic_auth {
            request.basic_auth = Some((auth.username(), auth.password()));
        }
        Ok(request)
    }

    fn get_request(
        &self,
        template: &RequestTemplate,
        call: &CallContext,
    ) -> Result<(ParamMap, TransportRequest)> {
        let mut request = self.base_request(template, HttpVerb::Get, call)?;
        let params = merged_params(template, call);
        push_query(&params, &mut request.query);
        Ok((params, request))
    }

    fn post_request(
        &self,
        template: &RequestTemplate,
        call: &CallContext,
    ) -> Result<(ParamMap, TransportRequest)> {
        let mut request = self.base_request(template, HttpVerb::Post, call)?;
        let (query, fields): (ParamMap, ParamMap) = merged_params(template, call)
            .into_iter()
            .partition(|(key, _)| template.is_query_key(key));
        push_query(&query, &mut request.query);
        request.body = form_body(&fields);
        Ok((fields, request))
    }

    fn post_body_request<B>(
        &self,
        template: &RequestTemplate,
        call: &CallContext,
        body: &B,
    ) -> Result<(ParamMap, TransportRequest)>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.base_request(template, HttpVerb::Post, call)?;
        push_query(&merged_params(template, call), &mut request.query);

        let format = template.body_format();
        let payload = serialize_body(format, body)?;
        request.set_header("Content-Type", format.content_type());
        request.body = RequestBody::Raw(payload.clone());

        let mut params = ParamMap::new();
        params.insert(JSON_BODY_PARAM.to_string(), ParamValue::Text(payload));
        Ok((params, request))
    }

    fn dispatch<T, D>(
        &self,
        template: &RequestTemplate,
        params: &ParamMap,
        mut request: TransportRequest,
        decode: D,
    ) -> Result<T>
    where
        D: FnOnce(ResponseEnvelope) -> Result<T>,
    {
        self.signer.sign(params, &mut request);
        let label = CallLabel {
            api: template.api(),
            method: template.method(),
            asynchronous: false,
        };
        self.logger.log_request(&label, &request);

        let response = match self.transport.execute(request, template.response_mode()) {
            Ok(response) => response,
            Err(e) => {
                self.logger.log_error(&label, &e);
                return Err(e);
            }
        };
        self.logger.log_response(&label, &response);
        settle(template, response, decode)
    }

    fn dispatch_async<T, D>(
        &self,
        template: &Arc<RequestTemplate>,
        params: &ParamMap,
        mut request: TransportRequest,
        decode: D,
    ) -> CallFuture<T>
    where
        T: Send + 'static,
        D: FnOnce(ResponseEnvelope) -> Result<T> + Send + 'static,
    {
        self.signer.sign(params, &mut request);
        self.logger.log_request(&async_label(template), &request);

        let (future, completer) = CallFuture::pending();
        let closing = Closing {
            closed: Arc::new(AtomicBool::new(false)),
            logger: self.logger.clone(),
            template: template.clone(),
        };
        let cancel_closed = closing.closed.clone();

        let cancel = self.transport.execute_async(
            request,
            template.response_mode(),
            Box::new(move |outcome| {
                if !closing.claim() {
                    return;
                }
                let label = async_label(&closing.template);
                let result = match outcome {
                    Ok(response) => {
                        closing.logger.log_response(&label, &response);
                        settle(&closing.template, response, decode)
                    }
                    Err(e) => {
                        closing.logger.log_error(&label, &e);
                        Err(e)
                    }
                };
                completer.complete(result);
            }),
        );

        let logger = self.logger.clone();
        let cancelled = template.clone();
        future.attach(cancel, move || {
            if !cancel_closed.swap(true, Ordering::SeqCst) {
                logger.log_error(&async_label(&cancelled), &Error::Cancelled);
            }
        })
    }
}

/// Owns the right to write an async call's closing log record.
///
/// Completion and cancellation race for it; if the completion is dropped
/// unrun (workers shut down, a panic in the task) the drop writes it.
struct Closing {
    closed: Arc<AtomicBool>,
    logger: Arc<dyn RequestLogger>,
    template: Arc<RequestTemplate>,
}

impl Closing {
    fn claim(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

impl Drop for Closing {
    fn drop(&mut self) {
        if self.claim() {
            self.logger
                .log_error(&async_label(&self.template), &Error::transport(DROPPED));
        }
    }
}

fn async_label(template: &RequestTemplate) -> CallLabel<'_> {
    CallLabel {
        api: template.api(),
        method: template.method(),
        asynchronous: true,
    }
}

/// Success predicate, then either the decoder or the status error mapper.
pub fn settle<T, D>(template: &RequestTemplate, response: ResponseEnvelope, decode: D) -> Result<T>
where
    D: FnOnce(ResponseEnvelope) -> Result<T>,
{
    if is_success(&response, template.success()) {
        decode(response)
    } else {
        Err(template.status_errors().map_failure(&response))
    }
}

/// `base + prefix` with every `{key}` replaced by its percent-encoded value.
pub fn expand_route(base: &str, prefix: &str, route: &BTreeMap<String, String>) -> String {
    let mut url = format!("{}{}", base, prefix);
    for (key, value) in route {
        url = url.replace(&format!("{{{}}}", key), &urlencoding::encode(value));
    }
    url
}

/// `" k=v;"` per cookie, concatenated. `None` when there are no cookies.
pub fn cookie_header(cookies: &BTreeMap<String, String>) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(key, value)| format!(" {}={};", key, value))
            .collect(),
    )
}

fn merged_params(template: &RequestTemplate, call: &CallContext) -> ParamMap {
    let mut params: ParamMap = template
        .fixed_params()
        .iter()
        .map(|(k, v)| (k.clone(), ParamValue::Text(v.clone())))
        .collect();
    params.extend(call.params.iter().map(|(k, v)| (k.clone(), v.clone())));
    params
}

fn push_query(params: &ParamMap, query: &mut Vec<(String, String)>) {
    for (key, value) in params {
        value.push_pairs(key, query);
    }
}

/// Form fields for a non-body POST. Any file turns the whole set multipart.
pub fn form_body(fields: &ParamMap) -> RequestBody {
    let mut parts = Vec::new();
    for (key, value) in fields {
        match value {
            ParamValue::Text(text) => parts.push((key.clone(), FormField::Text(text.clone()))),
            ParamValue::File(file) => parts.push((key.clone(), FormField::File(file.clone()))),
            ParamValue::List(items) if items.iter().all(ParamValue::is_file) => {
                for item in items {
                    if let ParamValue::File(file) = item {
                        parts.push((key.clone(), FormField::File(file.clone())));
                    }
                }
            }
            ParamValue::List(items) => {
                for item in items {
                    parts.push((key.clone(), FormField::Text(item.to_text())));
                }
            }
        }
    }

    if parts.is_empty() {
        return RequestBody::Empty;
    }
    if parts.iter().any(|(_, field)| matches!(field, FormField::File(_))) {
        return RequestBody::Multipart(parts);
    }
    RequestBody::Form(
        parts
            .into_iter()
            .filter_map(|(key, field)| match field {
                FormField::Text(text) => Some((key, text)),
                FormField::File(_) => None,
            })
            .collect(),
    )
}

fn serialize_body<B: Serialize + ?Sized>(format: BodyFormat, body: &B) -> Result<String> {
    match format {
        BodyFormat::Json => serde_json::to_string(body)
            .map_err(|e| Error::Serialization(format!("cannot encode body as JSON: {}", e))),
        BodyFormat::Xml => quick_xml::se::to_string(body)
            .map_err(|e| Error::Serialization(format!("cannot encode body as XML: {}", e))),
    }
}
