//! reqwest-based transport running on a tokio worker pool

use std::fmt;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::AbortHandle;

use super::{
    CancelHandle, Completion, FormField, RequestBody, ResponseBody, ResponseEnvelope,
    ResponseMode, Transport, TransportRequest,
};
use crate::config::TransportConfig;
use crate::descriptor::HttpVerb;
use crate::error::{Error, Result};

/// Worker pool the async calls run on. An owned runtime is shut down in the
/// background so dropping the transport never blocks or panics inside async code.
struct Workers {
    handle: Handle,
    owned: Option<Runtime>,
}

impl Drop for Workers {
    fn drop(&mut self) {
        if let Some(runtime) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    workers: Arc<Workers>,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("client", &self.client)
            .field("owns_runtime", &self.workers.owned.is_some())
            .finish()
    }
}

impl ReqwestTransport {
    /// Default client and a dedicated multi-thread runtime.
    pub fn new() -> Result<Self> {
        Self::from_config(&TransportConfig::default())
    }

    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let mut runtime = Builder::new_multi_thread();
        runtime.enable_all().thread_name("rest-kit-worker");
        if let Some(threads) = config.worker_threads {
            runtime.worker_threads(threads);
        }
        let runtime = runtime.build().map_err(|e| {
            Error::Configuration(format!("failed to start transport workers: {}", e))
        })?;

        Ok(Self {
            client,
            workers: Arc::new(Workers {
                handle: runtime.handle().clone(),
                owned: Some(runtime),
            }),
        })
    }

    /// Shares an existing runtime instead of starting one.
    pub fn with_handle(client: reqwest::Client, handle: Handle) -> Self {
        Self {
            client,
            workers: Arc::new(Workers {
                handle,
                owned: None,
            }),
        }
    }

    fn build(&self, request: TransportRequest) -> Result<reqwest::RequestBuilder> {
        let method = match request.method {
            HttpVerb::Get => Method::GET,
            HttpVerb::Post => Method::POST,
            HttpVerb::Put => Method::PUT,
            HttpVerb::Delete => Method::DELETE,
            HttpVerb::Patch => Method::PATCH,
            HttpVerb::Head => Method::HEAD,
            HttpVerb::Options => Method::OPTIONS,
            HttpVerb::Trace => Method::TRACE,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((username, password)) = &request.basic_auth {
            builder = builder.basic_auth(username, Some(password));
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Raw(payload) => builder.body(payload),
            RequestBody::Multipart(fields) => builder.multipart(multipart_form(fields)?),
        };
        Ok(builder)
    }
}

fn multipart_form(fields: Vec<(String, FormField)>) -> Result<Form> {
    let mut form = Form::new();
    for (name, field) in fields {
        form = match field {
            FormField::Text(value) => form.text(name, value),
            FormField::File(file) => {
                let mut part = Part::bytes(file.content.to_vec()).file_name(file.file_name);
                if let Some(content_type) = &file.content_type {
                    part = part.mime_str(content_type).map_err(|e| {
                        Error::Configuration(format!(
                            "invalid content type {}: {}",
                            content_type, e
                        ))
                    })?;
                }
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

async fn send(builder: reqwest::RequestBuilder, mode: ResponseMode) -> Result<ResponseEnvelope> {
    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = match mode {
        ResponseMode::Binary => ResponseBody::Binary(response.bytes().await?),
        ResponseMode::Text => {
            let text = response.text().await?;
            if text.is_empty() {
                ResponseBody::Empty
            } else {
                ResponseBody::Text(text)
            }
        }
    };

    Ok(ResponseEnvelope {
        status,
        headers,
        body,
    })
}

struct TaskCancel(AbortHandle);

impl CancelHandle for TaskCancel {
    fn cancel(&self) -> bool {
        let finished = self.0.is_finished();
        self.0.abort();
        !finished
    }
}

struct Finished;

impl CancelHandle for Finished {
    fn cancel(&self) -> bool {
        false
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: TransportRequest, mode: ResponseMode) -> Result<ResponseEnvelope> {
        let builder = self.build(request)?;
        let (tx, rx) = mpsc::channel();
        self.workers.handle.spawn(async move {
            let _ = tx.send(send(builder, mode).await);
        });
        rx.recv()
            .map_err(|_| Error::transport("transport worker stopped before the response arrived"))?
    }

    fn execute_async(
        &self,
        request: TransportRequest,
        mode: ResponseMode,
        on_complete: Completion,
    ) -> Box<dyn CancelHandle> {
        match self.build(request) {
            Ok(builder) => {
                let task = self.workers.handle.spawn(async move {
                    on_complete(send(builder, mode).await);
                });
                Box::new(TaskCancel(task.abort_handle()))
            }
            Err(e) => {
                on_complete(Err(e));
                Box::new(Finished)
            }
        }
    }
}
