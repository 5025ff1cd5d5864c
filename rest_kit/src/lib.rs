//! # rest_kit - declarative HTTP clients
//!
//! Describe a remote HTTP API as an annotated Rust trait and call it like
//! local code. `#[rest_client]` generates a client struct whose methods turn
//! their arguments into HTTP requests and decode the responses back into the
//! declared return types.
//!
//! ## Core pieces:
//!
//! - **`#[rest_client]`** (feature `macros`): expands a trait into a
//!   `<Trait>Client` and registers it with [`registry`].
//! - **[`compile`]**: validates a method's metadata once and produces an
//!   immutable [`RequestTemplate`].
//! - **[`Executor`]**: builds, signs, logs and sends requests for a template,
//!   blocking or via a [`CallFuture`].
//! - **[`Transport`]**: the network seam, with [`ReqwestTransport`] as default.
//!
//! ```ignore
//! use rest_kit::{rest_client, Executor};
//!
//! #[rest_client(prefix = "/todos")]
//! pub trait TodoApi {
//!     #[request(GET, "/{id}")]
//!     fn get(&self, #[path] id: u64) -> rest_kit::Result<Todo>;
//! }
//!
//! let executor = Executor::builder().base_url("http://localhost:8080").build()?;
//! let client = TodoApiClient::new(executor)?;
//! let todo = client.get(1)?;
//! ```

pub mod config;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod future;
pub mod logger;
pub mod params;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod status;
pub mod success;
pub mod template;
pub mod transport;

pub use config::{BasicAuthConfig, ClientConfig, TransportConfig};
pub use decode::Reply;
pub use descriptor::{
    HttpVerb, MethodDescriptor, MethodMetadata, ParamDescriptor, ParamRole, ReturnShape,
};
pub use error::{BoxError, Error, Result};
pub use executor::{Executor, ExecutorBuilder};
pub use future::CallFuture;
pub use logger::{CallLabel, RequestLogger, TracingLogger};
pub use params::{CallContext, FilePart, ParamMap, ParamValue, ToParam};
pub use provider::{
    BaseUrlProvider, BasicAuth, BasicAuthProvider, ConfigBaseUrls, NoSign, SignProvider,
    StaticBaseUrl,
};
pub use status::StatusErrorMapper;
pub use success::SuccessProperty;
pub use template::{compile, BodyFormat, RequestTemplate};
pub use transport::{
    CancelHandle, ReqwestTransport, ResponseBody, ResponseEnvelope, ResponseMode, Transport,
    TransportRequest,
};

pub use bytes::Bytes;

// Used by `#[rest_client]` expansions.
#[doc(hidden)]
pub use inventory;

#[cfg(feature = "macros")]
pub use rest_kit_macros::rest_client;
