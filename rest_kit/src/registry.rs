//! Link-time registry of every `#[rest_client]` trait in the binary.

use crate::descriptor::{MethodDescriptor, MethodMetadata};
use crate::error::Result;
use crate::template::{compile, RequestTemplate};

/// Submitted by `#[rest_client]` for each annotated trait.
pub struct ApiRegistration {
    pub api: &'static str,
    /// Class-level route fragment.
    pub prefix: &'static str,
    pub methods: fn() -> Vec<(MethodDescriptor, MethodMetadata)>,
}

impl ApiRegistration {
    pub fn compile(&self) -> Result<Vec<RequestTemplate>> {
        (self.methods)()
            .into_iter()
            .map(|(descriptor, metadata)| compile(&descriptor, self.prefix, metadata))
            .collect()
    }
}

impl std::fmt::Debug for ApiRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRegistration")
            .field("api", &self.api)
            .field("prefix", &self.prefix)
            .finish()
    }
}

inventory::collect!(ApiRegistration);

pub fn registered_apis() -> impl Iterator<Item = &'static ApiRegistration> {
    inventory::iter::<ApiRegistration>.into_iter()
}

pub fn find_api(api: &str) -> Option<&'static ApiRegistration> {
    registered_apis().find(|r| r.api == api)
}

/// Compiles every registered method, returning how many compiled. The first
/// invalid method aborts with its `Configuration` error.
pub fn compile_all() -> Result<usize> {
    let mut count = 0;
    for registration in registered_apis() {
        count += registration.compile()?.len();
        tracing::debug!(target: "rest_kit", api = registration.api, "compiled client metadata");
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{HttpVerb, ParamDescriptor, ReturnShape};
    use crate::error::Error;

    fn ping_methods() -> Vec<(MethodDescriptor, MethodMetadata)> {
        vec![(
            MethodDescriptor::new("PingApi", "ping", ReturnShape::Text),
            MethodMetadata::new().verb(HttpVerb::Get).path("/ping"),
        )]
    }

    inventory::submit! {
        ApiRegistration {
            api: "PingApi",
            prefix: "/health",
            methods: ping_methods,
        }
    }

    #[test]
    fn test_registered_api_is_discoverable() {
        let registration = find_api("PingApi").unwrap();
        let templates = registration.compile().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].prefix(), "/health/ping");
        assert!(compile_all().unwrap() >= 1);
    }

    #[test]
    fn test_invalid_registration_reports_configuration_error() {
        fn broken() -> Vec<(MethodDescriptor, MethodMetadata)> {
            vec![(
                MethodDescriptor::new("BrokenApi", "get", ReturnShape::Unit)
                    .param(ParamDescriptor::route("id", "u64")),
                MethodMetadata::new().verb(HttpVerb::Get),
            )]
        }
        let registration = ApiRegistration {
            api: "BrokenApi",
            prefix: "/broken",
            methods: broken,
        };
        assert!(matches!(
            registration.compile(),
            Err(Error::Configuration(_))
        ));
    }
}
