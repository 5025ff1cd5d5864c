//! Metadata errors surface when a client is built, not when it is called

use rest_kit::{rest_client, ClientConfig, Error, Executor, Result};

#[rest_client(prefix = "/orders")]
pub trait OrderApi {
    // `{id}` is missing from the route.
    #[request(GET, "/latest")]
    fn latest(&self, #[path] id: u64) -> Result<String>;
}

#[rest_client(prefix = "/carts", client = CartService)]
pub trait CartApi {
    #[request(GET, "/{id}")]
    fn find(&self, #[path] id: u64, #[body] filter: &str) -> Result<String>;
}

#[rest_client]
pub trait PingApi {
    #[request(GET, POST, "/ping")]
    fn ping(&self) -> Result<()>;
}

#[rest_client(prefix = "/stock")]
pub trait StockApi {
    #[request(GET, "/{sku}", fixed(sku = "x"))]
    fn level(&self, #[path] sku: &str) -> Result<u32>;
}

fn executor() -> Executor {
    Executor::builder()
        .base_url("http://127.0.0.1:9")
        .build()
        .unwrap()
}

fn assert_configuration<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
    match result {
        Err(Error::Configuration(message)) => {
            assert!(message.contains(needle), "unexpected message: {}", message)
        }
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_route_key_without_placeholder() {
    assert_configuration(OrderApiClient::new(executor()), "OrderApi::latest");
}

#[test]
fn test_body_on_get_and_custom_client_name() {
    assert_configuration(CartService::new(executor()), "body");
}

#[test]
fn test_ambiguous_verbs() {
    assert_configuration(PingApiClient::new(executor()), "PingApi::ping");
}

#[test]
fn test_fixed_param_colliding_with_binding() {
    assert_configuration(StockApiClient::new(executor()), "sku");
}

#[test]
fn test_compile_all_reports_broken_registrations() {
    assert!(matches!(
        rest_kit::registry::compile_all(),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_executor_from_toml_config() {
    let config = ClientConfig::from_toml_str(
        r#"
        default_base_url = "http://localhost:8080"

        [basic_auth]
        username = "svc"
        password = "secret"

        [transport]
        timeout_ms = 1500
        worker_threads = 2
        "#,
    )
    .unwrap();
    assert!(Executor::from_config(&config).is_ok());
    assert_eq!(config.base_url_for("OrderApi"), Some("http://localhost:8080"));
}
