//! In-process transport.
//!
//! Every payload crossing a [`LocalTransport`] is serialized and parsed back,
//! so client and server never share a value, exactly as over a socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, RpcError};
use crate::traits::{Dispatcher, Transport, TransportClient, TransportServer};

type Slot = Arc<RwLock<Option<Dispatcher>>>;

/// Pairs the clients and the server created from one instance.
#[derive(Clone, Default)]
pub struct LocalTransport {
    slot: Slot,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a server has been created from this instance.
    pub fn is_attached(&self) -> bool {
        read_slot(&self.slot).is_some()
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    /// Creating the server attaches its dispatcher; a later server replaces it.
    fn server(&self, dispatcher: Dispatcher) -> Arc<dyn TransportServer> {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(dispatcher);
        Arc::new(LocalServer {
            listening: AtomicBool::new(false),
        })
    }

    fn client(&self) -> Arc<dyn TransportClient> {
        Arc::new(LocalClient {
            slot: Arc::clone(&self.slot),
            connected: AtomicBool::new(false),
        })
    }
}

struct LocalServer {
    listening: AtomicBool,
}

#[async_trait]
impl TransportServer for LocalServer {
    async fn listen(&self) -> Result<()> {
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn local_addr(&self) -> Option<String> {
        Some("local".to_string())
    }
}

struct LocalClient {
    slot: Slot,
    connected: AtomicBool,
}

#[async_trait]
impl TransportClient for LocalClient {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn call(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError> {
        let dispatcher = read_slot(&self.slot)
            .ok_or_else(|| RpcError::transport("no local server attached"))?;

        let data = force_json(&data).map_err(|err| normalize(format_error(err)))?;
        debug!(method, "local call");

        match dispatcher.dispatch(method, data).await {
            Ok(result) => force_json(&result).map_err(|err| normalize(format_error(err))),
            Err(err) => {
                let error = format_error(err.to_value());
                Err(match force_json(&error) {
                    Ok(error) => normalize(format_error(error)),
                    Err(failure) => normalize(format_error(failure)),
                })
            }
        }
    }
}

fn read_slot(slot: &Slot) -> Option<Dispatcher> {
    slot.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Serialize a value and parse it back, yielding the copy a network peer
/// would receive. Failures come back as the error message.
pub fn force_json(value: &Value) -> std::result::Result<Value, Value> {
    serde_json::to_vec(value)
        .and_then(|bytes| serde_json::from_slice(&bytes))
        .map_err(|err| Value::String(err.to_string()))
}

/// Normalise an error value: values that already carry a non-null `error`
/// field pass through, anything else is wrapped as `{"error": value}`.
pub fn format_error(error: Value) -> Value {
    match &error {
        Value::Object(map) if map.get("error").is_some_and(|inner| !inner.is_null()) => error,
        _ => json!({ "error": error }),
    }
}

fn normalize(error: Value) -> RpcError {
    RpcError::from_value(error)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::traits::dispatch_fn;

    fn echo_transport() -> LocalTransport {
        let transport = LocalTransport::new();
        transport.server(dispatch_fn(|method, data| async move {
            match method.as_str() {
                "echo" => Ok(data),
                "fail" => Err(RpcError::remote("boom")),
                "reject" => Err(RpcError::Validation("bad input".into())),
                _ => Err(RpcError::UnknownMethod(method)),
            }
        }));
        transport
    }

    #[tokio::test]
    async fn call_round_trips_through_json() {
        let transport = echo_transport();
        let client = transport.client();
        let out = client
            .call("echo", json!({"nested": [1, 2, {"a": null}]}))
            .await
            .unwrap();
        assert_eq!(out, json!({"nested": [1, 2, {"a": null}]}));
    }

    #[tokio::test]
    async fn plain_errors_are_wrapped() {
        let client = echo_transport().client();
        let err = client.call("fail", Value::Null).await.unwrap_err();
        assert_eq!(err, RpcError::Remote(json!({"error": "boom"})));
    }

    #[tokio::test]
    async fn structured_errors_pass_through() {
        let client = echo_transport().client();
        assert_eq!(
            client.call("reject", Value::Null).await.unwrap_err(),
            RpcError::Validation("bad input".into())
        );
        assert_eq!(
            client.call("nope", Value::Null).await.unwrap_err(),
            RpcError::UnknownMethod("nope".into())
        );
    }

    #[tokio::test]
    async fn lifecycle_is_idempotent() {
        let transport = echo_transport();
        let server = transport.server(dispatch_fn(|_, data| async move { Ok(data) }));
        server.listen().await.unwrap();
        server.listen().await.unwrap();
        assert!(server.is_listening());
        server.stop().await.unwrap();
        server.stop().await.unwrap();
        assert!(!server.is_listening());

        let client = transport.client();
        client.connect().await.unwrap();
        client.connect().await.unwrap();
        assert!(client.is_connected());
        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn instances_do_not_share_servers() {
        let _attached = echo_transport();
        let detached = LocalTransport::new();
        let err = detached
            .client()
            .call("echo", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn format_error_rules() {
        assert_eq!(format_error(json!({"error": "x"})), json!({"error": "x"}));
        assert_eq!(format_error(json!("x")), json!({"error": "x"}));
        assert_eq!(
            format_error(json!({"error": null, "code": 1})),
            json!({"error": {"error": null, "code": 1}})
        );
    }
}
