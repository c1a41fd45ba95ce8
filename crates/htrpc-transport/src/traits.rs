use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, RpcError};

/// Receives requests that arrive at a transport server.
///
/// A dispatcher may be invoked concurrently for independent requests.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError>;
}

/// Shared dispatcher handed to transport servers.
pub type Dispatcher = Arc<dyn Dispatch>;

struct FnDispatch<F>(F);

#[async_trait]
impl<F, Fut> Dispatch for FnDispatch<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, RpcError>> + Send,
{
    async fn dispatch(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError> {
        (self.0)(method.to_string(), data).await
    }
}

/// Build a dispatcher from an async closure.
pub fn dispatch_fn<F, Fut>(f: F) -> Dispatcher
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, RpcError>> + Send + 'static,
{
    Arc::new(FnDispatch(f))
}

/// The serving half of a transport.
///
/// `listen` and `stop` are idempotent: calling either when already in the
/// target state succeeds without side effects.
#[async_trait]
pub trait TransportServer: Send + Sync {
    async fn listen(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    fn is_listening(&self) -> bool;

    /// The address the server is reachable at, once listening.
    fn local_addr(&self) -> Option<String>;
}

/// The calling half of a transport.
///
/// `connect` and `disconnect` are idempotent. `call` may be invoked again
/// before an earlier call has resolved; each call resolves exactly once.
#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn call(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError>;
}

/// A transport factory: yields servers bound to a dispatcher, and clients.
pub trait Transport: Send + Sync {
    /// Short name used in logs (`local`, `tcp`, `http`).
    fn name(&self) -> &str;

    fn server(&self, dispatcher: Dispatcher) -> Arc<dyn TransportServer>;

    fn client(&self) -> Arc<dyn TransportClient>;
}
