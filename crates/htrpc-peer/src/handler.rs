//! Method handlers.
//!
//! A handler is an async function from the validated payload to a result.
//! Callback-style handlers are adapted through [`Responder`], which can be
//! used at most once.

use std::future::Future;

use async_trait::async_trait;
use htrpc_transport::RpcError;
use serde_json::Value;
use tokio::sync::oneshot;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, data: Value) -> Result<Value, RpcError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, RpcError>> + Send,
{
    async fn call(&self, data: Value) -> Result<Value, RpcError> {
        (self)(data).await
    }
}

/// Completes one callback-style call.
///
/// Responding consumes the responder, so a call cannot be resolved twice.
/// Dropping it without responding fails the call.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Result<Value, RpcError>>,
}

impl Responder {
    pub fn respond(self, result: Result<Value, RpcError>) {
        // The caller may have gone away; nothing to deliver to.
        let _ = self.tx.send(result);
    }

    pub fn ok(self, value: impl Into<Value>) {
        self.respond(Ok(value.into()));
    }

    pub fn err(self, error: RpcError) {
        self.respond(Err(error));
    }
}

/// Handler adapter for closures that answer through a [`Responder`].
pub struct CallbackHandler<F>(F);

impl<F> CallbackHandler<F>
where
    F: Fn(Value, Responder) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Handler for CallbackHandler<F>
where
    F: Fn(Value, Responder) + Send + Sync,
{
    async fn call(&self, data: Value) -> Result<Value, RpcError> {
        let (tx, rx) = oneshot::channel();
        (self.0)(data, Responder { tx });
        rx.await
            .unwrap_or_else(|_| Err(RpcError::remote("handler dropped the call without responding")))
    }
}
