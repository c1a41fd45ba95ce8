//! Before/after middleware.
//!
//! A middleware receives the call context and the current payload and
//! returns the payload to pass on. Returning an error aborts the call with
//! that error. Middleware in one stage run strictly in registration order.

use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use htrpc_transport::RpcError;
use serde_json::Value;

use crate::context::{CallContext, MiddlewareFilter};

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, context: &mut CallContext, data: Value) -> Result<Value, RpcError>;
}

#[async_trait]
impl<F> Middleware for F
where
    F: Fn(&mut CallContext, Value) -> Result<Value, RpcError> + Send + Sync,
{
    async fn handle(&self, context: &mut CallContext, data: Value) -> Result<Value, RpcError> {
        (self)(context, data)
    }
}

/// Pin a synchronous closure to the middleware signature so its argument
/// types can be inferred.
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&mut CallContext, Value) -> Result<Value, RpcError> + Send + Sync,
{
    f
}

/// Middleware built from an async closure by [`from_async_fn`].
pub struct AsyncFn<F>(F);

/// Adapt an async closure into a [`Middleware`].
///
/// The closure owns the context for the duration of the call and hands it
/// back, possibly rewritten, together with the payload.
pub fn from_async_fn<F, Fut>(f: F) -> AsyncFn<F>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(CallContext, Value), RpcError>> + Send,
{
    AsyncFn(f)
}

#[async_trait]
impl<F, Fut> Middleware for AsyncFn<F>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(CallContext, Value), RpcError>> + Send,
{
    async fn handle(&self, context: &mut CallContext, data: Value) -> Result<Value, RpcError> {
        let (rewritten, data) = (self.0)(context.clone(), data).await?;
        *context = rewritten;
        Ok(data)
    }
}

#[derive(Clone)]
pub(crate) struct Entry {
    middleware: Arc<dyn Middleware>,
    filter: MiddlewareFilter,
}

/// An ordered list of filtered middleware, shared by clones of its owner.
#[derive(Clone, Default)]
pub(crate) struct Stack {
    entries: Arc<RwLock<Vec<Entry>>>,
}

impl Stack {
    pub(crate) fn push(&self, middleware: Arc<dyn Middleware>, filter: MiddlewareFilter) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Entry { middleware, filter });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run every matching middleware in order, threading the payload.
    pub(crate) async fn run(
        &self,
        context: &mut CallContext,
        mut data: Value,
    ) -> Result<Value, RpcError> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for entry in entries {
            if entry.filter.matches(context) {
                data = entry.middleware.handle(context, data).await?;
            }
        }
        Ok(data)
    }
}
