//! The calling side: named connections, response schemas and middleware.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use futures_util::future::try_join_all;
use htrpc_schema::Validator;
use htrpc_transport::{
    HttpTransport, LocalTransport, RpcError, TcpTransport, Transport, TransportClient,
    TransportError, TransportServer,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::chain::Chain;
use crate::context::{CallContext, MiddlewareFilter};
use crate::error::{PeerError, Result};
use crate::middleware::{Middleware, Stack};
use crate::service::Service;

const EVENT_CAPACITY: usize = 64;

/// What a client name is bound to.
pub enum Endpoint {
    Transport(Arc<dyn Transport>),
    /// An in-process service, reached through a private [`LocalTransport`].
    Service(Service),
}

impl From<Service> for Endpoint {
    fn from(service: Service) -> Self {
        Self::Service(service)
    }
}

impl From<Arc<dyn Transport>> for Endpoint {
    fn from(transport: Arc<dyn Transport>) -> Self {
        Self::Transport(transport)
    }
}

impl From<LocalTransport> for Endpoint {
    fn from(transport: LocalTransport) -> Self {
        Self::Transport(Arc::new(transport))
    }
}

impl From<TcpTransport> for Endpoint {
    fn from(transport: TcpTransport) -> Self {
        Self::Transport(Arc::new(transport))
    }
}

impl From<HttpTransport> for Endpoint {
    fn from(transport: HttpTransport) -> Self {
        Self::Transport(Arc::new(transport))
    }
}

/// Client lifecycle notifications, see [`Client::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Added(String),
    Removed(String),
    Connected(String),
    Disconnected(String),
    /// A call succeeded. Names the target as middleware left it.
    Called { service: String, method: String },
}

struct Connection {
    transport: String,
    client: Arc<dyn TransportClient>,
    // Keeps an in-process service alive for as long as it is registered.
    local: Option<(Service, Arc<dyn TransportServer>)>,
}

struct Inner {
    connections: RwLock<BTreeMap<String, Arc<Connection>>>,
    schemas: RwLock<HashMap<(String, String), Validator>>,
    before: Stack,
    after: Stack,
    events: broadcast::Sender<ClientEvent>,
}

/// Calls methods on named services.
///
/// `Client` is a handle: clones share connections, schemas and middleware.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("services", &self.services())
            .finish()
    }
}

impl Client {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                connections: RwLock::new(BTreeMap::new()),
                schemas: RwLock::new(HashMap::new()),
                before: Stack::default(),
                after: Stack::default(),
                events,
            }),
        }
    }

    /// Build a client over several endpoints at once.
    pub fn with_services<I, K, E>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Endpoint>,
    {
        let client = Self::new();
        for (name, endpoint) in services {
            client.add(name, endpoint)?;
        }
        Ok(client)
    }

    /// Register `name`. Fails if the name is taken.
    ///
    /// A [`Service`] is attached to a fresh [`LocalTransport`] whose client
    /// becomes the connection.
    pub fn add(&self, name: impl Into<String>, endpoint: impl Into<Endpoint>) -> Result<&Self> {
        let name = name.into();
        let mut connections = self
            .inner
            .connections
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if connections.contains_key(&name) {
            return Err(PeerError::DuplicateService(name));
        }

        let connection = match endpoint.into() {
            Endpoint::Transport(transport) => Connection {
                transport: transport.name().to_string(),
                client: transport.client(),
                local: None,
            },
            Endpoint::Service(service) => {
                let transport = LocalTransport::new();
                let server = service.attach(Arc::new(transport.clone()));
                Connection {
                    transport: transport.name().to_string(),
                    client: transport.client(),
                    local: Some((service, server)),
                }
            }
        };
        debug!(service = %name, transport = %connection.transport, "added service");
        connections.insert(name.clone(), Arc::new(connection));
        drop(connections);

        self.emit(ClientEvent::Added(name));
        Ok(self)
    }

    /// Unregister `name`. Returns whether it was registered.
    ///
    /// An in-process service also loses the server it was attached with.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self
            .inner
            .connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        let Some(connection) = removed else {
            return false;
        };
        if let Some((service, server)) = &connection.local {
            service.detach(server);
        }
        self.emit(ClientEvent::Removed(name.to_string()));
        true
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<String> {
        self.inner
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.inner
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Validate responses of `(service, method)` before they are returned.
    pub fn add_schema(&self, service: &str, method: &str, schema: Validator) -> &Self {
        self.inner
            .schemas
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((service.to_string(), method.to_string()), schema);
        self
    }

    /// Add middleware that runs before the connection is chosen.
    pub fn before(&self, middleware: impl Middleware + 'static, filter: MiddlewareFilter) -> &Self {
        self.inner.before.push(Arc::new(middleware), filter);
        self
    }

    /// Add middleware that runs over call results.
    pub fn after(&self, middleware: impl Middleware + 'static, filter: MiddlewareFilter) -> &Self {
        self.inner.after.push(Arc::new(middleware), filter);
        self
    }

    /// Receive lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn connections(&self) -> Vec<(String, Arc<Connection>)> {
        self.inner
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, connection)| (name.clone(), Arc::clone(connection)))
            .collect()
    }

    fn connection(&self, service: &str) -> Option<Arc<Connection>> {
        self.inner
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(service)
            .cloned()
    }

    fn schema(&self, service: &str, method: &str) -> Option<Validator> {
        self.inner
            .schemas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(service.to_string(), method.to_string()))
            .cloned()
    }

    /// Connect every registered connection concurrently, announcing each
    /// one as it comes up. The first failure is returned.
    pub async fn connect(&self) -> Result<()> {
        let connections = self.connections();
        try_join_all(connections.iter().map(|(name, connection)| async move {
            connection.client.connect().await?;
            self.emit(ClientEvent::Connected(name.clone()));
            Ok::<_, TransportError>(())
        }))
        .await?;
        info!(services = connections.len(), "client connected");
        Ok(())
    }

    /// Disconnect every registered connection concurrently. Registrations
    /// are kept, so a later [`Client::connect`] reopens them.
    pub async fn disconnect(&self) -> Result<()> {
        let connections = self.connections();
        try_join_all(connections.iter().map(|(name, connection)| async move {
            connection.client.disconnect().await?;
            self.emit(ClientEvent::Disconnected(name.clone()));
            Ok::<_, TransportError>(())
        }))
        .await?;
        info!(services = connections.len(), "client disconnected");
        Ok(())
    }

    /// Call `method` on `service`.
    ///
    /// Before middleware may redirect the call by rewriting the context.
    /// A response schema registered for the requested `(service, method)`
    /// is applied to the final result.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        data: Value,
    ) -> std::result::Result<Value, RpcError> {
        let mut context = CallContext::new(service, method);
        let data = self.inner.before.run(&mut context, data).await?;

        let connection = self
            .connection(&context.service)
            .ok_or_else(|| RpcError::UnknownService(context.service.clone()))?;

        debug!(
            service = %context.service,
            method = %context.method,
            transport = %connection.transport,
            "calling"
        );
        let result = connection.client.call(&context.method, data).await?;
        let result = self.inner.after.run(&mut context, result).await?;

        let result = match self.schema(service, method) {
            Some(schema) => schema
                .validate(&result)
                .map_err(|err| RpcError::Validation(err.message()))?,
            None => result,
        };
        self.emit(ClientEvent::Called {
            service: context.service,
            method: context.method,
        });
        Ok(result)
    }

    /// A reusable call with bound target and, optionally, data.
    pub fn prepare(&self, service: &str, method: &str, data: Value) -> Prepared {
        Prepared {
            client: self.clone(),
            service: service.to_string(),
            method: method.to_string(),
            data,
        }
    }

    /// Start a call chain. See [`Chain::end`].
    pub fn chain(&self, service: &str, method: &str, data: Value) -> Chain {
        Chain::new(self.clone(), service, method, data)
    }

    /// A handle scoped to one service.
    pub fn service(&self, name: &str) -> ServiceProxy {
        ServiceProxy {
            client: self.clone(),
            service: name.to_string(),
        }
    }
}

/// A call returned by [`Client::prepare`].
#[derive(Debug, Clone)]
pub struct Prepared {
    client: Client,
    service: String,
    method: String,
    data: Value,
}

impl Prepared {
    /// Call with the bound data.
    pub async fn call(&self) -> std::result::Result<Value, RpcError> {
        self.client
            .call(&self.service, &self.method, self.data.clone())
            .await
    }

    /// Call with `data` instead of the bound data.
    pub async fn call_with(&self, data: Value) -> std::result::Result<Value, RpcError> {
        self.client.call(&self.service, &self.method, data).await
    }
}

/// A client handle scoped to one service, see [`Client::service`].
#[derive(Debug, Clone)]
pub struct ServiceProxy {
    client: Client,
    service: String,
}

impl ServiceProxy {
    pub fn name(&self) -> &str {
        &self.service
    }

    pub async fn call(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError> {
        self.client.call(&self.service, method, data).await
    }

    pub fn prepare(&self, method: &str, data: Value) -> Prepared {
        self.client.prepare(&self.service, method, data)
    }
}
