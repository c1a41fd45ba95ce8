//! The serving side: method registry, middleware and dispatch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use futures_util::future::try_join_all;
use htrpc_schema::{any, array, object, string, Validator};
use htrpc_transport::{dispatch_fn, Dispatcher, RpcError, Transport, TransportServer};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::context::{CallContext, MiddlewareFilter};
use crate::error::{PeerError, Result};
use crate::handler::{CallbackHandler, Handler, Responder};
use crate::middleware::{Middleware, Stack};

/// Runs a sequence of calls on the same service, threading results.
pub const MULTI_CALL: &str = "$htMultiCall";
/// Documents the schema of one method.
pub const GET_SCHEMA: &str = "$htGetSchema";
/// Documents the schemas of every user method.
pub const GET_ALL_SCHEMAS: &str = "$htGetAllSchemas";
/// Prefix reserved for built-in methods.
pub const RESERVED_PREFIX: &str = "$ht";

/// Service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Name reported as [`CallContext::service`] to service middleware.
    pub name: Option<String>,
}

impl ServiceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

struct Registration {
    schema: Option<Validator>,
    handler: Arc<dyn Handler>,
}

struct Attached {
    transport: String,
    server: Arc<dyn TransportServer>,
}

struct Inner {
    config: ServiceConfig,
    methods: RwLock<HashMap<String, Arc<Registration>>>,
    before: Stack,
    after: Stack,
    servers: RwLock<Vec<Attached>>,
    listening: AtomicBool,
    lifecycle: tokio::sync::Mutex<()>,
}

/// A set of methods reachable through any number of transports.
///
/// `Service` is a handle: clones share registrations, middleware and
/// servers. Servers created for it only hold a weak reference, so the
/// service must be kept alive by its owner for calls to succeed.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name())
            .field("methods", &self.methods())
            .field("listening", &self.is_listening())
            .finish()
    }
}

impl Service {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let service = Self {
            inner: Arc::new(Inner {
                config,
                methods: RwLock::new(HashMap::new()),
                before: Stack::default(),
                after: Stack::default(),
                servers: RwLock::new(Vec::new()),
                listening: AtomicBool::new(false),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        };
        service.install_builtins();
        service
    }

    /// Build a service with servers on `transports`. Nothing is started
    /// until [`Service::listen`].
    pub fn with_transports<I>(config: ServiceConfig, transports: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Transport>>,
    {
        let service = Self::with_config(config);
        for transport in transports {
            service.attach(transport);
        }
        service
    }

    /// Configured name, empty when unset.
    pub fn name(&self) -> &str {
        self.inner.config.name.as_deref().unwrap_or_default()
    }

    /// Register a method without a schema. A later registration under the
    /// same name replaces the earlier one.
    pub fn on<F, Fut>(&self, method: &str, handler: F) -> Result<&Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, RpcError>> + Send + 'static,
    {
        self.on_handler(method, None, Arc::new(handler))
    }

    /// Register a method whose payload is validated before the handler
    /// runs. The handler receives the validated value.
    pub fn on_schema<F, Fut>(&self, method: &str, schema: Validator, handler: F) -> Result<&Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, RpcError>> + Send + 'static,
    {
        self.on_handler(method, Some(schema), Arc::new(handler))
    }

    /// Register a callback-style method that answers through a [`Responder`].
    pub fn on_callback<F>(&self, method: &str, schema: Option<Validator>, handler: F) -> Result<&Self>
    where
        F: Fn(Value, Responder) + Send + Sync + 'static,
    {
        self.on_handler(method, schema, Arc::new(CallbackHandler::new(handler)))
    }

    pub fn on_handler(
        &self,
        method: &str,
        schema: Option<Validator>,
        handler: Arc<dyn Handler>,
    ) -> Result<&Self> {
        if method.is_empty() || method.starts_with(RESERVED_PREFIX) {
            return Err(PeerError::InvalidMethod(method.to_string()));
        }
        self.insert(method, schema, handler);
        Ok(self)
    }

    fn insert(&self, method: &str, schema: Option<Validator>, handler: Arc<dyn Handler>) {
        debug!(service = self.name(), method, "registered method");
        self.inner
            .methods
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(method.to_string(), Arc::new(Registration { schema, handler }));
    }

    /// Add middleware that runs before method lookup and validation.
    pub fn before(&self, middleware: impl Middleware + 'static, filter: MiddlewareFilter) -> &Self {
        self.inner.before.push(Arc::new(middleware), filter);
        self
    }

    /// Add middleware that runs over handler results.
    pub fn after(&self, middleware: impl Middleware + 'static, filter: MiddlewareFilter) -> &Self {
        self.inner.after.push(Arc::new(middleware), filter);
        self
    }

    /// Registered user methods, sorted. Built-ins are not listed.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .methods
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|name| !name.starts_with(RESERVED_PREFIX))
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    fn registration(&self, method: &str) -> Option<Arc<Registration>> {
        self.inner
            .methods
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(method)
            .cloned()
    }

    /// A dispatcher feeding this service, for transport servers.
    pub fn dispatcher(&self) -> Dispatcher {
        let weak = Arc::downgrade(&self.inner);
        dispatch_fn(move |method, data| {
            let weak = weak.clone();
            async move { upgrade(&weak)?.call(&method, data).await }
        })
    }

    /// Create a server on `transport` without starting it.
    ///
    /// Use [`Service::add_transport`] to also start it when the service is
    /// already listening.
    pub fn attach(&self, transport: Arc<dyn Transport>) -> Arc<dyn TransportServer> {
        let server = transport.server(self.dispatcher());
        info!(service = self.name(), transport = transport.name(), "attached transport");
        self.inner
            .servers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Attached {
                transport: transport.name().to_string(),
                server: Arc::clone(&server),
            });
        server
    }

    /// Forget a server returned by [`Service::attach`]. The server is not
    /// stopped; it is dropped once its other owners let go.
    pub fn detach(&self, server: &Arc<dyn TransportServer>) -> bool {
        let mut servers = self.inner.servers.write().unwrap_or_else(|e| e.into_inner());
        let attached = servers.len();
        servers.retain(|entry| !Arc::ptr_eq(&entry.server, server));
        let detached = servers.len() < attached;
        if detached {
            debug!(service = self.name(), "detached transport");
        }
        detached
    }

    #[cfg(test)]
    pub(crate) fn attached(&self) -> usize {
        self.inner.servers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Attach a transport; if the service is listening, start its server now.
    pub async fn add_transport(&self, transport: impl Transport + 'static) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let server = self.attach(Arc::new(transport));
        if self.is_listening() {
            server.listen().await?;
        }
        Ok(())
    }

    fn servers(&self) -> Vec<Arc<dyn TransportServer>> {
        self.inner
            .servers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|attached| Arc::clone(&attached.server))
            .collect()
    }

    /// Start every attached server. A no-op when already listening.
    pub async fn listen(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.is_listening() {
            return Ok(());
        }
        let servers = self.servers();
        try_join_all(servers.iter().map(|server| server.listen())).await?;
        self.inner.listening.store(true, Ordering::SeqCst);
        info!(service = self.name(), servers = servers.len(), "service listening");
        Ok(())
    }

    /// Stop every attached server. A no-op when not listening.
    pub async fn stop(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if !self.is_listening() {
            return Ok(());
        }
        let servers = self.servers();
        try_join_all(servers.iter().map(|server| server.stop())).await?;
        self.inner.listening.store(false, Ordering::SeqCst);
        info!(service = self.name(), "service stopped");
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::SeqCst)
    }

    /// Addresses of started servers, as `transport address` pairs.
    pub fn addresses(&self) -> Vec<(String, String)> {
        self.inner
            .servers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|attached| attached.server.is_listening())
            .filter_map(|attached| {
                let addr = attached.server.local_addr()?;
                Some((attached.transport.clone(), addr))
            })
            .collect()
    }

    /// Invoke a method in process, through middleware and validation but
    /// without any transport.
    pub async fn call(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError> {
        let mut context = CallContext::new(self.name(), method);
        let data = self.inner.before.run(&mut context, data).await?;

        let registration = self
            .registration(&context.method)
            .ok_or_else(|| RpcError::UnknownMethod(context.method.clone()))?;

        let data = match &registration.schema {
            Some(schema) => schema
                .validate(&data)
                .map_err(|err| RpcError::Validation(err.message()))?,
            None => data,
        };

        debug!(service = self.name(), method = %context.method, "dispatching call");
        let result = registration.handler.call(data).await?;
        self.inner.after.run(&mut context, result).await
    }

    fn install_builtins(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.insert(
            MULTI_CALL,
            Some(multi_call_schema()),
            Arc::new(move |data: Value| multi_call(weak.clone(), data)),
        );
        let weak = Arc::downgrade(&self.inner);
        self.insert(
            GET_SCHEMA,
            None,
            Arc::new(move |data: Value| get_schema(weak.clone(), data)),
        );
        let weak = Arc::downgrade(&self.inner);
        self.insert(
            GET_ALL_SCHEMAS,
            None,
            Arc::new(move |_: Value| get_all_schemas(weak.clone())),
        );
    }

    /// `null` for methods without a schema.
    fn schema_document(&self, method: &str) -> std::result::Result<Value, RpcError> {
        let registration = self
            .registration(method)
            .ok_or_else(|| RpcError::UnknownMethod(method.to_string()))?;
        match &registration.schema {
            Some(schema) => schema
                .document()
                .map_err(|err| RpcError::remote(err.to_string())),
            None => Ok(Value::Null),
        }
    }
}

#[derive(Deserialize)]
struct MultiCallEntry {
    method: String,
    #[serde(default)]
    data: Value,
}

fn multi_call_schema() -> Validator {
    array([object([("method", string()), ("data", any().opt())])])
}

async fn multi_call(service: Weak<Inner>, data: Value) -> std::result::Result<Value, RpcError> {
    let service = upgrade(&service)?;
    let calls: Vec<MultiCallEntry> =
        serde_json::from_value(data).map_err(|err| RpcError::Validation(err.to_string()))?;

    let mut last = Value::Null;
    for entry in calls {
        let data = if entry.data.is_null() { last } else { entry.data };
        last = service
            .call(&entry.method, data)
            .await
            .map_err(|error| RpcError::MultiCall {
                error: Box::new(error),
                method: entry.method.clone(),
                service: None,
            })?;
    }
    Ok(last)
}

/// Accepts the method name as a string or as `{"method": name}`.
async fn get_schema(service: Weak<Inner>, data: Value) -> std::result::Result<Value, RpcError> {
    let service = upgrade(&service)?;
    let method = match &data {
        Value::String(method) => method.as_str(),
        Value::Object(map) => map.get("method").and_then(Value::as_str).unwrap_or_default(),
        _ => "",
    };
    if method.is_empty() {
        return Err(RpcError::Validation(format!("{GET_SCHEMA} expects a method name")));
    }
    service.schema_document(method)
}

async fn get_all_schemas(service: Weak<Inner>) -> std::result::Result<Value, RpcError> {
    let service = upgrade(&service)?;
    let mut documents = Map::new();
    for method in service.methods() {
        match service.schema_document(&method) {
            Ok(document) => {
                documents.insert(method, document);
            }
            Err(err) => debug!(method = %method, error = %err, "skipping schema"),
        }
    }
    Ok(Value::Object(documents))
}

fn upgrade(weak: &Weak<Inner>) -> std::result::Result<Service, RpcError> {
    weak.upgrade()
        .map(|inner| Service { inner })
        .ok_or_else(|| RpcError::transport("service is no longer running"))
}

#[cfg(test)]
mod tests {
    use htrpc_schema::{number, Args, ValidatorRegistry};
    use htrpc_transport::{LocalTransport, TransportClient};
    use serde_json::json;

    use super::*;
    use crate::middleware::{from_async_fn, from_fn};

    fn doubling_service() -> Service {
        let service = Service::new();
        service
            .on_schema("double", object([("number", number())]), |data: Value| async move {
                let n = data["number"].as_i64().unwrap_or_default();
                Ok(json!(n * 2))
            })
            .expect("double should register");
        service
    }

    #[tokio::test]
    async fn double_coerces_and_validates() {
        let service = doubling_service();
        assert_eq!(
            service.call("double", json!({"number": "5"})).await.unwrap(),
            json!(10)
        );

        let err = service.call("double", json!({"number": "x"})).await.unwrap_err();
        assert!(err.is_validation(), "got {err:?}");
    }

    #[tokio::test]
    async fn unknown_methods_are_reported_by_name() {
        let service = Service::new();
        assert_eq!(
            service.call("missing", Value::Null).await.unwrap_err(),
            RpcError::UnknownMethod("missing".into())
        );
    }

    #[tokio::test]
    async fn validation_failures_never_reach_the_handler() {
        let service = Service::new();
        service
            .on_schema("guarded", object([("a", number())]), |_: Value| async move {
                panic!("handler must not run")
            })
            .unwrap();
        let err = service.call("guarded", json!({"b": 1})).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn reserved_and_empty_names_are_rejected() {
        let service = Service::new();
        let handler = |data: Value| async move { Ok(data) };
        assert!(matches!(
            service.on("$htMine", handler),
            Err(PeerError::InvalidMethod(_))
        ));
        assert!(matches!(service.on("", handler), Err(PeerError::InvalidMethod(_))));
    }

    #[tokio::test]
    async fn before_middleware_can_rewrite_or_abort() {
        let service = doubling_service();
        service.before(
            from_fn(|_, data| Ok(json!({"number": data}))),
            MiddlewareFilter::all().method("double"),
        );
        service.before(
            from_fn(|_, data| {
                if data["number"] == json!(13) {
                    return Err(RpcError::remote("unlucky"));
                }
                Ok(data)
            }),
            MiddlewareFilter::all(),
        );

        assert_eq!(service.call("double", json!(4)).await.unwrap(), json!(8));
        assert_eq!(
            service.call("double", json!(13)).await.unwrap_err(),
            RpcError::Remote(json!("unlucky"))
        );
    }

    #[tokio::test]
    async fn before_middleware_can_redirect_the_method() {
        let service = doubling_service();
        service
            .on("triple", |data: Value| async move {
                Ok(json!(data["number"].as_i64().unwrap_or_default() * 3))
            })
            .unwrap();
        service.before(
            from_async_fn(|mut context: CallContext, data: Value| async move {
                context.method = "triple".to_string();
                Ok((context, data))
            }),
            MiddlewareFilter::all().method("double"),
        );

        assert_eq!(
            service.call("double", json!({"number": 2})).await.unwrap(),
            json!(6)
        );
    }

    #[tokio::test]
    async fn after_middleware_sees_results_in_order() {
        let service = doubling_service();
        service.after(
            from_fn(|_, result| Ok(json!({"result": result}))),
            MiddlewareFilter::all(),
        );
        service.after(
            from_fn(|context, result| Ok(json!([context.method.clone(), result]))),
            MiddlewareFilter::all().method("double"),
        );
        service.after(
            from_fn(|_, _| Err(RpcError::remote("filtered out"))),
            MiddlewareFilter::all().method("other"),
        );

        assert_eq!(
            service.call("double", json!({"number": 1})).await.unwrap(),
            json!(["double", {"result": 2}])
        );
    }

    #[tokio::test]
    async fn service_middleware_sees_the_configured_name() {
        let service = Service::with_config(ServiceConfig::named("maths"));
        service
            .on("echo", |data: Value| async move { Ok(data) })
            .unwrap();
        service.before(
            from_fn(|_, _| Err(RpcError::remote("blocked"))),
            MiddlewareFilter::all().service("other"),
        );
        service.after(
            from_fn(|context, data| Ok(json!({"service": context.service.clone(), "data": data}))),
            MiddlewareFilter::all().service("maths"),
        );

        assert_eq!(service.name(), "maths");
        assert_eq!(
            service.call("echo", json!(1)).await.unwrap(),
            json!({"service": "maths", "data": 1})
        );
    }

    #[tokio::test]
    async fn callback_handlers_answer_once() {
        let service = Service::new();
        service
            .on_callback("reply", None, |data, responder| {
                responder.ok(json!({"echo": data}));
            })
            .unwrap();
        service
            .on_callback("silent", None, |_, responder| drop(responder))
            .unwrap();

        assert_eq!(
            service.call("reply", json!(1)).await.unwrap(),
            json!({"echo": 1})
        );
        assert!(service.call("silent", Value::Null).await.is_err());
    }

    fn arithmetic_service() -> Service {
        let service = Service::new();
        service
            .on("add_one", |data: Value| async move {
                Ok(json!(data.as_i64().unwrap_or_default() + 1))
            })
            .unwrap()
            .on("square", |data: Value| async move {
                let n = data.as_i64().unwrap_or_default();
                Ok(json!(n * n))
            })
            .unwrap();
        service
    }

    #[tokio::test]
    async fn multi_call_threads_results_when_data_is_omitted() {
        let service = arithmetic_service();
        let out = service
            .call(
                MULTI_CALL,
                json!([{"method": "add_one", "data": 2}, {"method": "square"}]),
            )
            .await
            .unwrap();
        assert_eq!(out, json!(9));
    }

    #[tokio::test]
    async fn multi_call_uses_explicit_data() {
        let service = arithmetic_service();
        let out = service
            .call(
                MULTI_CALL,
                json!([{"method": "add_one", "data": 2}, {"method": "square", "data": 5}]),
            )
            .await
            .unwrap();
        assert_eq!(out, json!(25));
    }

    #[tokio::test]
    async fn multi_call_stops_at_the_first_failure() {
        let service = arithmetic_service();
        let err = service
            .call(
                MULTI_CALL,
                json!([
                    {"method": "add_one", "data": 1},
                    {"method": "nope"},
                    {"method": "square"}
                ]),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RpcError::MultiCall {
                error: Box::new(RpcError::UnknownMethod("nope".into())),
                method: "nope".into(),
                service: None,
            }
        );
        assert_eq!(
            err.to_value(),
            json!({"error": {"error": "unknown-method", "method": "nope"}, "method": "nope"})
        );
    }

    #[tokio::test]
    async fn multi_call_validates_its_input() {
        let service = arithmetic_service();
        assert!(service
            .call(MULTI_CALL, json!({"method": "square"}))
            .await
            .unwrap_err()
            .is_validation());
        assert!(service
            .call(MULTI_CALL, json!([{"data": 1}]))
            .await
            .unwrap_err()
            .is_validation());
        assert_eq!(service.call(MULTI_CALL, json!([])).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn get_schema_documents_one_method() {
        let service = doubling_service();
        service
            .on("plain", |data: Value| async move { Ok(data) })
            .unwrap();

        let expected = object([("number", number())]).document().unwrap();
        assert_eq!(service.call(GET_SCHEMA, json!("double")).await.unwrap(), expected);
        assert_eq!(
            service
                .call(GET_SCHEMA, json!({"method": "double"}))
                .await
                .unwrap(),
            expected
        );
        assert_eq!(service.call(GET_SCHEMA, json!("plain")).await.unwrap(), Value::Null);
        assert_eq!(
            service.call(GET_SCHEMA, json!("missing")).await.unwrap_err(),
            RpcError::UnknownMethod("missing".into())
        );
    }

    fn opaque(_: &Args, data: &Value, _: &str) -> htrpc_schema::Result<Value> {
        Ok(data.clone())
    }

    fn opaque_validator() -> Validator {
        let mut registry = ValidatorRegistry::new();
        registry
            .register("opaque", opaque)
            .expect("opaque should register");
        registry
            .validator("opaque", Args::default())
            .expect("opaque should resolve")
    }

    #[tokio::test]
    async fn get_all_schemas_skips_undocumentable_methods() {
        let service = doubling_service();
        service
            .on("plain", |data: Value| async move { Ok(data) })
            .unwrap()
            .on_schema("secret", opaque_validator(), |data: Value| async move { Ok(data) })
            .unwrap();

        assert!(matches!(
            service.call(GET_SCHEMA, json!("secret")).await,
            Err(RpcError::Remote(_))
        ));

        let all = service.call(GET_ALL_SCHEMAS, Value::Null).await.unwrap();
        assert_eq!(
            all,
            json!({
                "double": object([("number", number())]).document().unwrap(),
                "plain": null,
            })
        );
    }

    #[tokio::test]
    async fn methods_lists_user_methods_sorted() {
        let service = arithmetic_service();
        assert_eq!(service.methods(), vec!["add_one".to_string(), "square".to_string()]);
    }

    #[tokio::test]
    async fn lifecycle_is_idempotent_and_late_transports_start() {
        let service = arithmetic_service();
        let first = LocalTransport::new();
        let second = LocalTransport::new();
        service.attach(Arc::new(first.clone()));

        service.stop().await.expect("stop before listen is a no-op");
        service.listen().await.expect("listen should succeed");
        service.listen().await.expect("second listen is a no-op");
        assert!(service.is_listening());

        service
            .add_transport(second.clone())
            .await
            .expect("late transport should start");
        assert_eq!(service.addresses().len(), 2);

        let client = second.client();
        assert_eq!(client.call("square", json!(3)).await.unwrap(), json!(9));

        service.stop().await.expect("stop should succeed");
        service.stop().await.expect("second stop is a no-op");
        assert!(!service.is_listening());
        assert!(service.addresses().is_empty());
    }

    #[tokio::test]
    async fn transports_given_at_construction_start_on_listen() {
        let transport = LocalTransport::new();
        let service = Service::with_transports(
            ServiceConfig::named("late"),
            [Arc::new(transport.clone()) as Arc<dyn Transport>],
        );
        assert!(transport.is_attached());
        assert!(service.addresses().is_empty());

        service.listen().await.unwrap();
        assert_eq!(
            service.addresses(),
            vec![("local".to_string(), "local".to_string())]
        );
    }

    #[tokio::test]
    async fn detached_servers_are_forgotten() {
        let service = arithmetic_service();
        let kept = service.attach(Arc::new(LocalTransport::new()));
        let dropped = service.attach(Arc::new(LocalTransport::new()));
        assert_eq!(service.attached(), 2);

        assert!(service.detach(&dropped));
        assert!(!service.detach(&dropped));
        assert_eq!(service.attached(), 1);

        service.listen().await.unwrap();
        assert!(kept.is_listening());
        assert!(!dropped.is_listening());
    }

    #[tokio::test]
    async fn dropped_services_fail_calls_from_transports() {
        let transport = LocalTransport::new();
        let client = transport.client();
        {
            let service = arithmetic_service();
            service.attach(Arc::new(transport.clone()));
            assert_eq!(client.call("add_one", json!(1)).await.unwrap(), json!(2));
        }
        assert!(client.call("add_one", json!(1)).await.is_err());
    }
}
