//! HTTP transport.
//!
//! Requests are `POST <path>` with a `{"method", "args"}` body. A success is
//! answered with the raw result JSON; a failure with status 500 and
//! `{"$htTransportError": <error>}`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, RpcError, TransportError, TRANSPORT_MARKER};
use crate::traits::{Dispatcher, Transport, TransportClient, TransportServer};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 7080;

/// Default route path.
pub const DEFAULT_PATH: &str = "/ht";

/// Client-side TLS options. The server never terminates TLS; put it behind a
/// proxy that does.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Extra PEM root certificate to trust.
    pub ca_file: Option<PathBuf>,
    /// Skip certificate verification (testing only).
    pub accept_invalid_certs: bool,
}

/// Configuration shared by HTTP servers and clients.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Route path. Default: `/ht`.
    pub path: String,
    /// Use `https` on the client side.
    pub ssl: Option<TlsOptions>,
    /// Mount on an externally served app instead of binding a listener.
    pub app: Option<HttpApp>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            ssl: None,
            app: None,
        }
    }
}

impl HttpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The URL clients post to.
    pub fn url(&self) -> String {
        let scheme = if self.ssl.is_some() { "https" } else { "http" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Request body posted by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestBody {
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

/// A route table several services can mount on, served by its owner.
#[derive(Clone, Default)]
pub struct HttpApp {
    routes: Arc<RwLock<HashMap<String, Dispatcher>>>,
}

impl HttpApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `POST path` to `dispatcher`, replacing any earlier mount.
    pub fn mount(&self, path: impl Into<String>, dispatcher: Dispatcher) {
        let path = path.into();
        debug!(%path, "mounted http route");
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, dispatcher);
    }

    /// Remove a route. Returns whether it was mounted.
    pub fn unmount(&self, path: &str) -> bool {
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
            .is_some()
    }

    /// Mounted paths, sorted.
    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self
            .routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        routes.sort_unstable();
        routes
    }

    fn route(&self, path: &str) -> Option<Dispatcher> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    /// Serve connections from `listener` until `shutdown` fires.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted.map_err(TransportError::Accept)?,
            };
            debug!(%peer, "accepted http connection");

            let io = TokioIo::new(stream);
            let app = self.clone();
            let shutdown = shutdown.child_token();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let app = app.clone();
                    async move { Ok::<_, Infallible>(app.handle(req).await) }
                });
                let connection = http1::Builder::new().serve_connection(io, service);
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    served = connection => {
                        if let Err(err) = served {
                            debug!(error = %err, "http connection ended with error");
                        }
                    }
                }
            });
        }
    }

    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        let Some(dispatcher) = self.route(&path) else {
            return failure(StatusCode::NOT_FOUND, json!(format!("no route for {path}")));
        };
        if req.method() != Method::POST {
            return failure(
                StatusCode::METHOD_NOT_ALLOWED,
                json!("only POST requests are supported"),
            );
        }

        let body = match req.into_body().collect().await {
            Ok(body) => body.to_bytes(),
            Err(err) => {
                return failure(
                    StatusCode::BAD_REQUEST,
                    json!(format!("failed to read request body: {err}")),
                )
            }
        };
        let request: HttpRequestBody = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(err) => {
                return failure(
                    StatusCode::BAD_REQUEST,
                    json!(format!("invalid request body: {err}")),
                )
            }
        };

        debug!(%path, method = %request.method, "http request");
        match dispatcher.dispatch(&request.method, request.args).await {
            Ok(result) => json_response(StatusCode::OK, &result),
            Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_value()),
        }
    }
}

impl std::fmt::Debug for HttpApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApp")
            .field("routes", &self.routes())
            .finish()
    }
}

fn failure(status: StatusCode, error: Value) -> Response<Full<Bytes>> {
    json_response(status, &json!({ TRANSPORT_MARKER: error }))
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

/// HTTP transport factory.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn server(&self, dispatcher: Dispatcher) -> Arc<dyn TransportServer> {
        Arc::new(HttpServer::new(self.config.clone(), dispatcher))
    }

    fn client(&self) -> Arc<dyn TransportClient> {
        Arc::new(HttpClient::new(self.config.clone()))
    }
}

struct Running {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Serves one route, either on its own listener or mounted on an [`HttpApp`].
pub struct HttpServer {
    config: HttpConfig,
    dispatcher: Dispatcher,
    running: tokio::sync::Mutex<Option<Running>>,
    addr: RwLock<Option<SocketAddr>>,
    mounted: AtomicBool,
}

impl HttpServer {
    pub fn new(config: HttpConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            running: tokio::sync::Mutex::new(None),
            addr: RwLock::new(None),
            mounted: AtomicBool::new(false),
        }
    }

    /// The bound socket address, when serving on an own listener.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.addr.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TransportServer for HttpServer {
    async fn listen(&self) -> Result<()> {
        if let Some(app) = &self.config.app {
            if !self.mounted.swap(true, Ordering::SeqCst) {
                app.mount(self.config.path.clone(), Arc::clone(&self.dispatcher));
            }
            return Ok(());
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let bound = listener.local_addr()?;

        let app = HttpApp::new();
        app.mount(self.config.path.clone(), Arc::clone(&self.dispatcher));
        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let task = tokio::spawn(async move {
            if let Err(err) = app.serve(listener, shutdown).await {
                warn!(error = %err, "http server stopped accepting");
            }
        });

        info!(addr = %bound, path = %self.config.path, "http server listening");
        *self.addr.write().unwrap_or_else(|e| e.into_inner()) = Some(bound);
        *running = Some(Running {
            addr: bound,
            cancel,
            task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(app) = &self.config.app {
            if self.mounted.swap(false, Ordering::SeqCst) {
                app.unmount(&self.config.path);
            }
            return Ok(());
        }

        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };
        running.cancel.cancel();
        if let Err(err) = running.task.await {
            warn!(error = %err, "http server task ended abnormally");
        }
        *self.addr.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!(addr = %running.addr, "http server stopped");
        Ok(())
    }

    fn is_listening(&self) -> bool {
        match &self.config.app {
            Some(_) => self.mounted.load(Ordering::SeqCst),
            None => self.bound_addr().is_some(),
        }
    }

    fn local_addr(&self) -> Option<String> {
        self.bound_addr().map(|addr| addr.to_string())
    }
}

/// Posts each call as its own request; connect and disconnect only toggle state.
pub struct HttpClient {
    url: String,
    ssl: Option<TlsOptions>,
    http: RwLock<Option<reqwest::Client>>,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            url: config.url(),
            ssl: config.ssl,
            http: RwLock::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(tls) = &self.ssl {
            if let Some(path) = &tls.ca_file {
                let pem = std::fs::read(path)?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|err| TransportError::Http(err.to_string()))?;
                builder = builder.add_root_certificate(cert);
            }
            builder = builder.danger_accept_invalid_certs(tls.accept_invalid_certs);
        }
        builder
            .build()
            .map_err(|err| TransportError::Http(err.to_string()))
    }

    fn current(&self) -> Option<reqwest::Client> {
        self.http.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TransportClient for HttpClient {
    async fn connect(&self) -> Result<()> {
        if self.current().is_some() {
            return Ok(());
        }
        let client = self.build()?;
        *self.http.write().unwrap_or_else(|e| e.into_inner()) = Some(client);
        debug!(url = %self.url, "http client ready");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.http.write().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    async fn call(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError> {
        let http = match self.current() {
            Some(http) => http,
            None => self.build().map_err(RpcError::transport)?,
        };
        let body = HttpRequestBody {
            method: method.to_string(),
            args: data,
        };

        let response = http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(RpcError::transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(RpcError::transport)?;
        let payload: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(RpcError::transport)?
        };

        if status.is_success() {
            return Ok(payload);
        }
        match payload {
            Value::Object(mut map) if map.contains_key(TRANSPORT_MARKER) => {
                let error = map.remove(TRANSPORT_MARKER).unwrap_or(Value::Null);
                if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
                    Err(RpcError::from_value(error))
                } else {
                    Err(RpcError::Transport(match error {
                        Value::String(text) => text,
                        other => other.to_string(),
                    }))
                }
            }
            other => Err(RpcError::Transport(format!("http {status}: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_follows_scheme_and_path() {
        let mut config = HttpConfig::new("example.org", 8443);
        assert_eq!(config.url(), "http://example.org:8443/ht");
        config.ssl = Some(TlsOptions::default());
        config.path = "/rpc".to_string();
        assert_eq!(config.url(), "https://example.org:8443/rpc");
    }

    #[test]
    fn request_body_defaults_args_to_null() {
        let body: HttpRequestBody = serde_json::from_str(r#"{"method":"ping"}"#).unwrap();
        assert_eq!(body.args, Value::Null);
    }

    #[test]
    fn app_routes_are_sorted_and_removable() {
        let app = HttpApp::new();
        let dispatcher = crate::traits::dispatch_fn(|_, data| async move { Ok(data) });
        app.mount("/b", Arc::clone(&dispatcher));
        app.mount("/a", dispatcher);
        assert_eq!(app.routes(), vec!["/a".to_string(), "/b".to_string()]);
        assert!(app.unmount("/a"));
        assert!(!app.unmount("/a"));
    }
}
