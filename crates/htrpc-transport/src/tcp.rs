//! Framed TCP transport.
//!
//! Requests and responses travel as [`htrpc_frame`] frames over one
//! persistent connection per client. Responses are matched to calls by id,
//! so any number of calls may be in flight at once and the server may answer
//! them in any order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use htrpc_frame::{
    Frame, FrameConfig, FrameError, FrameReader, FrameWriter, Message, WireRequest, WireResponse,
};
use serde_json::Value;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, RpcError, TransportError};
use crate::traits::{Dispatcher, Transport, TransportClient, TransportServer};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 7070;

/// Configuration shared by TCP servers and clients.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Host to bind (server) or connect to (client). Default: `127.0.0.1`.
    pub host: String,
    /// Port to bind or connect to. `0` binds an ephemeral port.
    pub port: u16,
    /// Frame limits for both directions.
    pub frame: FrameConfig,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            frame: FrameConfig::default(),
        }
    }
}

impl TcpConfig {
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
}

/// TCP transport factory.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }
}

impl Transport for TcpTransport {
    fn name(&self) -> &str {
        "tcp"
    }

    fn server(&self, dispatcher: Dispatcher) -> Arc<dyn TransportServer> {
        Arc::new(TcpServer::new(self.config.clone(), dispatcher))
    }

    fn client(&self) -> Arc<dyn TransportClient> {
        Arc::new(TcpClient::new(self.config.clone()))
    }
}

struct Running {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Accepts connections and dispatches each request frame on its own task.
pub struct TcpServer {
    config: TcpConfig,
    dispatcher: Dispatcher,
    running: tokio::sync::Mutex<Option<Running>>,
    addr: RwLock<Option<SocketAddr>>,
}

impl TcpServer {
    pub fn new(config: TcpConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            running: tokio::sync::Mutex::new(None),
            addr: RwLock::new(None),
        }
    }

    /// The bound socket address, once listening.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.addr.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TransportServer for TcpServer {
    async fn listen(&self) -> Result<()> {
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
        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.dispatcher),
            self.config.frame.clone(),
            cancel.clone(),
        ));

        info!(addr = %bound, "tcp server listening");
        *self.addr.write().unwrap_or_else(|e| e.into_inner()) = Some(bound);
        *running = Some(Running {
            addr: bound,
            cancel,
            task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };
        running.cancel.cancel();
        if let Err(err) = running.task.await {
            warn!(error = %err, "tcp accept loop ended abnormally");
        }
        *self.addr.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!(addr = %running.addr, "tcp server stopped");
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.bound_addr().is_some()
    }

    fn local_addr(&self) -> Option<String> {
        self.bound_addr().map(|addr| addr.to_string())
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    frame: FrameConfig,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted tcp connection");
                tokio::spawn(serve_connection(
                    stream,
                    Arc::clone(&dispatcher),
                    frame.clone(),
                    cancel.child_token(),
                ));
            }
            Err(err) => warn!(error = %TransportError::Accept(err), "tcp accept failed"),
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    dispatcher: Dispatcher,
    frame: FrameConfig,
    cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::with_config(read_half, frame.clone());
    let (responses, outgoing) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_responses(
        FrameWriter::with_config(write_half, frame.clone()),
        outgoing,
    ));

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = reader.read_message() => message,
        };
        match message {
            Ok(Message::Request(request)) => {
                let dispatcher = Arc::clone(&dispatcher);
                let responses = responses.clone();
                let frame = frame.clone();
                tokio::spawn(async move {
                    debug!(id = %request.id, method = %request.name, "tcp request");
                    let response = match dispatcher.dispatch(&request.name, request.data).await {
                        Ok(data) => WireResponse::ok(request.id, data),
                        Err(err) => WireResponse::err(request.id, err.to_value()),
                    };
                    let Some(response) = response_frame(response, &frame) else {
                        return;
                    };
                    if responses.send(response).is_err() {
                        debug!("connection closed before response was written");
                    }
                });
            }
            Ok(Message::Response(response)) => {
                warn!(id = %response.id, "ignoring response frame sent to server");
            }
            Err(FrameError::ConnectionClosed) => {
                debug!("tcp connection closed by peer");
                break;
            }
            Err(err) => {
                warn!(error = %err, "closing tcp connection after protocol error");
                break;
            }
        }
    }

    drop(responses);
    if cancel.is_cancelled() {
        writer.abort();
    }
}

/// Frame a response for the wire. A response over the payload limit is
/// replaced by a transport error for the same id, so only that call fails.
fn response_frame(response: WireResponse, config: &FrameConfig) -> Option<Frame> {
    let id = response.id.clone();
    let err = match checked_frame(Message::Response(response), config) {
        Ok(frame) => return Some(frame),
        Err(err) => err,
    };
    warn!(%id, error = %err, "tcp response cannot be framed");

    let fallback = WireResponse::err(id.as_str(), RpcError::transport(&err).to_value());
    match checked_frame(Message::Response(fallback), config) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(%id, error = %err, "dropping tcp response");
            None
        }
    }
}

fn checked_frame(message: Message, config: &FrameConfig) -> std::result::Result<Frame, FrameError> {
    let frame = message.to_frame()?;
    config.check(&frame)?;
    Ok(frame)
}

async fn write_responses(
    mut writer: FrameWriter<OwnedWriteHalf>,
    mut outgoing: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(response) = outgoing.recv().await {
        if let Err(err) = writer.write_frame(response).await {
            warn!(error = %err, "failed to write tcp response");
            return;
        }
    }
}

type Reply = oneshot::Sender<std::result::Result<Value, RpcError>>;

#[derive(Default)]
struct Pending {
    calls: HashMap<String, Reply>,
    closed: bool,
}

impl Pending {
    /// Resolve every outstanding call with `Disconnected` and refuse new ones.
    fn close(&mut self) {
        self.closed = true;
        for (_, reply) in self.calls.drain() {
            let _ = reply.send(Err(RpcError::Disconnected));
        }
    }
}

type PendingMap = Arc<Mutex<Pending>>;

#[derive(Clone)]
struct Link {
    requests: mpsc::UnboundedSender<Frame>,
    pending: PendingMap,
    cancel: CancellationToken,
}

/// One persistent connection; responses are correlated by request id.
pub struct TcpClient {
    config: TcpConfig,
    next_id: AtomicU64,
    link: Arc<RwLock<Option<Link>>>,
    connecting: tokio::sync::Mutex<()>,
}

impl TcpClient {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            link: Arc::new(RwLock::new(None)),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    fn current_link(&self) -> Option<Link> {
        self.link.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn mint_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

#[async_trait]
impl TransportClient for TcpClient {
    async fn connect(&self) -> Result<()> {
        let _guard = self.connecting.lock().await;
        if self.current_link().is_some() {
            return Ok(());
        }

        let addr = self.config.addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (requests, outgoing) = mpsc::unbounded_channel();
        let link = Link {
            requests,
            pending: PendingMap::default(),
            cancel: CancellationToken::new(),
        };

        tokio::spawn(write_requests(
            FrameWriter::with_config(write_half, self.config.frame.clone()),
            outgoing,
            link.cancel.clone(),
        ));
        tokio::spawn(read_responses(
            FrameReader::with_config(read_half, self.config.frame.clone()),
            link.clone(),
            Arc::clone(&self.link),
        ));

        *self.link.write().unwrap_or_else(|e| e.into_inner()) = Some(link);
        info!(%addr, "tcp client connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let _guard = self.connecting.lock().await;
        let link = self.link.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(link) = link {
            link.cancel.cancel();
            link.pending.lock().unwrap_or_else(|e| e.into_inner()).close();
            info!(addr = %self.config.addr(), "tcp client disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.current_link().is_some()
    }

    async fn call(&self, method: &str, data: Value) -> std::result::Result<Value, RpcError> {
        let Some(link) = self.current_link() else {
            return Err(RpcError::Disconnected);
        };

        let id = self.mint_id();
        let request = WireRequest {
            id: id.clone(),
            name: method.to_string(),
            data,
        };
        let request = checked_frame(Message::Request(request), &self.config.frame).map_err(|err| {
            debug!(%id, method, error = %err, "tcp request cannot be framed");
            RpcError::transport(&err)
        })?;

        let (reply, response) = oneshot::channel();
        {
            let mut pending = link.pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.closed {
                return Err(RpcError::Disconnected);
            }
            pending.calls.insert(id.clone(), reply);
        }

        if link.requests.send(request).is_err() {
            link.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .calls
                .remove(&id);
            return Err(RpcError::Disconnected);
        }

        response.await.unwrap_or(Err(RpcError::Disconnected))
    }
}

async fn write_requests(
    mut writer: FrameWriter<OwnedWriteHalf>,
    mut outgoing: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            request = outgoing.recv() => request,
        };
        let Some(request) = request else { break };
        if let Err(err) = writer.write_frame(request).await {
            warn!(error = %err, "failed to write tcp request");
            cancel.cancel();
            break;
        }
    }
    let _ = writer.close().await;
}

async fn read_responses(
    mut reader: FrameReader<OwnedReadHalf>,
    link: Link,
    slot: Arc<RwLock<Option<Link>>>,
) {
    loop {
        let message = tokio::select! {
            _ = link.cancel.cancelled() => break,
            message = reader.read_message() => message,
        };
        match message {
            Ok(Message::Response(response)) => {
                let reply = link
                    .pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .calls
                    .remove(&response.id);
                match reply {
                    Some(reply) => {
                        let result = response.into_result().map_err(RpcError::from_value);
                        let _ = reply.send(result);
                    }
                    None => debug!(id = %response.id, "dropping response with unknown id"),
                }
            }
            Ok(Message::Request(request)) => {
                warn!(id = %request.id, "ignoring request frame sent to client");
            }
            Err(FrameError::ConnectionClosed) => {
                debug!("tcp connection closed by server");
                break;
            }
            Err(err) => {
                warn!(error = %err, "closing tcp connection after protocol error");
                break;
            }
        }
    }

    link.cancel.cancel();
    link.pending.lock().unwrap_or_else(|e| e.into_inner()).close();

    let mut current = slot.write().unwrap_or_else(|e| e.into_inner());
    if current
        .as_ref()
        .is_some_and(|active| Arc::ptr_eq(&active.pending, &link.pending))
    {
        *current = None;
    }
}
