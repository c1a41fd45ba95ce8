/// Errors raised while setting up services and clients.
///
/// Failures of individual calls are reported as
/// [`RpcError`](htrpc_transport::RpcError) values instead.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// A client already has a connection registered under this name.
    #[error("service '{0}' is already registered")]
    DuplicateService(String),

    /// The method name is empty or uses the reserved `$ht` prefix.
    #[error("invalid method name '{0}'")]
    InvalidMethod(String),

    /// Transport-level error while starting or stopping a server or client.
    #[error("transport error: {0}")]
    Transport(#[from] htrpc_transport::TransportError),

    /// Schema construction error.
    #[error("schema error: {0}")]
    Schema(#[from] htrpc_schema::SchemaError),
}

pub type Result<T> = std::result::Result<T, PeerError>;
