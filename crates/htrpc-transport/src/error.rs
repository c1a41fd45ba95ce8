use serde_json::{json, Map, Value};

/// Marker key of validation failures.
pub const VALIDATION_MARKER: &str = "$htValidationError";

/// Key wrapping transport-level failures.
pub const TRANSPORT_MARKER: &str = "$htTransportError";

/// Errors that can occur in transport lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be read or written.
    #[error(transparent)]
    Frame(#[from] htrpc_frame::FrameError),

    /// The HTTP client or server failed.
    #[error("http error: {0}")]
    Http(String),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A failed call, carried as data across every transport.
///
/// Each variant has a fixed JSON shape (see [`RpcError::to_value`]); anything
/// a handler or middleware fails with that is not one of these shapes is
/// passed through untouched as [`RpcError::Remote`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// `{"error": "unknown-service", "service": S}`
    #[error("unknown service '{0}'")]
    UnknownService(String),

    /// `{"error": "unknown-method", "method": M}`
    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    /// `{"$htValidationError": true, "error": MSG}`
    #[error("validation failed: {0}")]
    Validation(String),

    /// `{"error": <inner>, "method": M[, "service": S]}`
    #[error("call to '{method}' failed: {error}")]
    MultiCall {
        error: Box<RpcError>,
        method: String,
        service: Option<String>,
    },

    /// `{"error": "disconnected"}`
    #[error("disconnected")]
    Disconnected,

    /// `{"$htTransportError": MSG}`
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other error value.
    #[error("remote error: {0}")]
    Remote(Value),
}

impl RpcError {
    pub fn remote(value: impl Into<Value>) -> Self {
        Self::Remote(value.into())
    }

    pub fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Encode as the JSON error value that crosses the wire.
    pub fn to_value(&self) -> Value {
        match self {
            Self::UnknownService(service) => json!({"error": "unknown-service", "service": service}),
            Self::UnknownMethod(method) => json!({"error": "unknown-method", "method": method}),
            Self::Validation(message) => json!({VALIDATION_MARKER: true, "error": message}),
            Self::MultiCall {
                error,
                method,
                service,
            } => {
                let mut out = Map::new();
                out.insert("error".to_string(), error.to_value());
                out.insert("method".to_string(), Value::String(method.clone()));
                if let Some(service) = service {
                    out.insert("service".to_string(), Value::String(service.clone()));
                }
                Value::Object(out)
            }
            Self::Disconnected => json!({"error": "disconnected"}),
            Self::Transport(message) => json!({TRANSPORT_MARKER: message}),
            Self::Remote(value) => value.clone(),
        }
    }

    /// Decode a JSON error value received from the wire.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = &value else {
            return Self::Remote(value);
        };

        if map.get(VALIDATION_MARKER) == Some(&Value::Bool(true)) {
            return Self::Validation(text(map.get("error")));
        }
        if map.len() == 1 {
            if let Some(inner) = map.get(TRANSPORT_MARKER) {
                return Self::Transport(text(Some(inner)));
            }
        }

        let error = map.get("error");
        let only_routing_keys = map
            .keys()
            .all(|key| matches!(key.as_str(), "error" | "method" | "service"));

        match (error.and_then(Value::as_str), map.get("service"), map.get("method")) {
            (Some("unknown-service"), Some(Value::String(service)), _) => {
                return Self::UnknownService(service.clone());
            }
            (Some("unknown-method"), _, Some(Value::String(method))) => {
                return Self::UnknownMethod(method.clone());
            }
            (Some("disconnected"), None, None) if map.len() == 1 => return Self::Disconnected,
            _ => {}
        }

        if let (Some(error), Some(Value::String(method)), true) =
            (error, map.get("method"), only_routing_keys)
        {
            let service = map
                .get("service")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Self::MultiCall {
                error: Box::new(Self::from_value(error.clone())),
                method: method.clone(),
                service,
            };
        }

        Self::Remote(value)
    }
}

impl From<RpcError> for Value {
    fn from(err: RpcError) -> Self {
        err.to_value()
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
