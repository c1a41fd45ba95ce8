use std::fmt;

use htrpc_frame::FrameError;
use htrpc_peer::PeerError;
use htrpc_transport::{RpcError, TransportError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Frame(err) => frame_error(context, err),
        TransportError::Shutdown => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::PayloadTooLarge { .. } | FrameError::Envelope(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Schema(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PeerError::DuplicateService(_) | PeerError::InvalidMethod(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
    }
}

/// Map a failed call. The message carries the error in its wire shape.
pub fn rpc_error(context: &str, err: RpcError) -> CliError {
    let code = match &err {
        RpcError::Validation(_) => DATA_INVALID,
        RpcError::Disconnected | RpcError::Transport(_) => TRANSPORT_ERROR,
        RpcError::UnknownService(_) | RpcError::UnknownMethod(_) => USAGE,
        RpcError::MultiCall { .. } | RpcError::Remote(_) => FAILURE,
    };
    CliError::new(code, format!("{context}: {}", err.to_value()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_failures_map_to_exit_codes() {
        assert_eq!(rpc_error("call", RpcError::Validation("x".into())).code, DATA_INVALID);
        assert_eq!(rpc_error("call", RpcError::Disconnected).code, TRANSPORT_ERROR);
        assert_eq!(rpc_error("call", RpcError::UnknownMethod("m".into())).code, USAGE);
        assert_eq!(rpc_error("call", RpcError::remote("boom")).code, FAILURE);
    }

    #[test]
    fn call_failure_message_carries_the_wire_shape() {
        let err = rpc_error("call failed", RpcError::UnknownMethod("nope".into()));
        assert_eq!(
            err.message,
            r#"call failed: {"error":"unknown-method","method":"nope"}"#
        );
    }

    #[test]
    fn frame_errors_inside_transport_errors_are_unwrapped() {
        let err = transport_error(
            "send",
            TransportError::Frame(FrameError::PayloadTooLarge { size: 10, max: 1 }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }
}
