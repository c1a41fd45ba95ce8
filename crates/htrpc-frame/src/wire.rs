//! JSON envelopes carried inside frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::kind::{REQUEST, RESPONSE};

/// `{"id", "name", "data"}`, client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

/// `{"id", "data", "error"}`, server to client. Exactly one of `data` and
/// `error` is meaningful; the other is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Value,
}

impl WireResponse {
    pub fn ok(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
            error: Value::Null,
        }
    }

    pub fn err(id: impl Into<String>, error: Value) -> Self {
        Self {
            id: id.into(),
            data: Value::Null,
            error,
        }
    }

    /// `Err(error)` when the error slot is set, otherwise `Ok(data)`.
    pub fn into_result(self) -> std::result::Result<Value, Value> {
        if self.error.is_null() {
            Ok(self.data)
        } else {
            Err(self.error)
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(WireRequest),
    Response(WireResponse),
}

impl Message {
    /// Serialize the envelope into a frame of the matching kind.
    pub fn to_frame(&self) -> Result<Frame> {
        let (kind, payload) = match self {
            Self::Request(request) => (REQUEST, serde_json::to_vec(request)?),
            Self::Response(response) => (RESPONSE, serde_json::to_vec(response)?),
        };
        Ok(Frame::new(kind, payload))
    }

    /// Parse a frame's payload according to its kind.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        match frame.kind {
            REQUEST => Ok(Self::Request(serde_json::from_slice(&frame.payload)?)),
            RESPONSE => Ok(Self::Response(serde_json::from_slice(&frame.payload)?)),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

impl From<WireRequest> for Message {
    fn from(request: WireRequest) -> Self {
        Self::Request(request)
    }
}

impl From<WireResponse> for Message {
    fn from(response: WireResponse) -> Self {
        Self::Response(response)
    }
}
