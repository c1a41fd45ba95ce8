//! Length-prefixed framing for stream transports.
//!
//! Every message is framed with:
//! - A 2-byte magic number ("HT") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian frame kind (request or response)
//!
//! The payload is a JSON envelope ([`WireRequest`] / [`WireResponse`]).
//! Message boundaries never depend on how the stream chunks its reads.

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod wire;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameCodec, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
    MAGIC,
};
pub use error::{FrameError, Result};
pub use kind::{REQUEST, RESPONSE};
pub use reader::FrameReader;
pub use wire::{Message, WireRequest, WireResponse};
pub use writer::FrameWriter;
