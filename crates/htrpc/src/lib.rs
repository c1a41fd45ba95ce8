//! Transport-agnostic RPC.
//!
//! Services register named methods, optionally guarded by a schema, and
//! serve them over TCP, HTTP or in process. Clients call them by service
//! and method name, with middleware on both sides.
//!
//! # Crate Structure
//!
//! - [`schema`]: validator combinators for payloads
//! - [`frame`]: length-prefixed JSON framing used by the TCP transport
//! - [`transport`]: the transport contract and the local, TCP and HTTP transports
//! - [`peer`]: services, clients, middleware and call chains (behind `peer` feature)

/// Re-export schema types.
pub mod schema {
    pub use htrpc_schema::*;
}

/// Re-export frame types.
pub mod frame {
    pub use htrpc_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use htrpc_transport::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use htrpc_peer::*;
}
