//! Transport contract and the bundled transports.
//!
//! A [`Transport`] is a factory for two halves:
//! - a [`TransportServer`] that feeds incoming requests to a [`Dispatcher`]
//! - a [`TransportClient`] that sends calls and resolves each exactly once
//!
//! Three transports ship with the crate:
//! - [`LocalTransport`]: in-process, with JSON round-trip isolation
//! - [`TcpTransport`]: framed requests over a persistent connection
//! - [`HttpTransport`]: one `POST` per call
//!
//! Call failures travel as [`RpcError`] values; lifecycle failures (bind,
//! connect) as [`TransportError`].

pub mod error;
pub mod http;
pub mod local;
pub mod tcp;
pub mod traits;

pub use error::{Result, RpcError, TransportError, TRANSPORT_MARKER, VALIDATION_MARKER};
pub use http::{HttpApp, HttpConfig, HttpTransport, TlsOptions};
pub use local::LocalTransport;
pub use tcp::{TcpConfig, TcpTransport};
pub use traits::{dispatch_fn, Dispatch, Dispatcher, Transport, TransportClient, TransportServer};
