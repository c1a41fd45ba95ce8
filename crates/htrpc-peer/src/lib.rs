//! Services and clients on top of htrpc transports.
//!
//! A [`Service`] registers methods (optionally guarded by a schema) and
//! serves them through any number of transports. A [`Client`] binds names
//! to transports or in-process services and calls them, with before/after
//! middleware on both sides, response schemas, prepared calls and call
//! chains.
//!
//! ```no_run
//! use htrpc_peer::{Client, Service};
//! use htrpc_schema::{number, object};
//! use serde_json::{json, Value};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Service::new();
//! service.on_schema("double", object([("number", number())]), |data: Value| async move {
//!     Ok(json!(data["number"].as_i64().unwrap_or_default() * 2))
//! })?;
//!
//! let client = Client::new();
//! client.add("maths", service)?;
//! client.connect().await?;
//! assert_eq!(client.call("maths", "double", json!({"number": "5"})).await?, json!(10));
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod client;
pub mod context;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod service;

pub use chain::{Chain, ChainLink};
pub use client::{Client, ClientEvent, Endpoint, Prepared, ServiceProxy};
pub use context::{CallContext, MiddlewareFilter};
pub use error::{PeerError, Result};
pub use handler::{Handler, Responder};
pub use middleware::{from_async_fn, from_fn, Middleware};
pub use service::{
    Service, ServiceConfig, GET_ALL_SCHEMAS, GET_SCHEMA, MULTI_CALL, RESERVED_PREFIX,
};
