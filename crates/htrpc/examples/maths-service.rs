//! A schema-guarded service served over TCP and called through a client.
//!
//! Run with:
//!   cargo run --example maths-service
//!
//! Or serve with the CLI and call it from another terminal:
//!   cargo run --features cli -- serve --tcp 127.0.0.1:7070
//!   cargo run --features cli -- call tcp://127.0.0.1:7070 double --json '{"number":"5"}'

use std::sync::Arc;

use htrpc::peer::{Client, Service};
use htrpc::schema::{number, object};
use htrpc::transport::{TcpConfig, TcpTransport};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let service = Service::new();
    service.on_schema("double", object([("number", number())]), |data: Value| async move {
        Ok(json!(data["number"].as_i64().unwrap_or_default() * 2))
    })?;

    let server = service.attach(Arc::new(TcpTransport::new(TcpConfig::new("127.0.0.1", 0))));
    service.listen().await?;
    let addr: std::net::SocketAddr = server
        .local_addr()
        .ok_or("server did not report an address")?
        .parse()?;
    eprintln!("Listening on {addr}");

    let client = Client::new();
    client.add("maths", TcpTransport::new(TcpConfig::new("127.0.0.1", addr.port())))?;
    client.connect().await?;

    let doubled = client.call("maths", "double", json!({"number": "21"})).await?;
    eprintln!("double(\"21\") = {doubled}");

    match client.call("maths", "double", json!({"number": "many"})).await {
        Ok(value) => eprintln!("unexpected success: {value}"),
        Err(err) => eprintln!("rejected: {}", err.to_value()),
    }

    client.disconnect().await?;
    service.stop().await?;
    Ok(())
}
