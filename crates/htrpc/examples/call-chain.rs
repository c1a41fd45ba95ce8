//! Chaining calls across two in-process services.
//!
//! Run with:
//!   cargo run --example call-chain

use htrpc::peer::{Client, Service};
use serde_json::{json, Value};

fn text_service() -> Result<Service, htrpc::peer::PeerError> {
    let service = Service::new();
    service
        .on("upper", |data: Value| async move {
            Ok(json!(data.as_str().unwrap_or_default().to_uppercase()))
        })?
        .on("exclaim", |data: Value| async move {
            Ok(json!(format!("{}!", data.as_str().unwrap_or_default())))
        })?;
    Ok(service)
}

fn reverse_service() -> Result<Service, htrpc::peer::PeerError> {
    let service = Service::new();
    service.on("reverse", |data: Value| async move {
        Ok(json!(data.as_str().unwrap_or_default().chars().rev().collect::<String>()))
    })?;
    Ok(service)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    client
        .add("text", text_service()?)?
        .add("reverse", reverse_service()?)?;
    client.connect().await?;

    // One $htMultiCall to "text", then a direct call to "reverse".
    let out = client
        .chain("text", "upper", json!("hello world"))
        .chain("text", "exclaim", Value::Null)
        .chain("reverse", "reverse", Value::Null)
        .end()
        .await?;
    eprintln!("{out}");

    client.disconnect().await?;
    Ok(())
}
