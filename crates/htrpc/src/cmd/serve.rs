use std::sync::Arc;

use htrpc_peer::{Service, ServiceConfig};
use htrpc_schema::{number, object};
use htrpc_transport::{HttpConfig, HttpTransport, RpcError, TcpConfig, TcpTransport};
use serde_json::{json, Value};

use crate::cmd::{parse_host_port, ServeArgs};
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, OutputFormat};

const DEFAULT_TCP: &str = "127.0.0.1:7070";

pub async fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let service = demo_service(&args.name)?;

    let tcp = match (&args.tcp, &args.http) {
        (None, None) => Some(DEFAULT_TCP.to_string()),
        (tcp, _) => tcp.clone(),
    };
    if let Some(addr) = &tcp {
        let (host, port) = parse_host_port(addr)?;
        service.attach(Arc::new(TcpTransport::new(TcpConfig::new(host, port))));
    }
    if let Some(addr) = &args.http {
        let (host, port) = parse_host_port(addr)?;
        service.attach(Arc::new(HttpTransport::new(HttpConfig {
            path: args.path.clone(),
            ..HttpConfig::new(host, port)
        })));
    }

    service
        .listen()
        .await
        .map_err(|err| peer_error("listen failed", err))?;
    print_listening(&args.name, &service.addresses(), format);

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| CliError::new(INTERNAL, format!("failed waiting for Ctrl-C: {err}")))?;
    tracing::info!(service = %args.name, "shutting down");

    service
        .stop()
        .await
        .map_err(|err| peer_error("stop failed", err))?;
    Ok(SUCCESS)
}

/// `echo`, `double` and `ping`.
pub fn demo_service(name: &str) -> CliResult<Service> {
    let service = Service::with_config(ServiceConfig::named(name));
    service
        .on("echo", |data: Value| async move { Ok(data) })
        .and_then(|service| {
            service.on_schema(
                "double",
                object([("number", number())]),
                |data: Value| async move {
                    let doubled = data["number"]
                        .as_f64()
                        .map(|n| n * 2.0)
                        .ok_or_else(|| RpcError::remote("number is missing"))?;
                    Ok(number_value(doubled))
                },
            )
        })
        .and_then(|service| service.on("ping", |_: Value| async move { Ok(json!("pong")) }))
        .map_err(|err| peer_error("method registration failed", err))?;
    Ok(service)
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}
