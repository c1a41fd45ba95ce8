use std::sync::Arc;

use clap::{Args, Subcommand};
use htrpc_peer::Client;
use htrpc_transport::{HttpConfig, HttpTransport, TcpConfig, TcpTransport, TlsOptions, Transport};

use crate::exit::{peer_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod call;
pub mod schemas;
pub mod serve;
pub mod version;

/// Name the CLI registers remote endpoints under.
const REMOTE: &str = "remote";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the demo service until interrupted.
    Serve(ServeArgs),
    /// Call a method on a remote service.
    Call(CallArgs),
    /// List the methods and schemas of a remote service.
    Schemas(SchemasArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format).await,
        Command::Call(args) => call::run(args, format).await,
        Command::Schemas(args) => schemas::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Serve over TCP on HOST:PORT.
    #[arg(long, value_name = "ADDR")]
    pub tcp: Option<String>,
    /// Serve over HTTP on HOST:PORT.
    #[arg(long, value_name = "ADDR")]
    pub http: Option<String>,
    /// HTTP route path.
    #[arg(long, default_value = "/ht")]
    pub path: String,
    /// Service name reported to middleware and in output.
    #[arg(long, default_value = "demo")]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Endpoint: tcp://HOST:PORT or http(s)://HOST:PORT/PATH.
    pub endpoint: String,
    /// Method to call.
    pub method: String,
    /// JSON payload. Default: null.
    #[arg(long)]
    pub json: Option<String>,
}

#[derive(Args, Debug)]
pub struct SchemasArgs {
    /// Endpoint: tcp://HOST:PORT or http(s)://HOST:PORT/PATH.
    pub endpoint: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build target and enabled features.
    #[arg(long)]
    pub extended: bool,
}

/// Split `HOST:PORT`.
pub fn parse_host_port(input: &str) -> CliResult<(String, u16)> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| CliError::usage(format!("expected HOST:PORT, got '{input}'")))?;
    if host.is_empty() {
        return Err(CliError::usage(format!("missing host in '{input}'")));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| CliError::usage(format!("invalid port in '{input}'")))?;
    Ok((host.to_string(), port))
}

/// Build a transport for an endpoint URL.
pub fn parse_endpoint(endpoint: &str) -> CliResult<Arc<dyn Transport>> {
    if let Some(rest) = endpoint.strip_prefix("tcp://") {
        let (host, port) = parse_host_port(rest)?;
        return Ok(Arc::new(TcpTransport::new(TcpConfig::new(host, port))));
    }

    let (rest, ssl) = if let Some(rest) = endpoint.strip_prefix("http://") {
        (rest, None)
    } else if let Some(rest) = endpoint.strip_prefix("https://") {
        (rest, Some(TlsOptions::default()))
    } else {
        return Err(CliError::usage(format!(
            "unsupported endpoint '{endpoint}': expected tcp://, http:// or https://"
        )));
    };

    let (authority, path) = match rest.find('/') {
        Some(index) => (&rest[..index], &rest[index..]),
        None => (rest, "/ht"),
    };
    let (host, port) = parse_host_port(authority)?;
    Ok(Arc::new(HttpTransport::new(HttpConfig {
        path: path.to_string(),
        ssl,
        ..HttpConfig::new(host, port)
    })))
}

/// A connected client with the endpoint registered as [`REMOTE`].
pub async fn connect(endpoint: &str) -> CliResult<Client> {
    let client = Client::new();
    client
        .add(REMOTE, parse_endpoint(endpoint)?)
        .map_err(|err| peer_error("register failed", err))?;
    client
        .connect()
        .await
        .map_err(|err| peer_error("connect failed", err))?;
    Ok(client)
}
