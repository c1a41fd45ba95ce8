use htrpc_transport::http::{HttpClient, HttpServer};
use htrpc_transport::{
    dispatch_fn, Dispatcher, HttpApp, HttpConfig, HttpTransport, RpcError, Transport,
    TransportClient, TransportServer,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn dispatcher() -> Dispatcher {
    dispatch_fn(|method, data| async move {
        match method.as_str() {
            "echo" => Ok(data),
            "reject" => Err(RpcError::Validation(
                "Failed to parse schema.a: required Number".into(),
            )),
            "fail" => Err(RpcError::remote("went wrong")),
            _ => Err(RpcError::UnknownMethod(method)),
        }
    })
}

async fn start_server() -> (HttpServer, HttpConfig) {
    let server = HttpServer::new(HttpConfig::new("127.0.0.1", 0), dispatcher());
    server.listen().await.expect("server should listen");
    let port = server.bound_addr().expect("server should be bound").port();
    (server, HttpConfig::new("127.0.0.1", port))
}

#[tokio::test]
async fn call_returns_raw_result() {
    let (server, config) = start_server().await;
    let client = HttpTransport::new(config).client();
    client.connect().await.expect("client should connect");

    let out = client
        .call("echo", json!({"list": [1, "two"]}))
        .await
        .expect("echo should succeed");
    assert_eq!(out, json!({"list": [1, "two"]}));

    server.stop().await.expect("server should stop");
}

#[tokio::test]
async fn failures_are_decoded_from_500_bodies() {
    let (_server, config) = start_server().await;
    let client = HttpClient::new(config);

    assert_eq!(
        client.call("reject", Value::Null).await.unwrap_err(),
        RpcError::Validation("Failed to parse schema.a: required Number".into())
    );
    assert_eq!(
        client.call("nope", Value::Null).await.unwrap_err(),
        RpcError::UnknownMethod("nope".into())
    );
    assert_eq!(
        client.call("fail", Value::Null).await.unwrap_err(),
        RpcError::Remote(json!("went wrong"))
    );
}

#[tokio::test]
async fn wire_contract_status_codes() {
    let (server, config) = start_server().await;
    let http = reqwest::Client::new();
    let base = format!("http://{}", server.local_addr().unwrap());

    let ok = http
        .post(format!("{base}/ht"))
        .json(&json!({"method": "echo", "args": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.json::<Value>().await.unwrap(), json!(5));

    let failed = http
        .post(format!("{base}/ht"))
        .json(&json!({"method": "fail"}))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), 500);
    assert_eq!(
        failed.json::<Value>().await.unwrap(),
        json!({"$htTransportError": "went wrong"})
    );

    let wrong_path = http.post(format!("{base}/other")).send().await.unwrap();
    assert_eq!(wrong_path.status(), 404);

    let wrong_method = http.get(format!("{base}/ht")).send().await.unwrap();
    assert_eq!(wrong_method.status(), 405);

    let bad_body = http
        .post(format!("{base}/ht"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(bad_body.status(), 400);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let (server, config) = start_server().await;
    server.stop().await.unwrap();

    let client = HttpClient::new(config);
    let err = client.call("echo", Value::Null).await.unwrap_err();
    assert!(matches!(err, RpcError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn server_lifecycle_is_idempotent() {
    let server = HttpServer::new(HttpConfig::new("127.0.0.1", 0), dispatcher());
    server.stop().await.unwrap();
    server.listen().await.unwrap();
    let addr = server.local_addr();
    server.listen().await.unwrap();
    assert_eq!(server.local_addr(), addr);
    server.stop().await.unwrap();
    server.stop().await.unwrap();
    assert!(!server.is_listening());
}

#[tokio::test]
async fn services_share_an_external_app() {
    let app = HttpApp::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let shutdown = CancellationToken::new();
    let serving = {
        let app = app.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { app.serve(listener, shutdown).await })
    };

    let config = |path: &str| HttpConfig {
        port,
        path: path.to_string(),
        app: Some(app.clone()),
        ..HttpConfig::new("127.0.0.1", port)
    };
    let upper = HttpServer::new(
        config("/upper"),
        dispatch_fn(|_, data| async move {
            Ok(json!(data.as_str().unwrap_or_default().to_uppercase()))
        }),
    );
    let echo = HttpServer::new(config("/echo"), dispatcher());

    upper.listen().await.unwrap();
    echo.listen().await.unwrap();
    upper.listen().await.unwrap();
    assert!(upper.is_listening());
    assert_eq!(upper.local_addr(), None);
    assert_eq!(app.routes(), vec!["/echo".to_string(), "/upper".to_string()]);

    let upper_client = HttpClient::new(config("/upper"));
    let echo_client = HttpClient::new(config("/echo"));
    assert_eq!(upper_client.call("any", json!("abc")).await.unwrap(), json!("ABC"));
    assert_eq!(echo_client.call("echo", json!(1)).await.unwrap(), json!(1));

    upper.stop().await.unwrap();
    upper.stop().await.unwrap();
    assert!(!upper.is_listening());
    assert_eq!(app.routes(), vec!["/echo".to_string()]);
    assert!(matches!(
        upper_client.call("any", json!("abc")).await,
        Err(RpcError::Transport(_))
    ));

    shutdown.cancel();
    serving.await.unwrap().unwrap();
}
