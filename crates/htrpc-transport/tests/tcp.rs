use std::sync::Arc;
use std::time::Duration;

use htrpc_frame::{FrameConfig, FrameReader, FrameWriter, Message, WireResponse};
use htrpc_transport::tcp::{TcpClient, TcpServer};
use htrpc_transport::{
    dispatch_fn, RpcError, TcpConfig, TcpTransport, Transport, TransportClient, TransportServer,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn start_server() -> (Arc<TcpServer>, TcpConfig) {
    start_server_with(FrameConfig::default()).await
}

async fn start_server_with(frame: FrameConfig) -> (Arc<TcpServer>, TcpConfig) {
    let dispatcher = dispatch_fn(|method, data| async move {
        match method.as_str() {
            "echo" => Ok(data),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(json!({"slow": data}))
            }
            "fast" => Ok(json!({"fast": data})),
            "big" => Ok(json!("x".repeat(data.as_u64().unwrap_or_default() as usize))),
            "fail" => Err(RpcError::remote(json!({"error": "nope", "code": 3}))),
            _ => Err(RpcError::UnknownMethod(method)),
        }
    });
    let config = TcpConfig {
        frame,
        ..TcpConfig::new("127.0.0.1", 0)
    };
    let server = Arc::new(TcpServer::new(config, dispatcher));
    server.listen().await.expect("server should listen");
    let port = server.bound_addr().expect("server should be bound").port();
    (server, TcpConfig::new("127.0.0.1", port))
}

#[tokio::test]
async fn echo_round_trip_through_transport_factory() {
    let (server, config) = start_server().await;
    let transport = TcpTransport::new(config);
    let client = transport.client();
    client.connect().await.expect("client should connect");

    let out = client
        .call("echo", json!({"a": [1, 2, 3]}))
        .await
        .expect("echo should succeed");
    assert_eq!(out, json!({"a": [1, 2, 3]}));

    client.disconnect().await.expect("disconnect should succeed");
    server.stop().await.expect("server should stop");
}

#[tokio::test]
async fn concurrent_calls_answered_out_of_order_are_not_swapped() {
    let (_server, config) = start_server().await;
    let client = TcpClient::new(config);
    client.connect().await.expect("client should connect");

    let (slow, fast) = tokio::join!(client.call("slow", json!(1)), client.call("fast", json!(2)));
    assert_eq!(slow.expect("slow call should succeed"), json!({"slow": 1}));
    assert_eq!(fast.expect("fast call should succeed"), json!({"fast": 2}));
}

#[tokio::test]
async fn many_in_flight_calls_resolve_to_their_own_results() {
    let (_server, config) = start_server().await;
    let client = Arc::new(TcpClient::new(config));
    client.connect().await.expect("client should connect");

    let calls: Vec<_> = (0..50)
        .map(|n| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { (n, client.call("echo", json!(n)).await) })
        })
        .collect();
    for call in calls {
        let (n, result) = call.await.expect("task should join");
        assert_eq!(result.expect("echo should succeed"), json!(n));
    }
}

#[tokio::test]
async fn errors_come_back_as_data() {
    let (_server, config) = start_server().await;
    let client = TcpClient::new(config);
    client.connect().await.expect("client should connect");

    assert_eq!(
        client.call("missing", Value::Null).await.unwrap_err(),
        RpcError::UnknownMethod("missing".to_string())
    );
    assert_eq!(
        client.call("fail", Value::Null).await.unwrap_err(),
        RpcError::Remote(json!({"error": "nope", "code": 3}))
    );
}

#[tokio::test]
async fn client_lifecycle_is_idempotent() {
    let (_server, config) = start_server().await;
    let client = TcpClient::new(config);
    client.disconnect().await.expect("disconnect before connect is a no-op");
    client.connect().await.expect("client should connect");
    client.connect().await.expect("second connect is a no-op");
    assert!(client.is_connected());
    assert_eq!(client.call("echo", json!("x")).await.unwrap(), json!("x"));

    client.disconnect().await.expect("disconnect should succeed");
    client.disconnect().await.expect("second disconnect is a no-op");
    assert!(!client.is_connected());
    assert_eq!(
        client.call("echo", json!("x")).await.unwrap_err(),
        RpcError::Disconnected
    );

    client.connect().await.expect("reconnect should succeed");
    assert_eq!(client.call("echo", json!("y")).await.unwrap(), json!("y"));
}

/// A hand-driven server: answers the first request twice, first with an id
/// nobody asked for.
#[tokio::test]
async fn responses_with_unknown_ids_are_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let fake = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);
        let mut writer = FrameWriter::new(write_half);
        loop {
            let Ok(Message::Request(request)) = reader.read_message().await else {
                return;
            };
            writer
                .write_message(&Message::Response(WireResponse::ok("bogus", json!("wrong"))))
                .await
                .unwrap();
            writer
                .write_message(&Message::Response(WireResponse::ok(request.id, request.data)))
                .await
                .unwrap();
        }
    });

    let client = TcpClient::new(TcpConfig::new("127.0.0.1", port));
    client.connect().await.expect("client should connect");
    assert_eq!(client.call("echo", json!(1)).await.unwrap(), json!(1));
    assert_eq!(client.call("echo", json!(2)).await.unwrap(), json!(2));
    assert!(client.is_connected());

    client.disconnect().await.unwrap();
    fake.await.unwrap();
}

#[tokio::test]
async fn dropped_connection_fails_pending_calls() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = FrameReader::new(stream);
        let _ = reader.read_message().await;
    });

    let client = TcpClient::new(TcpConfig::new("127.0.0.1", port));
    client.connect().await.expect("client should connect");
    let err = client.call("echo", json!(1)).await.unwrap_err();
    assert_eq!(err, RpcError::Disconnected);

    for _ in 0..50 {
        if !client.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!client.is_connected());
}

#[tokio::test]
async fn stopping_the_server_disconnects_clients() {
    let (server, config) = start_server().await;
    let client = TcpClient::new(config);
    client.connect().await.expect("client should connect");
    assert_eq!(client.call("echo", json!(1)).await.unwrap(), json!(1));

    server.stop().await.expect("server should stop");
    assert!(!server.is_listening());

    let err = client.call("slow", json!(1)).await.unwrap_err();
    assert_eq!(err, RpcError::Disconnected);
}

fn small_frames() -> FrameConfig {
    FrameConfig {
        max_payload_size: 1024,
    }
}

#[tokio::test]
async fn oversized_request_fails_alone() {
    let (_server, config) = start_server().await;
    let client = Arc::new(TcpClient::new(TcpConfig {
        frame: small_frames(),
        ..config
    }));
    client.connect().await.expect("client should connect");

    let slow = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call("slow", json!(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = client
        .call("echo", json!("x".repeat(4096)))
        .await
        .expect_err("oversized request should fail");
    assert!(
        matches!(&err, RpcError::Transport(message) if message.contains("payload too large")),
        "got {err:?}"
    );

    let slow = slow.await.expect("task should join");
    assert_eq!(slow.expect("in-flight call should succeed"), json!({"slow": 1}));
    assert!(client.is_connected());
    assert_eq!(client.call("echo", json!(2)).await.unwrap(), json!(2));
}

#[tokio::test]
async fn oversized_response_fails_alone() {
    let (_server, config) = start_server_with(small_frames()).await;
    let client = Arc::new(TcpClient::new(config));
    client.connect().await.expect("client should connect");

    let slow = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call("slow", json!(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = client
        .call("big", json!(4096))
        .await
        .expect_err("oversized response should fail");
    assert!(
        matches!(&err, RpcError::Transport(message) if message.contains("payload too large")),
        "got {err:?}"
    );

    let slow = slow.await.expect("task should join");
    assert_eq!(slow.expect("in-flight call should succeed"), json!({"slow": 1}));
    assert!(client.is_connected());
    assert_eq!(client.call("big", json!(3)).await.unwrap(), json!("xxx"));
}
