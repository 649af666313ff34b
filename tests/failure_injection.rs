//! Failure injection tests for upstream outages.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

mod common;

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let dead = common::unused_addr().await;
    let gateway = common::spawn_gateway(common::config_for(dead)).await;

    let res = common::http_client()
        .get(gateway.url("/auth/login"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.text().await.unwrap(), "Upstream service unreachable");
}

#[tokio::test]
async fn silent_upstream_is_gateway_timeout() {
    let silent = common::start_silent_backend().await;
    let mut config = common::config_for(silent);
    config.timeouts.upstream_secs = 1;
    let gateway = common::spawn_gateway(config).await;

    let start = Instant::now();
    let res = common::http_client()
        .get(gateway.url("/analytics/report"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "answered after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "answered after {elapsed:?}");
}

#[tokio::test]
async fn upstream_error_status_is_passed_through() {
    let backend = common::start_echo_backend().await;
    let gateway = common::spawn_gateway(common::config_for(backend)).await;

    let res = common::http_client()
        .get(gateway.url("/face-recognition/status/500"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().await.unwrap().starts_with("GET /face-recognition/status/500"));
}

#[tokio::test]
async fn dropped_connection_is_not_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
        }
    });

    let gateway = common::spawn_gateway(common::config_for(backend)).await;
    let res = common::http_client()
        .post(gateway.url("/attendance/records"))
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1, "request was sent more than once");
}

#[tokio::test]
async fn one_dead_service_does_not_affect_the_others() {
    let backend = common::start_echo_backend().await;
    let dead = common::unused_addr().await;
    let mut config = common::config_for(backend);
    config.services.notification = dead.to_string();
    let gateway = common::spawn_gateway(config).await;
    let client = common::http_client();

    let down = client.get(gateway.url("/notification/send")).send().await.unwrap();
    assert_eq!(down.status(), StatusCode::BAD_GATEWAY);

    let up = client.get(gateway.url("/attendance/today")).send().await.unwrap();
    assert_eq!(up.status(), StatusCode::OK);
}

#[tokio::test]
async fn truncated_upstream_body_aborts_the_client_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
            .await;
    });

    let gateway = common::spawn_gateway(common::config_for(backend)).await;
    let res = common::http_client()
        .get(gateway.url("/analytics/export"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = tokio::time::timeout(Duration::from_secs(3), res.bytes())
        .await
        .expect("client body left hanging");
    assert!(body.is_err(), "truncated body was delivered as complete");
}

#[tokio::test]
async fn client_disconnect_closes_streaming_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = socket.into_split();
        let mut buf = [0u8; 1024];
        let _ = reader.read(&mut buf).await;
        let _ = writer
            .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await;

        let mut ticker = tokio::time::interval(Duration::from_millis(50));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if writer.write_all(b"5\r\ntick\n\r\n").await.is_err() {
                        break;
                    }
                }
                read = reader.read(&mut buf) => {
                    if matches!(read, Ok(0) | Err(_)) {
                        break;
                    }
                }
            }
        }
        let _ = closed_tx.send(());
    });

    let gateway = common::spawn_gateway(common::config_for(backend)).await;
    let client = common::http_client();
    let mut res = client
        .get(gateway.url("/attendance/live-feed"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let first = res.chunk().await.unwrap().expect("no chunk relayed");
    assert!(!first.is_empty());

    drop(res);
    drop(client);

    tokio::time::timeout(Duration::from_secs(3), closed_rx)
        .await
        .expect("upstream connection still open after the client left")
        .unwrap();
}
