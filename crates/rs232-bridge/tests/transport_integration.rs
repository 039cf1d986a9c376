//! Integration tests for the two transport variants against loopback peers.
//!
//! Each test binds a listener on `127.0.0.1:0`, plays the remote peer on a
//! spawned task, and drives the transport through the `Transport` trait.

use futures_util::{SinkExt, StreamExt};
use rs232_bridge::application::{Transport, TransportError};
use rs232_bridge::infrastructure::{HttpTransport, WsTransport};
use rs232_core::Envelope;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

// ── Socket transport ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_socket_transport_exchanges_envelope_arrays() {
    // Arrange: a peer that pushes one downlink batch and captures one reply
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(WsMessage::Text(
            r#"[{"command":"tx","data":"AT\r"},{"command":"tx","data":"ATI\r"}]"#.to_string(),
        ))
        .await
        .unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        reply.into_text().unwrap()
    });

    let endpoint = Url::parse(&format!("ws://{addr}")).unwrap();
    let transport = WsTransport::connect(endpoint).await.unwrap();

    // Act
    let batch = transport.receive().await.unwrap();
    transport.send(&[Envelope::rx("OK\r\n")]).await.unwrap();
    let reply = peer.await.unwrap();

    // Assert
    assert_eq!(batch, vec![Envelope::tx("AT\r"), Envelope::tx("ATI\r")]);
    assert_eq!(reply, r#"[{"command":"rx","data":"OK\r\n"}]"#);
}

#[tokio::test]
async fn test_socket_transport_reports_close_as_fatal() {
    // Arrange: a peer that closes right after the handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;
    });

    let transport = WsTransport::connect(Url::parse(&format!("ws://{addr}")).unwrap())
        .await
        .unwrap();

    // Act
    let err = transport.receive().await.unwrap_err();

    // Assert
    assert!(err.is_fatal(), "close must end the session, got {err}");
}

#[tokio::test]
async fn test_socket_transport_surfaces_malformed_message() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(WsMessage::Text(r#"{"command":"bogus","data":"x"}"#.to_string()))
            .await
            .unwrap();
        // Keep the connection open until the client is done.
        let _ = ws.next().await;
    });

    let transport = WsTransport::connect(Url::parse(&format!("ws://{addr}")).unwrap())
        .await
        .unwrap();

    let err = transport.receive().await.unwrap_err();

    assert!(err.is_malformed());
    assert!(!err.is_fatal());
}

// ── Polling transport ─────────────────────────────────────────────────────────

/// Reads one HTTP/1.1 request (head + Content-Length body) from `stream`.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.trim()
                        .eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                return text;
            }
        }
    }
}

/// Answers one request with `status` and `body`, returning the raw request.
async fn serve_once(listener: &TcpListener, status: &str, body: &str) -> String {
    let (mut stream, _) = listener.accept().await.unwrap();
    let request = read_request(&mut stream).await;
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
    request
}

fn http_transport(listener: &TcpListener) -> HttpTransport {
    let addr = listener.local_addr().unwrap();
    let endpoint = Url::parse(&format!("http://{addr}/v01/rs232/80")).unwrap();
    HttpTransport::new(endpoint, Duration::ZERO, Some(Duration::from_secs(5))).unwrap()
}

#[tokio::test]
async fn test_polling_receive_gets_and_decodes_body() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let transport = http_transport(&listener);

    // Act
    let (request, batch) = tokio::join!(
        serve_once(&listener, "200 OK", r#"[{"command":"tx","data":"ATZ\r"}]"#),
        transport.receive()
    );

    // Assert
    assert!(request.starts_with("GET /v01/rs232/80 "));
    assert_eq!(batch.unwrap(), vec![Envelope::tx("ATZ\r")]);
}

#[tokio::test]
async fn test_polling_send_posts_rx_batch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let transport = http_transport(&listener);
    let batch = [Envelope::rx("T=21.5")];

    let (request, result) = tokio::join!(
        serve_once(&listener, "200 OK", "stored"),
        transport.send(&batch)
    );

    assert!(result.is_ok());
    assert!(request.starts_with("POST /v01/rs232/80 "));
    assert!(request.ends_with(r#"[{"command":"rx","data":"T=21.5"}]"#));
}

#[tokio::test]
async fn test_polling_error_status_is_retryable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let transport = http_transport(&listener);

    let (_, result) = tokio::join!(
        serve_once(&listener, "503 Service Unavailable", ""),
        transport.receive()
    );

    let err = result.unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 503, .. }));
    assert!(!err.is_fatal());
}
