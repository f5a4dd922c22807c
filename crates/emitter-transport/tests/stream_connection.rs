//! Emitters bound to stream connections over an in-memory transport.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use emitter::{Ack, Connection, ConnectionError, Emitter, Packet, PacketType};
use emitter_transport::testing::{MemoryTransport, frame_packet};
use emitter_transport::{ConnectionConfig, StreamConnection, Transport, split};
use eyre::{OptionExt, Result};
use futures::StreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(5);

// test suite "constructor"
#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    let _ = color_eyre::install();
}

fn connected_pair() -> (Arc<StreamConnection>, Arc<StreamConnection>) {
    let (a, b) = MemoryTransport::pair();
    (
        StreamConnection::new(a, ConnectionConfig::default()),
        StreamConnection::new(b, ConnectionConfig::default()),
    )
}

#[tokio::test]
async fn request_is_acknowledged_by_peer() -> Result<()> {
    let (client_conn, server_conn) = connected_pair();
    let client = Emitter::with_connection(&client_conn);
    let _server = Emitter::with_connection(&server_conn);

    server_conn.on("greet", |event| {
        if let Some(reply) = &event.reply {
            let _ = reply.send(Some("ok".to_string()), event.data.clone());
        }
    });

    let (id, rx) = client.request("greet", Some(json!({"who": "world"})))?;
    assert_eq!(id, 1);

    let ack = tokio::time::timeout(WAIT, rx).await??;
    assert_eq!(
        ack,
        Ack {
            name: Some("ok".to_string()),
            data: Some(json!({"who": "world"})),
        }
    );
    assert_eq!(client.pending_len(), 0);
    Ok(())
}

#[tokio::test]
async fn reserved_events_are_filtered_on_receipt() -> Result<()> {
    let (client_conn, server_conn) = connected_pair();
    let client = Emitter::with_connection(&client_conn);
    let _server = Emitter::with_connection(&server_conn);

    let (tx, mut rx) = mpsc::unbounded_channel();
    server_conn.on_any(move |event| {
        let _ = tx.send(event.name.clone());
    });

    client.send_with_ack("end", |_, _| {})?;
    client.send("data")?;
    client.send("marker")?;

    // packets are processed in order, so the marker arrives last
    let first = tokio::time::timeout(WAIT, rx.recv())
        .await?
        .ok_or_eyre("listener channel closed")?;
    assert_eq!(first, "marker");
    assert_eq!(client.pending_len(), 1);
    Ok(())
}

#[tokio::test]
async fn event_packets_on_the_wire() -> Result<()> {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let client_conn = StreamConnection::new(client_transport, ConnectionConfig::default());
    let client = Emitter::with_connection(&client_conn);
    let (mut server_reader, _server_writer) = split(server_transport);

    client.send("ping")?;
    client.send_data("ping", json!({"x": 1}))?;
    let id = client.send_data_with_ack("ping", json!({"x": 1}), |_, _| {})?;

    let mut received = Vec::new();
    for _ in 0..3 {
        let packet = tokio::time::timeout(WAIT, server_reader.next())
            .await?
            .ok_or_eyre("stream ended")??;
        received.push(packet);
    }

    assert_eq!(
        received,
        vec![
            Packet::event("ping"),
            Packet::event("ping").with_data(json!({"x": 1})),
            Packet::event("ping").with_data(json!({"x": 1})).with_id(id),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn stray_acks_are_ignored() -> Result<()> {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let client_conn = StreamConnection::new(client_transport, ConnectionConfig::default());
    let client = Emitter::with_connection(&client_conn);
    let (_server_reader, mut server_writer) = split(server_transport);

    let (tx, mut rx) = mpsc::unbounded_channel();
    client_conn.on("after", move |_| {
        let _ = tx.send(());
    });
    let id = client.send_with_ack("ping", |_, _| {})?;

    server_writer.send(Packet::ack(id + 100, None, None)).await?;
    server_writer
        .send(Packet {
            kind: PacketType::Unknown(4),
            name: Some("after".to_string()),
            data: None,
            id: None,
        })
        .await?;
    server_writer.send(Packet::event("after")).await?;

    tokio::time::timeout(WAIT, rx.recv())
        .await?
        .ok_or_eyre("listener channel closed")?;
    assert_eq!(client.pending_len(), 1);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn undecodable_packets_do_not_close_the_connection() -> Result<()> {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let client_conn = StreamConnection::new(client_transport, ConnectionConfig::default());
    let client = Emitter::with_connection(&client_conn);
    let (_server_read, mut server_write) = server_transport.into_split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client_conn.on("after", move |_| {
        let _ = tx.send(());
    });
    let (id, ack_rx) = client.request("ping", None)?;

    let wide_type = r#"{"type":256,"name":"after"}"#;
    let mut bytes = format!("Content-Length: {}\r\n\r\n{wide_type}", wide_type.len()).into_bytes();
    bytes.extend_from_slice(b"Content-Length: 7\r\n\r\nnotjson");
    bytes.extend(frame_packet(&Packet::event("after")));
    bytes.extend(frame_packet(&Packet::ack(id, Some("pong".to_string()), None)));
    server_write.write_all(&bytes).await?;

    tokio::time::timeout(WAIT, rx.recv())
        .await?
        .ok_or_eyre("listener channel closed")?;
    let ack = tokio::time::timeout(WAIT, ack_rx).await??;
    assert_eq!(ack.name.as_deref(), Some("pong"));
    assert!(rx.try_recv().is_err());
    assert!(!client_conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn reply_is_sent_once_over_the_wire() -> Result<()> {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let server_conn = StreamConnection::new(server_transport, ConnectionConfig::default());
    let _server = Emitter::with_connection(&server_conn);
    let (mut client_reader, mut client_writer) = split(client_transport);

    server_conn.on("greet", |event| {
        if let Some(reply) = &event.reply {
            let _ = reply.send(Some("ok".to_string()), None);
            let _ = reply.send(Some("again".to_string()), None);
        }
    });

    client_writer
        .send(Packet::event("greet").with_data(json!("hi")).with_id(5))
        .await?;
    client_writer
        .send(Packet::event("greet").with_data(json!("hi")))
        .await?;
    drop(client_writer);

    let ack = tokio::time::timeout(WAIT, client_reader.next())
        .await?
        .ok_or_eyre("stream ended")??;
    assert_eq!(ack, Packet::ack(5, Some("ok".to_string()), None));

    server_conn.closed().await;
    server_conn.shutdown().await;
    assert!(client_reader.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn oversized_packet_closes_read_side() -> Result<()> {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let config = ConnectionConfig::default().with_max_message_size(16);
    let client_conn = StreamConnection::new(client_transport, config);
    let _client = Emitter::with_connection(&client_conn);
    let (_server_reader, mut server_writer) = split(server_transport);

    server_writer
        .send(Packet::event("a-rather-long-event-name").with_data(json!([1, 2, 3])))
        .await?;

    tokio::time::timeout(WAIT, client_conn.closed()).await?;
    assert!(client_conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn shutdown_flushes_and_rejects_writes() -> Result<()> {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let client_conn = StreamConnection::new(client_transport, ConnectionConfig::default());
    let client = Emitter::with_connection(&client_conn);
    let (mut server_reader, _server_writer) = split(server_transport);

    client.send("last")?;
    client_conn.shutdown().await;

    let packet = server_reader.next().await.ok_or_eyre("stream ended")??;
    assert_eq!(packet, Packet::event("last"));
    assert!(server_reader.next().await.is_none());

    assert!(matches!(
        client_conn.write(Packet::event("late")),
        Err(ConnectionError::Closed)
    ));
    assert!(client.send("late").is_err());
    Ok(())
}
