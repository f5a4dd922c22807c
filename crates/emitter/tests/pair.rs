//! Two emitters talking to each other over an in-memory connection pair.

use std::io::IsTerminal;
use std::sync::{Arc, Mutex};

use emitter::{Ack, Emitter, Packet, PacketType, testing::MemoryConnection};
use eyre::{OptionExt, Result};
use serde_json::json;
use tracing_subscriber::EnvFilter;

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

struct Peers {
    client_conn: Arc<MemoryConnection>,
    server_conn: Arc<MemoryConnection>,
    client: Emitter<MemoryConnection>,
    server: Emitter<MemoryConnection>,
}

fn peers() -> Peers {
    let (client_conn, server_conn) = MemoryConnection::pair();
    let client = Emitter::with_connection(&client_conn);
    let server = Emitter::with_connection(&server_conn);
    Peers {
        client_conn,
        server_conn,
        client,
        server,
    }
}

#[test]
fn event_and_ack_round_trip() -> Result<()> {
    let peers = peers();

    peers.server_conn.on("greet", |event| {
        let reply = event.reply.as_ref().expect("greet asks for an ack");
        let data = event.data.clone();
        reply.send(Some("ok".to_string()), data).unwrap();
    });

    let (_, rx) = peers.client.request("greet", Some(json!("hi")))?;
    let ack = rx.recv()?;

    assert_eq!(
        ack,
        Ack {
            name: Some("ok".to_string()),
            data: Some(json!("hi")),
        }
    );
    assert_eq!(peers.client.pending_len(), 0);
    Ok(())
}

#[test]
fn both_sides_allocate_ids_independently() -> Result<()> {
    let peers = peers();
    peers.client_conn.on_any(|event| {
        if let Some(reply) = &event.reply {
            reply.ack().unwrap();
        }
    });
    peers.server_conn.on_any(|event| {
        if let Some(reply) = &event.reply {
            reply.ack().unwrap();
        }
    });

    let a = peers.client.send_with_ack("a", |_, _| {})?;
    let b = peers.server.send_with_ack("b", |_, _| {})?;
    let c = peers.client.send_with_ack("c", |_, _| {})?;

    assert_eq!((a, b, c), (1, 1, 2));
    assert_eq!(peers.client.pending_len(), 0);
    assert_eq!(peers.server.pending_len(), 0);
    Ok(())
}

#[test]
fn repeated_replies_write_one_ack() -> Result<()> {
    let peers = peers();
    let calls = Arc::new(Mutex::new(0));

    peers.server_conn.on("greet", |event| {
        let reply = event.reply.clone().expect("greet asks for an ack");
        for _ in 0..3 {
            reply.send(Some("ok".to_string()), None).unwrap();
        }
    });

    let c = Arc::clone(&calls);
    peers.client.send_with_ack("greet", move |_, _| {
        *c.lock().unwrap() += 1;
    })?;

    let acks: Vec<Packet> = peers
        .server_conn
        .written()
        .into_iter()
        .filter(|p| p.kind == PacketType::Ack)
        .collect();
    assert_eq!(acks.len(), 1);
    assert_eq!(*calls.lock().unwrap(), 1);
    Ok(())
}

#[test]
fn unanswered_ack_stays_pending() -> Result<()> {
    let peers = peers();
    let events = peers.server_conn.events();

    let id = peers.client.send_with_ack("greet", |_, _| {})?;

    let event = events.try_recv()?;
    let reply = event.reply.ok_or_eyre("reply missing")?;
    assert_eq!(reply.id(), id);
    assert_eq!(peers.client.pending_len(), 1);

    reply.ack()?;
    assert_eq!(peers.client.pending_len(), 0);
    Ok(())
}

#[test]
fn reserved_names_never_reach_listeners() -> Result<()> {
    let (client_conn, server_conn) = MemoryConnection::pair();
    let client = Emitter::with_connection(&client_conn);

    // the server side reserves the default lifecycle names
    let server_conn_reserved = MemoryConnection::with_default_reserved();
    let server = Emitter::with_connection(&server_conn_reserved);
    let events = server_conn_reserved.events();

    server.dispatch(Packet::event("end").with_id(1));
    server.dispatch(Packet::event("data"));
    server.dispatch(Packet::event("greet"));

    let received: Vec<String> = events.try_iter().map(|e| e.name).collect();
    assert_eq!(received, vec!["greet".to_string()]);
    assert!(server_conn_reserved.written().is_empty());

    // unreserved side still dispatches the same names
    let _server = Emitter::with_connection(&server_conn);
    let plain_events = server_conn.events();
    client.send("end")?;
    assert_eq!(plain_events.try_recv()?.name, "end");
    Ok(())
}
