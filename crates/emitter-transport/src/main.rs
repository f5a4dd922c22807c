use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, Context};
use emitter::{Emitter, IncomingEvent};
use emitter_transport::{ConnectionConfig, DEFAULT_PORT, StreamConnection, connect};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Send and acknowledge events over TCP")]
struct Args {
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accept connections and acknowledge every event that asks for it
    Serve,
    /// Send a single event
    Send {
        name: String,

        /// JSON payload
        #[clap(short, long)]
        data: Option<String>,

        /// Request an ack and print it
        #[clap(short, long)]
        ack: bool,

        /// Seconds to wait for the ack
        #[clap(short, long, default_value_t = 10)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "parsed command line arguments");

    let addr = format!("{}:{}", args.host, args.port);
    match args.command {
        Command::Serve => serve(&addr).await,
        Command::Send {
            name,
            data,
            ack,
            timeout,
        } => {
            let data = data
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("parsing --data as JSON")?;
            send(&addr, name, data, ack, Duration::from_secs(timeout)).await
        }
    }
}

async fn serve(addr: &str) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding to {addr}"))?;
    tracing::info!(%addr, "listening");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted.context("accepting connection")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }
        };
        tracing::info!(%peer, "accepted connection");

        let conn = StreamConnection::new(stream, ConnectionConfig::default());
        conn.on_any(move |event| acknowledge(&peer.to_string(), event));
        let emitter = Emitter::with_connection(&conn);

        tokio::spawn(async move {
            conn.closed().await;
            tracing::info!(%peer, pending = emitter.pending_len(), "connection closed");
        });
    }
}

fn acknowledge(peer: &str, event: &IncomingEvent) {
    tracing::info!(%peer, name = %event.name, data = ?event.data, "received event");
    let Some(reply) = &event.reply else {
        return;
    };
    if let Err(e) = reply.send(Some("ack".to_string()), event.data.clone()) {
        tracing::warn!(%peer, error = %e, "failed to acknowledge event");
    }
}

async fn send(
    addr: &str,
    name: String,
    data: Option<Value>,
    ack: bool,
    timeout: Duration,
) -> eyre::Result<()> {
    let conn = connect(addr, ConnectionConfig::default())
        .await
        .wrap_err_with(|| format!("connecting to {addr}"))?;
    let emitter = Emitter::with_connection(&conn);

    if ack {
        let (id, rx) = emitter.request(name, data).context("sending event")?;
        let ack = tokio::time::timeout(timeout, rx)
            .await
            .wrap_err_with(|| format!("waiting for ack {id}"))?
            .context("connection closed before ack")?;
        println!(
            "{}",
            serde_json::json!({"id": id, "name": ack.name, "data": ack.data})
        );
    } else {
        let sent = match data {
            Some(data) => emitter.send_data(name, data),
            None => emitter.send(name),
        };
        sent.context("sending event")?;
    }

    conn.shutdown().await;
    Ok(())
}
