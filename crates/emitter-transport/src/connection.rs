//! A [`Connection`] over an async byte stream.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use emitter::{Connection, ConnectionError, DataHandler, IncomingEvent, Listeners, Packet};
use futures::{SinkExt, Stream, StreamExt};
use tokio::io::AsyncWrite;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::codec::PacketCodec;
use crate::config::ConnectionConfig;
use crate::error::CodecError;
use crate::transport::{Transport, split_with_codec};
use crate::writer::PacketWriter;

type PacketStream = Pin<Box<dyn Stream<Item = Result<Packet, CodecError>> + Send>>;

/// Connect over TCP and wrap the stream in a [`StreamConnection`].
///
/// Must be called from within a tokio runtime.
pub async fn connect(
    addr: impl ToSocketAddrs,
    config: ConnectionConfig,
) -> std::io::Result<Arc<StreamConnection>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(StreamConnection::new(stream, config))
}

/// Packet connection over any [`Transport`].
///
/// Writes are queued on an unbounded channel and drained by a background
/// writer task, so [`Connection::write`] never waits on the network. Inbound
/// packets are read by a second task that starts when the data handler is
/// subscribed and runs it for every decoded packet.
///
/// # Example
///
/// ```ignore
/// use emitter::Emitter;
/// use emitter_transport::{ConnectionConfig, connect};
///
/// let conn = connect("127.0.0.1:7070", ConnectionConfig::default()).await?;
/// let emitter = Emitter::with_connection(&conn);
///
/// conn.on("greet", |event| println!("got {:?}", event.data));
/// emitter.send_with_ack("hello", |name, data| println!("acked {name:?} {data:?}"))?;
/// ```
pub struct StreamConnection {
    outgoing: Mutex<Option<mpsc::UnboundedSender<Packet>>>,
    incoming: Mutex<Option<PacketStream>>,
    listeners: Listeners,
    reserved: HashSet<String>,
    closed: Arc<watch::Sender<bool>>,
    runtime: Handle,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamConnection {
    /// Wrap `transport`, spawning the writer task.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new<T: Transport>(transport: T, config: ConnectionConfig) -> Arc<Self> {
        let codec = PacketCodec::with_max_size(config.max_message_size);
        let (reader, writer) = split_with_codec(transport, codec);
        let reader: PacketStream = Box::pin(reader);
        let (outgoing, queue) = mpsc::unbounded_channel();

        let runtime = Handle::current();
        let writer_task = runtime.spawn(write_loop(writer, queue));
        let (closed, _) = watch::channel(false);

        Arc::new(Self {
            outgoing: Mutex::new(Some(outgoing)),
            incoming: Mutex::new(Some(reader)),
            listeners: Listeners::new(),
            reserved: config.reserved,
            closed: Arc::new(closed),
            runtime,
            writer_task: Mutex::new(Some(writer_task)),
            reader_task: Mutex::new(None),
        })
    }

    /// Register an application listener for `name`.
    pub fn on<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&IncomingEvent) + Send + Sync + 'static,
    {
        self.listeners.on(name, listener);
    }

    /// Register an application listener for every event.
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&IncomingEvent) + Send + Sync + 'static,
    {
        self.listeners.on_any(listener);
    }

    /// Whether the read side has ended.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait until the read side ends, either at EOF or on an I/O or framing
    /// error. Bodies that fail to decode are skipped and do not end it.
    ///
    /// Never resolves if no data handler was subscribed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Stop accepting writes, flush everything already queued and stop reading.
    pub async fn shutdown(&self) {
        drop(lock(&self.outgoing).take());

        let writer_task = lock(&self.writer_task).take();
        if let Some(task) = writer_task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "writer task failed");
            }
        }

        if let Some(task) = lock(&self.reader_task).take() {
            task.abort();
        }
        self.closed.send_replace(true);
        tracing::debug!("connection shut down");
    }
}

impl Connection for StreamConnection {
    fn write(&self, packet: Packet) -> Result<(), ConnectionError> {
        let outgoing = lock(&self.outgoing);
        let tx = outgoing.as_ref().ok_or(ConnectionError::Closed)?;
        tx.send(packet).map_err(|_| ConnectionError::Closed)
    }

    fn subscribe(&self, handler: DataHandler) {
        let Some(reader) = lock(&self.incoming).take() else {
            tracing::warn!("connection already has a data handler");
            return;
        };

        let task = self
            .runtime
            .spawn(read_loop(reader, handler, Arc::clone(&self.closed)));
        *lock(&self.reader_task) = Some(task);
    }

    fn emit(&self, event: IncomingEvent) {
        self.listeners.emit(&event);
    }

    fn reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        // the writer task drains what is queued and exits once the sender is gone
        if let Some(task) = lock(&self.reader_task).take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn write_loop<W>(mut writer: PacketWriter<W>, mut queue: mpsc::UnboundedReceiver<Packet>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(packet) = queue.recv().await {
        tracing::trace!(?packet, "writing packet");
        if let Err(e) = writer.send(packet).await {
            tracing::warn!(error = %e, "failed to write packet");
            return;
        }
    }

    if let Err(e) = writer.close().await {
        tracing::debug!(error = %e, "failed to close writer");
    }
    tracing::debug!("writer finished");
}

async fn read_loop(mut reader: PacketStream, handler: DataHandler, closed: Arc<watch::Sender<bool>>) {
    while let Some(item) = reader.next().await {
        match item {
            Ok(packet) => handler(packet),
            // the stream cannot resync after a bad header or an oversized frame
            Err(e) => {
                tracing::warn!(error = %e, "failed to read packet");
                break;
            }
        }
    }

    tracing::debug!("read side closed");
    closed.send_replace(true);
}
