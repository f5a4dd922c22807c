//! In-memory connection for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use crossbeam_channel::{Receiver, Sender};

use crate::connection::{Connection, DEFAULT_RESERVED_EVENTS, DataHandler, IncomingEvent};
use crate::error::ConnectionError;
use crate::listeners::Listeners;
use crate::packet::Packet;

/// A [`Connection`] that keeps everything in memory.
///
/// Every written packet is recorded, inbound packets are injected with
/// [`MemoryConnection::deliver`], and emitted events go to registered
/// listeners and to every live channel returned by [`MemoryConnection::events`].
///
/// # Example
///
/// ```
/// use emitter::{Emitter, testing::MemoryConnection};
///
/// // Create a connected pair of connections
/// let (client, server) = MemoryConnection::pair();
/// let client_emitter = Emitter::with_connection(&client);
/// let _server_emitter = Emitter::with_connection(&server);
///
/// server.on("ping", |event| {
///     if let Some(reply) = &event.reply {
///         let _ = reply.send(Some("pong".to_string()), None);
///     }
/// });
///
/// let (tx, rx) = crossbeam_channel::unbounded();
/// client_emitter.send_with_ack("ping", move |name, _| {
///     let _ = tx.send(name);
/// })?;
/// assert_eq!(rx.try_recv().unwrap(), Some("pong".to_string()));
/// # Ok::<(), emitter::EmitterError>(())
/// ```
pub struct MemoryConnection {
    written: Mutex<Vec<Packet>>,
    handler: OnceLock<DataHandler>,
    listeners: Listeners,
    subscribers: Mutex<Vec<Sender<IncomingEvent>>>,
    reserved: HashSet<String>,
    closed: AtomicBool,
    peer: OnceLock<Weak<MemoryConnection>>,
}

impl MemoryConnection {
    /// A standalone connection with no reserved names.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(HashSet::new()))
    }

    /// A standalone connection reserving the given names.
    pub fn with_reserved<I, S>(names: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self::build(names.into_iter().map(Into::into).collect()))
    }

    /// A standalone connection reserving [`DEFAULT_RESERVED_EVENTS`].
    pub fn with_default_reserved() -> Arc<Self> {
        Self::with_reserved(DEFAULT_RESERVED_EVENTS.iter().copied())
    }

    /// Create a connected pair.
    ///
    /// Packets written on one connection are delivered synchronously to the
    /// other connection's handler. Both sides are also recorded as usual.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let a = Self::new();
        let b = Self::new();
        let _ = a.peer.set(Arc::downgrade(&b));
        let _ = b.peer.set(Arc::downgrade(&a));
        (a, b)
    }

    fn build(reserved: HashSet<String>) -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            handler: OnceLock::new(),
            listeners: Listeners::new(),
            subscribers: Mutex::new(Vec::new()),
            reserved,
            closed: AtomicBool::new(false),
            peer: OnceLock::new(),
        }
    }

    /// Feed an inbound packet to the subscribed handler.
    pub fn deliver(&self, packet: Packet) {
        match self.handler.get() {
            Some(handler) => handler(packet),
            None => tracing::debug!(?packet, "no data handler, dropping packet"),
        }
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

    /// Channel of every event passed to [`Connection::emit`] from now on.
    ///
    /// Events emitted while no receiver is alive are not kept, and a dropped
    /// receiver stops being fed.
    pub fn events(&self) -> Receiver<IncomingEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.lock_subscribers().push(tx);
        rx
    }

    /// Packets written so far.
    pub fn written(&self) -> Vec<Packet> {
        self.lock_written().clone()
    }

    /// Packets written so far, clearing the record.
    pub fn take_written(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.lock_written())
    }

    /// Make further writes fail with [`ConnectionError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Accept writes again after [`MemoryConnection::close`].
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    fn lock_written(&self) -> MutexGuard<'_, Vec<Packet>> {
        self.written.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Sender<IncomingEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connection for MemoryConnection {
    fn write(&self, packet: Packet) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        self.lock_written().push(packet.clone());

        if let Some(peer) = self.peer.get().and_then(Weak::upgrade) {
            peer.deliver(packet);
        }
        Ok(())
    }

    fn subscribe(&self, handler: DataHandler) {
        if self.handler.set(handler).is_err() {
            tracing::warn!("connection already has a data handler");
        }
    }

    fn emit(&self, event: IncomingEvent) {
        self.listeners.emit(&event);
        self.lock_subscribers()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }
}
