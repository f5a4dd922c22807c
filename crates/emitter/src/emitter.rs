//! The event emitter: sends named events and correlates their acks.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use serde_json::Value;

use crate::connection::{Connection, IncomingEvent};
use crate::error::EmitterError;
use crate::packet::{Id, Packet, PacketType};
use crate::pending_acks::{AckCallback, PendingAcks};
use crate::reply::Reply;

/// The name and data carried by an ack packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub name: Option<String>,
    pub data: Option<Value>,
}

/// Optional parts of an outgoing event.
///
/// # Example
///
/// ```
/// use emitter::SendOptions;
/// use serde_json::json;
///
/// let options = SendOptions::new()
///     .payload(json!({"x": 1}))
///     .on_ack(|name, data| println!("acked: {name:?} {data:?}"));
/// ```
#[derive(Default)]
pub struct SendOptions {
    /// Payload attached to the event.
    pub payload: Option<Value>,
    /// Callback for the ack. Setting it makes the event request one.
    pub on_ack: Option<AckCallback>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn on_ack<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Option<String>, Option<Value>) + Send + 'static,
    {
        self.on_ack = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendOptions")
            .field("payload", &self.payload)
            .field("on_ack", &self.on_ack.is_some())
            .finish()
    }
}

struct Inner<C> {
    conn: OnceLock<Weak<C>>,
    acks: Mutex<PendingAcks>,
}

/// Sends named events over a [`Connection`] and matches acks to the
/// callbacks that asked for them.
///
/// The emitter only keeps a weak reference to its connection, and subscribes
/// to the connection's inbound packets for as long as the connection lives.
/// Cloning an emitter gives another handle to the same state.
///
/// # Example
///
/// ```
/// use emitter::{Emitter, testing::MemoryConnection};
/// use serde_json::json;
///
/// let conn = MemoryConnection::new();
/// let emitter = Emitter::with_connection(&conn);
///
/// emitter.send_data("ping", json!({"x": 1}))?;
/// let id = emitter.send_with_ack("ping", |name, data| {
///     println!("acked with {name:?} {data:?}");
/// })?;
/// assert_eq!(id, 1);
/// # Ok::<(), emitter::EmitterError>(())
/// ```
pub struct Emitter<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Emitter<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> Default for Emitter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> Emitter<C> {
    /// Create an emitter that is not bound to a connection yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                conn: OnceLock::new(),
                acks: Mutex::new(PendingAcks::new()),
            }),
        }
    }

    /// Create an emitter bound to `conn`.
    pub fn with_connection(conn: &Arc<C>) -> Self {
        let inner = Arc::new(Inner {
            conn: OnceLock::from(Arc::downgrade(conn)),
            acks: Mutex::new(PendingAcks::new()),
        });
        Inner::subscribe(&inner, conn);
        Self { inner }
    }

    /// Bind to `conn` and start handling its inbound packets.
    ///
    /// An emitter can only be bound once.
    pub fn bind(&self, conn: &Arc<C>) -> Result<(), EmitterError> {
        self.inner
            .conn
            .set(Arc::downgrade(conn))
            .map_err(|_| EmitterError::AlreadyBound)?;
        Inner::subscribe(&self.inner, conn);
        Ok(())
    }

    /// Whether the emitter has been bound to a connection.
    pub fn is_bound(&self) -> bool {
        self.inner.conn.get().is_some()
    }

    /// Number of events still waiting for their ack.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Send an event with no payload.
    pub fn send(&self, name: impl Into<String>) -> Result<(), EmitterError> {
        self.send_plain(name.into(), None)
    }

    /// Send an event with a payload.
    pub fn send_data(&self, name: impl Into<String>, data: Value) -> Result<(), EmitterError> {
        self.send_plain(name.into(), Some(data))
    }

    /// Send an event with no payload and request an ack.
    ///
    /// Returns the id allocated for the event.
    pub fn send_with_ack<F>(&self, name: impl Into<String>, on_ack: F) -> Result<Id, EmitterError>
    where
        F: FnOnce(Option<String>, Option<Value>) + Send + 'static,
    {
        self.send_acked(name.into(), None, Box::new(on_ack))
    }

    /// Send an event with a payload and request an ack.
    ///
    /// Returns the id allocated for the event.
    pub fn send_data_with_ack<F>(
        &self,
        name: impl Into<String>,
        data: Value,
        on_ack: F,
    ) -> Result<Id, EmitterError>
    where
        F: FnOnce(Option<String>, Option<Value>) + Send + 'static,
    {
        self.send_acked(name.into(), Some(data), Box::new(on_ack))
    }

    /// Send an event described by `options`.
    ///
    /// Returns the allocated id when an ack callback was given.
    pub fn send_with(
        &self,
        name: impl Into<String>,
        options: SendOptions,
    ) -> Result<Option<Id>, EmitterError> {
        let SendOptions { payload, on_ack } = options;
        match on_ack {
            Some(callback) => self.send_acked(name.into(), payload, callback).map(Some),
            None => self.send_plain(name.into(), payload).map(|()| None),
        }
    }

    /// Send an event requesting an ack, and get a receiver for that ack.
    ///
    /// The receiver can be awaited or blocked on. It reports a disconnect if
    /// the emitter state is dropped before the ack arrives.
    pub fn request(
        &self,
        name: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<(Id, oneshot::Receiver<Ack>), EmitterError> {
        let (tx, rx) = oneshot::channel();
        let callback: AckCallback = Box::new(move |name, data| {
            if tx.send(Ack { name, data }).is_err() {
                tracing::debug!("ack receiver dropped");
            }
        });
        let id = self.send_acked(name.into(), payload, callback)?;
        Ok((id, rx))
    }

    /// Handle one inbound packet.
    ///
    /// Bound emitters receive packets through their connection subscription;
    /// this is the same entry point.
    pub fn dispatch(&self, packet: Packet) {
        self.inner.ondata(packet);
    }

    #[tracing::instrument(skip(self, data), level = "debug")]
    fn send_plain(&self, name: String, data: Option<Value>) -> Result<(), EmitterError> {
        let conn = self.inner.connection()?;
        let mut packet = Packet::event(name);
        packet.data = data;

        tracing::debug!("sending event");
        conn.write(packet)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, data, callback), level = "debug")]
    fn send_acked(
        &self,
        name: String,
        data: Option<Value>,
        callback: AckCallback,
    ) -> Result<Id, EmitterError> {
        let conn = self.inner.connection()?;

        // registered before writing so an ack delivered during the write is matched
        let id = self.inner.lock().register(callback);
        let mut packet = Packet::event(name).with_id(id);
        packet.data = data;

        tracing::debug!(%id, "sending event with ack request");
        if let Err(e) = conn.write(packet) {
            self.inner.lock().take(id);
            return Err(e.into());
        }
        Ok(id)
    }
}

impl<C> fmt::Debug for Emitter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("bound", &self.inner.conn.get().is_some())
            .field("pending", &self.inner.lock().len())
            .finish()
    }
}

impl<C> Inner<C> {
    fn lock(&self) -> MutexGuard<'_, PendingAcks> {
        tracing::trace!("taking pending acks lock");
        self.acks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connection> Inner<C> {
    fn subscribe(inner: &Arc<Self>, conn: &Arc<C>) {
        let inner = Arc::clone(inner);
        conn.subscribe(Box::new(move |packet| inner.ondata(packet)));
    }

    fn connection(&self) -> Result<Arc<C>, EmitterError> {
        self.conn
            .get()
            .ok_or(EmitterError::NotBound)?
            .upgrade()
            .ok_or(EmitterError::ConnectionDropped)
    }

    fn ondata(&self, packet: Packet) {
        match packet.kind {
            PacketType::Event => self.onevent(packet),
            PacketType::Ack => self.onack(packet),
            PacketType::Unknown(code) => {
                tracing::debug!(%code, "ignoring packet of unknown type");
            }
        }
    }

    fn onevent(&self, packet: Packet) {
        let conn = match self.connection() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(error = %e, "dropping event");
                return;
            }
        };

        let name = packet.name.unwrap_or_default();
        if conn.reserved(&name) {
            tracing::debug!(%name, "not dispatching reserved event");
            return;
        }

        let reply = packet.id.map(|id| Reply::new(id, Arc::<C>::downgrade(&conn)));

        tracing::debug!(%name, id = ?packet.id, "dispatching event");
        conn.emit(IncomingEvent {
            name,
            data: packet.data,
            reply,
        });
    }

    fn onack(&self, packet: Packet) {
        let callback = packet.id.and_then(|id| self.lock().take(id));
        match callback {
            Some(callback) => {
                tracing::debug!(id = ?packet.id, "dispatching ack");
                callback(packet.name, packet.data);
            }
            None => tracing::warn!(id = ?packet.id, "bad ack"),
        }
    }
}
