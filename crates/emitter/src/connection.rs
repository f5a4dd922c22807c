//! The connection abstraction the emitter sits on.

use serde_json::Value;

use crate::error::ConnectionError;
use crate::packet::Packet;
use crate::reply::Reply;

/// Handler invoked once per inbound packet.
pub type DataHandler = Box<dyn Fn(Packet) + Send + Sync>;

/// Event names used internally by socket transports for their own lifecycle.
///
/// Inbound events with these names are never redispatched to application
/// listeners when a connection uses this list as its reserved set.
pub const DEFAULT_RESERVED_EVENTS: &[&str] = &[
    "open",
    "data",
    "end",
    "close",
    "error",
    "reconnect",
    "reconnected",
    "reconnect scheduled",
    "reconnect timeout",
    "reconnect failed",
    "timeout",
    "online",
    "offline",
    "readyStateChange",
    "heartbeat",
    "incoming::open",
    "incoming::data",
    "incoming::end",
    "incoming::error",
    "outgoing::open",
    "outgoing::data",
    "outgoing::end",
    "outgoing::reconnect",
];

/// Whether `name` is one of [`DEFAULT_RESERVED_EVENTS`].
pub fn is_default_reserved(name: &str) -> bool {
    DEFAULT_RESERVED_EVENTS.contains(&name)
}

/// A duplex packet connection.
///
/// This trait abstracts over the transports an [`Emitter`](crate::Emitter)
/// can be bound to (stream transports, in-memory connections) so the
/// correlation logic does not care how packets travel.
pub trait Connection: Send + Sync + 'static {
    /// Transmit a packet. Must not block on network I/O.
    fn write(&self, packet: Packet) -> Result<(), ConnectionError>;

    /// Register the handler for inbound packets.
    ///
    /// A connection accepts a single handler.
    fn subscribe(&self, handler: DataHandler);

    /// Dispatch an application event to whatever listeners the connection keeps.
    fn emit(&self, event: IncomingEvent);

    /// Whether `name` is reserved by the transport.
    fn reserved(&self, name: &str) -> bool;
}

/// An event received from the peer, handed to the application.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    /// Event name.
    pub name: String,
    /// Payload, `None` when absent or null.
    pub data: Option<Value>,
    /// Present when the peer asked for an acknowledgement.
    pub reply: Option<Reply>,
}

impl IncomingEvent {
    /// Whether the peer asked for an acknowledgement.
    pub fn wants_ack(&self) -> bool {
        self.reply.is_some()
    }
}
