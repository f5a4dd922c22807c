//! Wire packets.
//!
//! Two kinds of packet travel over a connection: events, which carry a name
//! and an optional payload, and acks, which answer an event that asked for
//! one. Both are correlated through the optional [`Id`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier correlating an event with its ack.
pub type Id = u64;

/// Wire codes for the packet kinds. Both ends of a connection must agree on these.
pub mod packets {
    /// Code of an event packet.
    pub const EVENT: u64 = 0;
    /// Code of an ack packet.
    pub const ACK: u64 = 1;
}

/// The kind of a [`Packet`], serialized as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum PacketType {
    /// A named event.
    Event,
    /// An acknowledgement of a previously sent event.
    Ack,
    /// A code this protocol does not know about. Kept so the packet still
    /// decodes; the dispatcher drops it.
    Unknown(u64),
}

impl PacketType {
    /// The wire code for this kind.
    pub fn code(self) -> u64 {
        match self {
            PacketType::Event => packets::EVENT,
            PacketType::Ack => packets::ACK,
            PacketType::Unknown(code) => code,
        }
    }
}

impl From<u64> for PacketType {
    fn from(code: u64) -> Self {
        match code {
            packets::EVENT => PacketType::Event,
            packets::ACK => PacketType::Ack,
            other => PacketType::Unknown(other),
        }
    }
}

impl From<PacketType> for u64 {
    fn from(kind: PacketType) -> Self {
        kind.code()
    }
}

/// A single unit exchanged over a connection.
///
/// Absent optional fields are left out of the serialized form, and a JSON
/// `null` payload decodes the same as a missing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Packet kind.
    #[serde(rename = "type")]
    pub kind: PacketType,
    /// Event name. Set on events; on acks it is whatever the replier passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Set when an event asks for an ack, or when an ack answers one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

impl Packet {
    /// An event packet with no payload and no id.
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            kind: PacketType::Event,
            name: Some(name.into()),
            data: None,
            id: None,
        }
    }

    /// An ack packet answering the event with the given id.
    pub fn ack(id: Id, name: Option<String>, data: Option<Value>) -> Self {
        Self {
            kind: PacketType::Ack,
            name,
            data,
            id: Some(id),
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach an id.
    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_without_optional_fields() {
        let json = serde_json::to_value(Packet::event("ping")).unwrap();
        assert_eq!(json, json!({"type": 0, "name": "ping"}));
    }

    #[test]
    fn ack_uses_integer_code() {
        let packet = Packet::ack(5, Some("ok".to_string()), None);
        let json = serde_json::to_value(packet).unwrap();
        assert_eq!(json, json!({"type": 1, "name": "ok", "id": 5}));
    }

    #[test]
    fn deserialize_event_with_id() {
        let json = r#"{"type":0,"name":"greet","data":"hi","id":5}"#;

        let packet: Packet = serde_json::from_str(json).unwrap();
        assert_eq!(packet.kind, PacketType::Event);
        assert_eq!(packet.name.as_deref(), Some("greet"));
        assert_eq!(packet.data, Some(json!("hi")));
        assert_eq!(packet.id, Some(5));
    }

    #[test]
    fn null_data_is_absent() {
        let packet: Packet = serde_json::from_str(r#"{"type":1,"id":2,"data":null}"#).unwrap();
        assert_eq!(packet.data, None);
    }

    #[test]
    fn unknown_type_still_decodes() {
        let packet: Packet = serde_json::from_str(r#"{"type":7,"name":"x"}"#).unwrap();
        assert_eq!(packet.kind, PacketType::Unknown(7));
        assert_eq!(packet.kind.code(), 7);
    }

    #[test]
    fn wide_unknown_type_still_decodes() {
        let packet: Packet = serde_json::from_str(r#"{"type":256,"name":"x"}"#).unwrap();
        assert_eq!(packet.kind, PacketType::Unknown(256));
        assert_eq!(serde_json::to_value(&packet).unwrap()["type"], 256);
    }

    #[test]
    fn codes_match_wire_contract() {
        assert_eq!(PacketType::Event.code(), 0);
        assert_eq!(PacketType::Ack.code(), 1);
        assert_eq!(PacketType::from(packets::ACK), PacketType::Ack);
    }
}
