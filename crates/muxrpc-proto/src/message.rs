//! Message bundles and identifiers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use muxrpc_codec::{Kind, Serializer, Value};

use crate::flags::MessageFlags;
use crate::relay::RelayData;

/// An application message payload.
///
/// Concrete types serialize themselves through the resumable engine;
/// `as_any` lets the registry downcast by comparing type ids when a
/// completion callback fires.
pub trait Message: Send + Sync + 'static {
    fn encode_body(&self, s: &mut Serializer) -> muxrpc_codec::Result<()>;

    fn as_any(&self) -> &dyn Any;
}

pub type MessagePtr = Arc<dyn Message>;

/// The per-message header preceding the body on the wire: state-cleared
/// flags plus the routing hint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub flags: u32,
    pub url: String,
}

impl MessageHeader {
    pub fn encode(&self, s: &mut Serializer) -> muxrpc_codec::Result<()> {
        s.push_cross(self.flags as u64)?;
        s.push_str(&self.url)
    }

    pub fn kind() -> Kind {
        Kind::Tuple(vec![Kind::Cross, Kind::Bytes])
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Tuple(mut items) if items.len() == 2 => {
                let url = match items.pop()? {
                    Value::Bytes(b) => String::from_utf8(b.to_vec()).ok()?,
                    _ => return None,
                };
                let flags = match items.pop()? {
                    Value::Cross(v) => u32::try_from(v).ok()?,
                    _ => return None,
                };
                Some(Self { flags, url })
            }
            _ => None,
        }
    }
}

/// What a slot is actually sending: a local application message, or bytes
/// already serialized on another connection and forwarded through the relay
/// engine.
#[derive(Clone)]
pub enum Payload {
    Local(MessagePtr),
    Relayed(RelayData),
}

/// Everything the writer needs to track one outbound message.
#[derive(Clone)]
pub struct MessageBundle {
    pub payload: Payload,
    /// Dense registry index of the payload type; unused for relayed data.
    pub type_index: usize,
    pub flags: MessageFlags,
    /// Optional routing hint carried in the message header.
    pub url: String,
}

impl MessageBundle {
    pub fn new(message: MessagePtr, type_index: usize, flags: MessageFlags) -> Self {
        Self {
            payload: Payload::Local(message),
            type_index,
            flags,
            url: String::new(),
        }
    }

    pub fn relayed(data: RelayData, flags: MessageFlags) -> Self {
        let mut flags = flags;
        flags.set(MessageFlags::RELAYED);
        Self {
            payload: Payload::Relayed(data),
            type_index: 0,
            flags,
            url: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_synchronous(&self) -> bool {
        self.flags.has(MessageFlags::SYNCHRONOUS)
    }

    pub fn waits_response(&self) -> bool {
        self.flags.has(MessageFlags::WAITS_RESPONSE)
    }

    pub fn is_relayed(&self) -> bool {
        self.flags.has(MessageFlags::RELAYED)
    }

    pub fn message(&self) -> Option<&MessagePtr> {
        match &self.payload {
            Payload::Local(message) => Some(message),
            Payload::Relayed(_) => None,
        }
    }

    /// The header pushed before the body, with transient state bits cleared.
    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            flags: self.flags.wire_bits(),
            url: self.url.clone(),
        }
    }
}

impl fmt::Debug for MessageBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBundle")
            .field(
                "payload",
                &match &self.payload {
                    Payload::Local(_) => "local",
                    Payload::Relayed(_) => "relayed",
                },
            )
            .field("type_index", &self.type_index)
            .field("flags", &self.flags)
            .field("url", &self.url)
            .finish()
    }
}

/// Handle to an in-flight message: slot index plus the slot's unique stamp.
///
/// A handle is only honored while the stamp still matches, which makes
/// reused slots safe to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub index: usize,
    pub unique: u32,
}

impl MessageId {
    pub const INVALID: MessageId = MessageId {
        index: usize::MAX,
        unique: 0,
    };

    pub fn new(index: usize, unique: u32) -> Self {
        Self { index, unique }
    }

    pub fn is_valid(&self) -> bool {
        self.index != usize::MAX
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::INVALID
    }
}
