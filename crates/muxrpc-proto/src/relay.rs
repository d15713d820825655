//! Value types for fragments forwarded between connections.

use bytes::Bytes;

/// Opaque handle the relay engine assigns to a logical relayed message, used
/// to route its later fragments to the same outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayId {
    pub index: usize,
    pub unique: u32,
}

impl RelayId {
    pub const INVALID: RelayId = RelayId {
        index: usize::MAX,
        unique: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.index != usize::MAX
    }
}

impl Default for RelayId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// One relayed portion handed to a writer: the pre-serialized message header
/// and body bytes exactly as they arrived from the origin connection.
#[derive(Debug, Clone)]
pub struct RelayData {
    pub head: Bytes,
    pub body: Bytes,
    pub relay_id: RelayId,
    /// True when this portion ends the logical message.
    pub is_last: bool,
}

impl RelayData {
    pub fn new(head: Bytes, body: Bytes, relay_id: RelayId, is_last: bool) -> Self {
        Self {
            head,
            body,
            relay_id,
            is_last,
        }
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.body.is_empty()
    }
}
