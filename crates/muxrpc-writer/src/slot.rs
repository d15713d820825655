//! One entry of the writer's in-flight message table.

use muxrpc_codec::Serializer;
use muxrpc_proto::{MessageBundle, MessageId};

use crate::inner_list::{Link, LinkSlot};

pub(crate) const RING_ORDER: usize = 0;
pub(crate) const RING_WRITE: usize = 1;
pub(crate) const RING_CACHE: usize = 2;
pub(crate) const RING_COUNT: usize = 3;

/// Where a slot's message is in its send lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// No fragment work pending (free, or completed awaiting response).
    Empty,
    /// Accepted, serializer not yet acquired.
    WriteStart,
    /// Emitting the message header.
    WriteHead,
    /// Emitting the message body.
    WriteBody,
    /// Accepted relayed data, not yet started.
    RelayedStart,
    /// Copying relayed header bytes.
    RelayedHead,
    /// Copying relayed body bytes.
    RelayedBody,
    /// Canceled mid-flight; a cancel marker still has to go out.
    Canceled,
}

pub(crate) struct MessageSlot {
    pub bundle: Option<MessageBundle>,
    pub pool_id: MessageId,
    pub state: SlotState,
    pub serializer: Option<Serializer>,
    /// Consecutive packets this message has monopolized.
    pub packet_count: u16,
    /// Monotonic stamp disambiguating handles across slot reuse.
    pub unique: u32,
    /// Byte cursor into relayed head/body data.
    pub relay_at: usize,
    links: [Link; RING_COUNT],
}

impl Default for MessageSlot {
    fn default() -> Self {
        Self {
            bundle: None,
            pool_id: MessageId::INVALID,
            state: SlotState::Empty,
            serializer: None,
            packet_count: 0,
            unique: 0,
            relay_at: 0,
            links: [Link::default(); RING_COUNT],
        }
    }
}

impl MessageSlot {
    /// Release the slot's contents and advance the unique stamp. Zero is
    /// skipped on wrap so a wrapped stamp never matches a default handle.
    pub fn clear(&mut self) {
        self.bundle = None;
        self.pool_id = MessageId::INVALID;
        self.state = SlotState::Empty;
        self.serializer = None;
        self.packet_count = 0;
        self.relay_at = 0;
        self.unique = match self.unique.wrapping_add(1) {
            0 => 1,
            next => next,
        };
    }

    pub fn is_synchronous(&self) -> bool {
        self.bundle
            .as_ref()
            .map(MessageBundle::is_synchronous)
            .unwrap_or(false)
    }

    pub fn is_relayed(&self) -> bool {
        self.bundle
            .as_ref()
            .map(MessageBundle::is_relayed)
            .unwrap_or(false)
    }

    pub fn waits_response(&self) -> bool {
        self.bundle
            .as_ref()
            .map(MessageBundle::waits_response)
            .unwrap_or(false)
    }

    /// Fragment work is underway: a serializer is live or relayed bytes are
    /// partially copied.
    pub fn is_mid_flight(&self) -> bool {
        self.serializer.is_some()
            || matches!(
                self.state,
                SlotState::RelayedHead | SlotState::RelayedBody
            )
    }
}

impl LinkSlot for MessageSlot {
    fn link(&self, ring: usize) -> &Link {
        &self.links[ring]
    }

    fn link_mut(&mut self, ring: usize) -> &mut Link {
        &mut self.links[ring]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_bumps_unique_and_skips_zero() {
        let mut slot = MessageSlot::default();
        assert_eq!(slot.unique, 0);
        slot.clear();
        assert_eq!(slot.unique, 1);
        slot.unique = u32::MAX;
        slot.clear();
        assert_eq!(slot.unique, 1);
    }

    #[test]
    fn empty_slot_reports_no_traits() {
        let slot = MessageSlot::default();
        assert!(!slot.is_synchronous());
        assert!(!slot.is_relayed());
        assert!(!slot.waits_response());
        assert!(!slot.is_mid_flight());
    }
}
