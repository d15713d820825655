//! Relay engine hook.
//!
//! The engine is the only component that may connect a receive buffer on one
//! connection to a writer on another. Connections register by name on
//! accept; the engine and the connections hold lookup-only weak references
//! to each other, so registration and deregistration stay explicit.

use bytes::Bytes;
use muxrpc_proto::{ConnectionContext, MessageHeader, RelayData, RelayId};

/// Raised when the engine refuses a fragment; the caller keeps the fragment
/// and may retry or drop the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("relay engine refused fragment: {0}")]
pub struct RelayRefused(pub &'static str);

/// What `poll_updates` reports back to a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayUpdates {
    /// Relay buffers the engine released back to this connection.
    pub released_buffers: usize,
    /// Acknowledgements to forward to the origin peer.
    pub ack_count: u8,
}

/// The indirection between connections for forwarded messages.
pub trait RelayEngine {
    /// Register the accepting connection under its peer-visible name.
    fn register_connection(&mut self, ctx: &mut ConnectionContext, name: &str) -> RelayId;

    /// Drop a previously registered connection.
    fn unregister_connection(&mut self, relay_id: RelayId);

    /// Hand one received fragment to the engine for forwarding.
    ///
    /// The engine picks the outbound connection and fills `relay_id` on the
    /// first fragment of a logical message; later fragments carry the same
    /// id. Returns `Ok(false)` when the engine cannot place the fragment
    /// right now (the caller retries), `Err` when it refuses it outright.
    fn relay(
        &mut self,
        ctx: &mut ConnectionContext,
        header: &MessageHeader,
        data: Bytes,
        relay_id: &mut RelayId,
        is_last: bool,
    ) -> Result<bool, RelayRefused>;

    /// Ask whether this connection has buffers to release or acks to send.
    fn poll_updates(&mut self, ctx: &mut ConnectionContext, relay_id: RelayId) -> RelayUpdates;
}

/// Build the writer-side bundle payload for one relayed portion.
pub fn relay_payload(head: Bytes, body: Bytes, relay_id: RelayId, is_last: bool) -> RelayData {
    RelayData::new(head, body, relay_id, is_last)
}
