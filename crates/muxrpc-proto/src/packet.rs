//! On-wire packet framing.
//!
//! A packet is a fixed header followed by up to [`MAX_PACKET_DATA_SIZE`]
//! bytes of body. The header's kind names the first body element; further
//! elements carry a one-byte kind tag between them.
//!
//! ```text
//! |  header (4B)  |               body (0..=size bytes)                |
//! | kind flags sz | elem-1 [kind elem-2] [kind elem-3] ...             |
//! ```
//!
//! A message fragment element is `cross(slot) u16(len) <len bytes>`. Packets
//! carrying several new messages look like:
//!
//! ```text
//! | PH(NewMessage) | frag-1 [NewMessage] frag-2 [NewMessage] frag-3 |
//! ```
//!
//! while one message spread over three packets reads
//! `NewMessage / ContinuedMessage / ContinuedMessage`, the last kind carrying
//! [`END_MESSAGE_FLAG`].

use muxrpc_codec::store;

use crate::error::{ProtoError, Result};

/// Fixed header size: kind, flags, 16-bit body size.
pub const HEADER_SIZE: usize = 4;

/// Upper bound for the body of a single packet.
pub const MAX_PACKET_DATA_SIZE: usize = 64 * 1024;

/// The body size field must stay below `u16::MAX`.
pub const MAX_PACKET_BODY_SIZE: usize = 0xFFFF - 1;

/// OR'd into a message kind on the last fragment of that message.
pub const END_MESSAGE_FLAG: u8 = 0x80;

/// Content kinds, used both as header kinds and in-body element tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// First fragment of a message.
    NewMessage = 1,
    /// Later fragment of an already-started message.
    OldMessage = 2,
    /// The packet continues the message that closed the previous packet.
    ContinuedMessage = 3,
    /// The named slot was canceled; the peer drops its reassembly state.
    CancelMessage = 4,
    /// Echo of a peer request id whose cancellation we observed.
    CancelRequest = 5,
    /// Count of relay packets being acknowledged.
    AckdCount = 6,
    /// Header-only liveness probe.
    KeepAlive = 7,
}

impl PacketKind {
    /// Decode a kind code, ignoring [`END_MESSAGE_FLAG`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code & !END_MESSAGE_FLAG {
            1 => Some(Self::NewMessage),
            2 => Some(Self::OldMessage),
            3 => Some(Self::ContinuedMessage),
            4 => Some(Self::CancelMessage),
            5 => Some(Self::CancelRequest),
            6 => Some(Self::AckdCount),
            7 => Some(Self::KeepAlive),
            _ => None,
        }
    }

    pub fn is_message(self) -> bool {
        matches!(
            self,
            Self::NewMessage | Self::OldMessage | Self::ContinuedMessage
        )
    }
}

/// Header flag bits.
pub mod header_flags {
    /// The body was shrunk by the in-place compressor.
    pub const COMPRESSED: u8 = 0b01;
    /// The packet carries relayed data and requests acknowledgement.
    pub const ACK_REQUEST: u8 = 0b10;
}

/// The fixed packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Kind code of the first body element, possibly with
    /// [`END_MESSAGE_FLAG`] OR'd in.
    pub kind: u8,
    pub flags: u8,
    pub size: u16,
}

impl PacketHeader {
    pub fn new(kind: PacketKind) -> Self {
        Self {
            kind: kind as u8,
            flags: 0,
            size: 0,
        }
    }

    pub fn keep_alive() -> Self {
        Self::new(PacketKind::KeepAlive)
    }

    pub fn base_kind(&self) -> Option<PacketKind> {
        PacketKind::from_code(self.kind)
    }

    pub fn has_end_flag(&self) -> bool {
        self.kind & END_MESSAGE_FLAG != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & header_flags::COMPRESSED != 0
    }

    pub fn requests_ack(&self) -> bool {
        self.flags & header_flags::ACK_REQUEST != 0
    }

    /// Render the header at the front of `out`. `out` must hold
    /// [`HEADER_SIZE`] bytes.
    pub fn store(&self, out: &mut [u8]) -> usize {
        let mut at = store::store_u8(out, self.kind);
        at += store::store_u8(&mut out[at..], self.flags);
        at += store::store_u16(&mut out[at..], self.size);
        at
    }

    /// Parse a header from the front of `buf`.
    pub fn load(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtoError::ShortHeader);
        }
        let (kind, mut at) = store::load_u8(buf);
        let (flags, n) = store::load_u8(&buf[at..]);
        at += n;
        let (size, n) = store::load_u16(&buf[at..]);
        at += n;
        if PacketKind::from_code(kind).is_none() {
            return Err(ProtoError::UnknownKind(kind));
        }
        Ok((Self { kind, flags, size }, at))
    }
}
