//! Message state flags.

use std::fmt;
use std::ops::BitOr;

/// Per-message flag set carried by a bundle across its whole lifetime.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFlags(u32);

impl MessageFlags {
    /// Only one synchronous message may be mid-flight per connection.
    pub const SYNCHRONOUS: MessageFlags = MessageFlags(1);
    /// The slot is held until the peer's response arrives.
    pub const WAITS_RESPONSE: MessageFlags = MessageFlags(1 << 1);
    /// The payload originated on another connection and is being forwarded.
    pub const RELAYED: MessageFlags = MessageFlags(1 << 2);
    /// First fragment has been emitted.
    pub const STARTED_SEND: MessageFlags = MessageFlags(1 << 3);
    /// Last fragment has been emitted.
    pub const DONE_SEND: MessageFlags = MessageFlags(1 << 4);
    /// The message was canceled by the local side.
    pub const CANCELED: MessageFlags = MessageFlags(1 << 5);

    pub const fn empty() -> Self {
        MessageFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        MessageFlags(bits)
    }

    pub const fn has(self, flags: MessageFlags) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub fn set(&mut self, flags: MessageFlags) -> &mut Self {
        self.0 |= flags.0;
        self
    }

    pub fn reset(&mut self, flags: MessageFlags) -> &mut Self {
        self.0 &= !flags.0;
        self
    }

    /// The flags with transient send-state bits cleared, as pushed into a
    /// message header on the wire.
    pub const fn wire_bits(self) -> u32 {
        self.0
            & !(Self::STARTED_SEND.0 | Self::DONE_SEND.0 | Self::CANCELED.0)
    }
}

impl BitOr for MessageFlags {
    type Output = MessageFlags;

    fn bitor(self, rhs: MessageFlags) -> MessageFlags {
        MessageFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for MessageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::SYNCHRONOUS, "SYNCHRONOUS"),
            (Self::WAITS_RESPONSE, "WAITS_RESPONSE"),
            (Self::RELAYED, "RELAYED"),
            (Self::STARTED_SEND, "STARTED_SEND"),
            (Self::DONE_SEND, "DONE_SEND"),
            (Self::CANCELED, "CANCELED"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.has(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "(none)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reset_has() {
        let mut flags = MessageFlags::empty();
        flags.set(MessageFlags::SYNCHRONOUS).set(MessageFlags::STARTED_SEND);
        assert!(flags.has(MessageFlags::SYNCHRONOUS));
        assert!(flags.has(MessageFlags::STARTED_SEND));
        assert!(!flags.has(MessageFlags::DONE_SEND));
        flags.reset(MessageFlags::STARTED_SEND);
        assert!(!flags.has(MessageFlags::STARTED_SEND));
    }

    #[test]
    fn wire_bits_drop_send_state() {
        let mut flags = MessageFlags::SYNCHRONOUS | MessageFlags::WAITS_RESPONSE;
        flags.set(MessageFlags::STARTED_SEND).set(MessageFlags::DONE_SEND);
        let wire = MessageFlags::from_bits(flags.wire_bits());
        assert!(wire.has(MessageFlags::SYNCHRONOUS));
        assert!(wire.has(MessageFlags::WAITS_RESPONSE));
        assert!(!wire.has(MessageFlags::STARTED_SEND));
        assert!(!wire.has(MessageFlags::DONE_SEND));
    }
}
