//! Writer configuration and per-call write flags.

use std::fmt;

/// In-place body compressor: returns the compressed length, `0` to send the
/// body unmodified.
pub type CompressFn = Box<dyn Fn(&mut [u8]) -> std::io::Result<usize> + Send + Sync>;

/// Tuning knobs for one connection's writer.
pub struct WriterConfig {
    /// Messages allowed in the write queue at once (multiplex window).
    pub max_message_count_multiplex: usize,
    /// Completed messages allowed to hold slots awaiting a response.
    pub max_message_count_response_wait: usize,
    /// Consecutive packets one message may monopolize before rotation.
    pub max_message_continuous_packet_count: u16,
    /// Optional in-place packet-body compressor.
    pub inplace_compress: Option<CompressFn>,
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multiplex(mut self, count: usize) -> Self {
        self.max_message_count_multiplex = count;
        self
    }

    pub fn with_response_wait(mut self, count: usize) -> Self {
        self.max_message_count_response_wait = count;
        self
    }

    pub fn with_continuous_packets(mut self, count: u16) -> Self {
        self.max_message_continuous_packet_count = count;
        self
    }

    pub fn with_compress(mut self, compress: CompressFn) -> Self {
        self.inplace_compress = Some(compress);
        self
    }

    /// Slot table capacity implied by the two windows.
    pub fn slot_count(&self) -> usize {
        self.max_message_count_multiplex + self.max_message_count_response_wait
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_message_count_multiplex: 8,
            max_message_count_response_wait: 8,
            max_message_continuous_packet_count: 4,
            inplace_compress: None,
        }
    }
}

impl fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterConfig")
            .field("max_message_count_multiplex", &self.max_message_count_multiplex)
            .field(
                "max_message_count_response_wait",
                &self.max_message_count_response_wait,
            )
            .field(
                "max_message_continuous_packet_count",
                &self.max_message_continuous_packet_count,
            )
            .field("inplace_compress", &self.inplace_compress.is_some())
            .finish()
    }
}

/// Per-call input flags for `MessageWriter::write`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteFlags(u8);

impl WriteFlags {
    /// The relay buffer is lent to this call; relayed fragments may go out.
    pub const CAN_SEND_RELAYED_MESSAGES: WriteFlags = WriteFlags(1);
    /// Emit a bare keep-alive packet if nothing else is produced.
    pub const SHOULD_SEND_KEEP_ALIVE: WriteFlags = WriteFlags(1 << 1);

    pub const fn empty() -> Self {
        WriteFlags(0)
    }

    pub const fn has(self, flags: WriteFlags) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub fn set(&mut self, flags: WriteFlags) -> &mut Self {
        self.0 |= flags.0;
        self
    }
}

impl std::ops::BitOr for WriteFlags {
    type Output = WriteFlags;

    fn bitor(self, rhs: WriteFlags) -> WriteFlags {
        WriteFlags(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builders() {
        let config = WriterConfig::new()
            .with_multiplex(4)
            .with_response_wait(2)
            .with_continuous_packets(1);
        assert_eq!(config.slot_count(), 6);
        assert_eq!(config.max_message_continuous_packet_count, 1);
        assert!(config.inplace_compress.is_none());
    }

    #[test]
    fn write_flags_combine() {
        let flags =
            WriteFlags::CAN_SEND_RELAYED_MESSAGES | WriteFlags::SHOULD_SEND_KEEP_ALIVE;
        assert!(flags.has(WriteFlags::CAN_SEND_RELAYED_MESSAGES));
        assert!(flags.has(WriteFlags::SHOULD_SEND_KEEP_ALIVE));
        assert!(!WriteFlags::empty().has(WriteFlags::SHOULD_SEND_KEEP_ALIVE));
    }
}
