/// Failure kinds reported by the serializer and deserializer.
///
/// Limit kinds fail the value being coded, integrity (`*MaxLimit`) kinds mean
/// a length envelope did not survive its round-trip check, and the stream
/// kinds describe per-stream I/O trouble (the surrounding message keeps
/// going; the stream itself carries the abort sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A container exceeds the configured element-count limit.
    #[error("container limit exceeded")]
    ContainerLimit,

    /// A container count failed its integrity envelope.
    #[error("container count failed integrity check")]
    ContainerMaxLimit,

    /// A string exceeds the configured length limit.
    #[error("string limit exceeded")]
    StringLimit,

    /// A string length failed its integrity envelope.
    #[error("string length failed integrity check")]
    StringMaxLimit,

    /// A stream exceeds the configured total-byte limit.
    #[error("stream limit exceeded")]
    StreamLimit,

    /// A stream chunk length failed its integrity envelope.
    #[error("stream chunk length failed integrity check")]
    StreamChunkMaxLimit,

    /// Seeking the stream to its starting offset failed.
    #[error("stream seek failed")]
    StreamSeek,

    /// Reading from the stream source failed.
    #[error("stream read failed")]
    StreamRead,

    /// Writing to the stream sink failed.
    #[error("stream write failed")]
    StreamWrite,

    /// The sending side aborted the stream (abort sentinel seen).
    #[error("stream aborted by sender")]
    StreamSender,

    /// A message type was not found in the type registry.
    #[error("unknown message type")]
    UnknownType,

    /// The codec was pushed to after a failure without being cleared.
    #[error("codec reused after failure without clear")]
    Reinit,

    /// A type-map operation was attempted with no registry configured.
    #[error("no type map configured")]
    NoTypeMap,

    /// A cross-encoded integer does not fit the destination.
    #[error("cross-encoded value too large for destination")]
    CrossValueTooSmall,
}

pub type Result<T> = std::result::Result<T, CodecError>;
