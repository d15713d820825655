use muxrpc_codec::CodecError;

/// Errors raised while framing packets or resolving message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    /// The serialization engine failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The buffer is too short to hold a packet header.
    #[error("packet header truncated")]
    ShortHeader,

    /// A packet header carries a content kind outside the known set.
    #[error("unknown packet kind {0:#04x}")]
    UnknownKind(u8),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
