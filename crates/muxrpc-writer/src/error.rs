use muxrpc_codec::CodecError;

/// What went wrong while producing packets.
#[derive(Debug, thiserror::Error)]
pub enum WriteErrorKind {
    /// The serialization engine failed on a message.
    #[error("serialization failed: {0}")]
    Codec(#[from] CodecError),

    /// The in-place compressor failed (the body may be clobbered).
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// A completion callback reported a connection-level failure.
    #[error("message completion failed: {0}")]
    Complete(#[source] std::io::Error),
}

/// A failed `write` call.
///
/// `written` is the byte count of complete packets produced before the
/// failure; the connection may still flush that prefix before it decides
/// whether to close.
#[derive(Debug, thiserror::Error)]
#[error("{kind} (after {written} bytes)")]
pub struct WriteError {
    pub written: usize,
    #[source]
    pub kind: WriteErrorKind,
}

impl WriteError {
    pub fn new(written: usize, kind: WriteErrorKind) -> Self {
        Self { written, kind }
    }
}

pub type Result<T> = std::result::Result<T, WriteError>;
