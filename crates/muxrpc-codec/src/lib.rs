//! Resumable binary (de)serialization for multiplexed message streams.
//!
//! The codec runs against caller-supplied buffers and suspends cleanly when a
//! buffer is exhausted: `run` returns the number of bytes processed so far and
//! the remaining work is resumed by the next call. This is what lets a
//! connection interleave fragments of many messages into fixed-size packets.
//!
//! Wire building blocks:
//! - fixed-width little-endian integers and one-byte booleans
//! - self-delimiting cross-encoded integers (leading byte = payload length)
//! - length-checked strings, containers and bit sequences (FNV-guarded counts)
//! - chunked byte streams with end and abort sentinels

pub mod cross;
pub mod envelope;
pub mod error;
pub mod limits;
pub mod store;

mod deserializer;
mod serializer;
mod value;

pub use deserializer::{Deserializer, StreamSink, StringCheckFn};
pub use error::{CodecError, Result};
pub use limits::Limits;
pub use serializer::{Encode, Serializer, StreamSource};
pub use value::{Bits, Decode, Kind, Value};

/// Smallest destination span in which `Serializer::run` is guaranteed to make
/// progress on any pending task (covers a stream chunk header plus a minimal
/// chunk, and the largest cross-encoded value).
pub const MIN_RUN_BUFFER_SIZE: usize = 16;
