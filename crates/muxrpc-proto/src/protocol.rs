//! The protocol surface a connection's reader and writer share.

use muxrpc_codec::{cross, store, CodecError, Deserializer, Limits, Serializer};

use crate::flags::MessageFlags;
use crate::message::{Message, MessageId};
use crate::registry::{TypeRegistry, TypeStub};

/// Smallest packet-body span the writer must have before starting another
/// element: covers the element tag, a worst-case cross-encoded pair and the
/// serializer's own minimum progress span.
pub const MIN_FREE_PACKET_DATA_SIZE: usize = 32;

/// Per-connection state the writer refreshes before every serializer run, so
/// nested field serializers can see which message they are part of.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    pub request_id: MessageId,
    pub message_flags: MessageFlags,
    pub message_url: String,
}

/// Collaborator contract consumed by the writer (and, mirrored, the reader).
pub trait Protocol {
    fn store_u8(&self, out: &mut [u8], v: u8) -> usize {
        store::store_u8(out, v)
    }

    fn store_u16(&self, out: &mut [u8], v: u16) -> usize {
        store::store_u16(out, v)
    }

    fn store_u32(&self, out: &mut [u8], v: u32) -> usize {
        store::store_u32(out, v)
    }

    fn store_u64(&self, out: &mut [u8], v: u64) -> usize {
        store::store_u64(out, v)
    }

    fn load_u8(&self, buf: &[u8]) -> (u8, usize) {
        store::load_u8(buf)
    }

    fn load_u16(&self, buf: &[u8]) -> (u16, usize) {
        store::load_u16(buf)
    }

    fn load_u32(&self, buf: &[u8]) -> (u32, usize) {
        store::load_u32(buf)
    }

    fn load_u64(&self, buf: &[u8]) -> (u64, usize) {
        store::load_u64(buf)
    }

    fn store_cross(&self, out: &mut [u8], v: u64) -> usize {
        cross::store(out, v)
    }

    fn load_cross(&self, buf: &[u8]) -> muxrpc_codec::Result<Option<(u64, usize)>> {
        cross::load(buf)
    }

    fn type_index(&self, message: &dyn Message) -> Result<usize, CodecError>;

    fn type_stub(&self, index: usize) -> Option<&TypeStub>;

    fn create_serializer(&self) -> Serializer;

    fn create_deserializer(&self) -> Deserializer;

    fn reset_serializer(&self, s: &mut Serializer) {
        s.clear();
    }

    fn reset_deserializer(&self, d: &mut Deserializer) {
        d.clear();
    }

    fn minimum_free_packet_data_size(&self) -> usize {
        MIN_FREE_PACKET_DATA_SIZE
    }
}

/// The binary protocol: the resumable codec plus a type registry.
pub struct BinaryProtocol {
    registry: TypeRegistry,
    limits: Limits,
}

impl BinaryProtocol {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            limits: Limits::unlimited(),
        }
    }

    /// Apply default codec limits to every serializer this protocol creates.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }
}

impl Protocol for BinaryProtocol {
    fn type_index(&self, message: &dyn Message) -> Result<usize, CodecError> {
        if self.registry.is_empty() {
            return Err(CodecError::NoTypeMap);
        }
        self.registry.type_index(message)
    }

    fn type_stub(&self, index: usize) -> Option<&TypeStub> {
        self.registry.stub(index)
    }

    fn create_serializer(&self) -> Serializer {
        Serializer::with_limits(self.limits)
    }

    fn create_deserializer(&self) -> Deserializer {
        Deserializer::with_limits(self.limits)
    }
}
