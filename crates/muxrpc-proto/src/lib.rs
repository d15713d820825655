//! Message model, type registry and packet framing.
//!
//! This crate fixes the shared vocabulary between a connection's writer and
//! its peer's reader: what a message bundle is, how application types map to
//! dense wire indices, what a packet header looks like and which content
//! kinds a packet body may carry.

pub mod error;
pub mod flags;
pub mod message;
pub mod packet;
pub mod protocol;
pub mod registry;
pub mod relay;

pub use error::{ProtoError, Result};
pub use flags::MessageFlags;
pub use message::{Message, MessageBundle, MessageHeader, MessageId, MessagePtr, Payload};
pub use packet::{PacketHeader, PacketKind, END_MESSAGE_FLAG, MAX_PACKET_DATA_SIZE};
pub use protocol::{BinaryProtocol, ConnectionContext, Protocol};
pub use registry::{TypeRegistry, TypeStub};
pub use relay::{RelayData, RelayId};
