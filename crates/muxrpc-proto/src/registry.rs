//! Dense type registry for message payloads.
//!
//! Application message types register once and receive a dense index that
//! both peers use on the wire. A stub per type carries the type-erased
//! completion callback and the decode hook the reader side drives.

use std::any::TypeId;
use std::collections::HashMap;

use muxrpc_codec::{CodecError, Kind, Value};

use crate::message::{Message, MessageBundle, MessageId, MessagePtr};
use crate::protocol::ConnectionContext;

/// Completion callback: fired once per message after its last fragment was
/// emitted (and, for response-waiting messages, once the response arrived
/// or the connection died).
pub type CompleteFn =
    Box<dyn Fn(&mut ConnectionContext, &MessageBundle, MessageId) + Send + Sync>;

/// Reader-side constructor: turn the decoded body value back into a message.
pub type DecodeFn = Box<dyn Fn(Value) -> Option<MessagePtr> + Send + Sync>;

/// Per-type entry.
pub struct TypeStub {
    pub name: &'static str,
    pub body_kind: Kind,
    complete: CompleteFn,
    decode: DecodeFn,
}

impl TypeStub {
    pub fn complete(&self, ctx: &mut ConnectionContext, bundle: &MessageBundle, id: MessageId) {
        (self.complete)(ctx, bundle, id)
    }

    pub fn decode(&self, value: Value) -> Option<MessagePtr> {
        (self.decode)(value)
    }
}

/// Registry mapping concrete message types to dense wire indices.
///
/// Index 0 is reserved as invalid so a zero on the wire never resolves.
pub struct TypeRegistry {
    stubs: Vec<Option<TypeStub>>,
    index_of: HashMap<TypeId, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            stubs: vec![None],
            index_of: HashMap::new(),
        }
    }

    /// Register `M` and return its dense index.
    ///
    /// Re-registering a type returns the index it already holds.
    pub fn register<M, C, D>(
        &mut self,
        name: &'static str,
        body_kind: Kind,
        complete: C,
        decode: D,
    ) -> usize
    where
        M: Message,
        C: Fn(&mut ConnectionContext, &MessageBundle, MessageId) + Send + Sync + 'static,
        D: Fn(Value) -> Option<M> + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<M>();
        if let Some(&index) = self.index_of.get(&type_id) {
            return index;
        }
        let index = self.stubs.len();
        self.stubs.push(Some(TypeStub {
            name,
            body_kind,
            complete: Box::new(complete),
            decode: Box::new(move |value| {
                decode(value).map(|message| std::sync::Arc::new(message) as MessagePtr)
            }),
        }));
        self.index_of.insert(type_id, index);
        index
    }

    /// Dense index of a message's concrete type.
    pub fn type_index(&self, message: &dyn Message) -> Result<usize, CodecError> {
        self.index_of
            .get(&message.as_any().type_id())
            .copied()
            .ok_or(CodecError::UnknownType)
    }

    pub fn stub(&self, index: usize) -> Option<&TypeStub> {
        self.stubs.get(index).and_then(Option::as_ref)
    }

    /// Number of registered types (the reserved slot excluded).
    pub fn len(&self) -> usize {
        self.stubs.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use muxrpc_codec::{Decode, Serializer};

    use super::*;

    struct Ping {
        token: u32,
    }

    impl Message for Ping {
        fn encode_body(&self, s: &mut Serializer) -> muxrpc_codec::Result<()> {
            s.push_u32(self.token)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Pong;

    impl Message for Pong {
        fn encode_body(&self, _s: &mut Serializer) -> muxrpc_codec::Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn register_ping(registry: &mut TypeRegistry) -> usize {
        registry.register::<Ping, _, _>(
            "ping",
            Kind::U32,
            |_, _, _| {},
            |value| u32::from_value(value).map(|token| Ping { token }),
        )
    }

    #[test]
    fn indices_are_dense_and_stable() {
        let mut registry = TypeRegistry::new();
        let first = register_ping(&mut registry);
        let again = register_ping(&mut registry);
        assert_eq!(first, 1);
        assert_eq!(again, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn type_index_resolves_by_concrete_type() {
        let mut registry = TypeRegistry::new();
        let index = register_ping(&mut registry);
        let ping = Ping { token: 9 };
        assert_eq!(registry.type_index(&ping), Ok(index));

        let pong = Pong;
        assert_eq!(registry.type_index(&pong), Err(CodecError::UnknownType));
    }

    #[test]
    fn zero_index_never_resolves() {
        let registry = TypeRegistry::new();
        assert!(registry.stub(0).is_none());
    }

    #[test]
    fn stub_decodes_message() {
        let mut registry = TypeRegistry::new();
        let index = register_ping(&mut registry);
        let stub = registry.stub(index).unwrap();
        assert_eq!(stub.name, "ping");
        let message = stub.decode(Value::U32(42)).unwrap();
        let ping = message.as_any().downcast_ref::<Ping>().unwrap();
        assert_eq!(ping.token, 42);
    }
}
