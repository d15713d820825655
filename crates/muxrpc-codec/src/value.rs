//! Decoded value model.
//!
//! The deserializer is schema-driven: callers push a [`Kind`] describing what
//! the next wire value looks like and collect the matching [`Value`] once the
//! engine has consumed enough bytes. [`Decode`] ties a Rust type to its kind
//! and its conversion out of the generic value tree.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;

/// An ordered sequence of bits, packed eight per byte on the wire
/// (least-significant bit first) behind an integrity-checked bit count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bits(pub Vec<bool>);

impl Bits {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<bool>> for Bits {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

/// Shape of one wire value, pushed onto the deserializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    U8,
    U16,
    U32,
    U64,
    Bool,
    /// Self-delimiting cross-encoded integer.
    Cross,
    /// Length-checked byte string (strings share this representation).
    Bytes,
    /// Length-checked packed bit sequence.
    Bits,
    /// Counted sequence of one element kind.
    Seq(Box<Kind>),
    /// Counted key/value sequence.
    Map(Box<Kind>, Box<Kind>),
    /// Counted set of one element kind.
    Set(Box<Kind>),
    /// Fixed heterogeneous group (no count on the wire).
    Tuple(Vec<Kind>),
    /// Presence flag followed by the payload when present.
    Option(Box<Kind>),
}

/// One decoded wire value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bool(bool),
    Cross(u64),
    Bytes(Bytes),
    Bits(Bits),
    Seq(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    Option(Option<Box<Value>>),
    /// A drained stream; carries the byte count delivered to the sink.
    Stream(u64),
}

/// A type that can be read back from the wire.
///
/// `from_value` returns `None` when the value tree does not match, which only
/// happens when it is applied to a value produced from a different kind.
pub trait Decode: Sized {
    fn kind() -> Kind;
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! decode_uint {
    ($ty:ty, $kind:ident) => {
        impl Decode for $ty {
            fn kind() -> Kind {
                Kind::$kind
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

decode_uint!(u8, U8);
decode_uint!(u16, U16);
decode_uint!(u32, U32);
decode_uint!(u64, U64);

macro_rules! decode_int {
    ($ty:ty, $kind:ident) => {
        impl Decode for $ty {
            fn kind() -> Kind {
                Kind::$kind
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$kind(v) => Some(v as $ty),
                    _ => None,
                }
            }
        }
    };
}

decode_int!(i8, U8);
decode_int!(i16, U16);
decode_int!(i32, U32);
decode_int!(i64, U64);

impl Decode for bool {
    fn kind() -> Kind {
        Kind::Bool
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl Decode for String {
    fn kind() -> Kind {
        Kind::Bytes
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => String::from_utf8(b.to_vec()).ok(),
            _ => None,
        }
    }
}

impl Decode for Bytes {
    fn kind() -> Kind {
        Kind::Bytes
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl Decode for Bits {
    fn kind() -> Kind {
        Kind::Bits
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bits(b) => Some(b),
            _ => None,
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn kind() -> Kind {
        Kind::Seq(Box::new(T::kind()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Seq(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn kind() -> Kind {
        Kind::Map(Box::new(K::kind()), Box::new(V::kind()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            _ => None,
        }
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn kind() -> Kind {
        Kind::Set(Box::new(T::kind()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Set(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn kind() -> Kind {
        Kind::Option(Box::new(T::kind()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Option(None) => Some(None),
            Value::Option(Some(inner)) => T::from_value(*inner).map(Some),
            _ => None,
        }
    }
}
