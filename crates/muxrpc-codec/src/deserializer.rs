//! Resumable deserializer.
//!
//! The engine is schema-driven: callers push a [`Kind`] per expected wire
//! value and take the decoded [`Value`] once enough bytes have been fed
//! through `run`. Work is a deque of tagged task records; composite tasks
//! schedule their children in front of themselves and collect the results
//! off a value stack, so decoding suspends cleanly at any byte boundary.

use std::collections::VecDeque;
use std::io::{Seek, SeekFrom, Write};

use bytes::Bytes;

use crate::envelope;
use crate::error::{CodecError, Result};
use crate::limits::Limits;
use crate::value::{Bits, Kind, Value};

/// Byte sink for streamed values. Seeking is only exercised when a start
/// offset is supplied.
pub trait StreamSink: Write + Seek + Send {}

impl<T: Write + Seek + Send> StreamSink for T {}

/// Inspection hook invoked with every loaded string fragment.
pub type StringCheckFn = Box<dyn Fn(&[u8]) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prim {
    U8,
    U16,
    U32,
    U64,
    Bool,
}

impl Prim {
    fn width(self) -> u8 {
        match self {
            Prim::U8 | Prim::Bool => 1,
            Prim::U16 => 2,
            Prim::U32 => 4,
            Prim::U64 => 8,
        }
    }

    fn finish(self, raw: &[u8; 8]) -> Value {
        match self {
            Prim::U8 => Value::U8(raw[0]),
            Prim::Bool => Value::Bool(raw[0] == 1),
            Prim::U16 => Value::U16(u16::from_le_bytes([raw[0], raw[1]])),
            Prim::U32 => Value::U32(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            Prim::U64 => Value::U64(u64::from_le_bytes(*raw)),
        }
    }
}

enum CrossDest {
    Plain,
    BytesLen,
    BitsLen,
    SeqLen(Kind),
    SetLen(Kind),
    MapLen(Kind, Kind),
}

enum MapAwait {
    Idle,
    Key,
    Val,
}

enum ChunkState {
    Header { have: u8, raw: [u8; 2] },
    Body { left: u16 },
}

enum Task {
    Prim {
        have: u8,
        raw: [u8; 8],
        prim: Prim,
    },
    CrossVal {
        have: u8,
        raw: [u8; crate::cross::MAX_SIZE],
        dest: CrossDest,
    },
    BytesData {
        remaining: u64,
        data: Vec<u8>,
    },
    BitsData {
        total: u64,
        read: u64,
        data: Vec<bool>,
    },
    Seq {
        elem: Kind,
        total: usize,
        acc: Vec<Value>,
        awaiting: bool,
        is_set: bool,
    },
    MapEntries {
        key: Kind,
        val: Kind,
        total: usize,
        acc: Vec<(Value, Value)>,
        pending_key: Option<Value>,
        awaiting: MapAwait,
    },
    Group {
        kinds: Vec<Kind>,
        acc: Vec<Value>,
        awaiting: bool,
    },
    Opt {
        elem: Kind,
        payload: bool,
        awaiting: bool,
    },
    Stream {
        sink: Box<dyn StreamSink>,
        offset: Option<u64>,
        started: bool,
        drain: bool,
        chunk: ChunkState,
    },
}

enum Step {
    Done(Value),
    Wait,
    Replace(Task),
    Descend(Kind),
}

pub struct Deserializer {
    tasks: VecDeque<Task>,
    vals: Vec<Value>,
    limits: Limits,
    defaults: Limits,
    error: Option<CodecError>,
    stream_error: Option<CodecError>,
    stream_total: u64,
    string_check: Option<StringCheckFn>,
}

impl Deserializer {
    pub fn new() -> Self {
        Self::with_limits(Limits::unlimited())
    }

    /// Create a deserializer whose limits reset to `defaults` after every run.
    pub fn with_limits(defaults: Limits) -> Self {
        Self {
            tasks: VecDeque::new(),
            vals: Vec::new(),
            limits: defaults,
            defaults,
            error: None,
            stream_error: None,
            stream_total: 0,
            string_check: None,
        }
    }

    /// Install an inspection hook called with every loaded string fragment.
    pub fn with_string_check(mut self, check: StringCheckFn) -> Self {
        self.string_check = Some(check);
        self
    }

    /// True when no work is pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The latched hard failure, if any.
    pub fn error(&self) -> Option<CodecError> {
        self.error
    }

    /// The most recent per-stream soft failure, if any.
    pub fn stream_error(&self) -> Option<CodecError> {
        self.stream_error
    }

    /// Abandon all pending work and clear failure state.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.vals.clear();
        self.limits = self.defaults;
        self.error = None;
        self.stream_error = None;
        self.stream_total = 0;
    }

    pub fn set_string_limit(&mut self, limit: usize) {
        self.limits.string = limit;
    }

    pub fn set_container_limit(&mut self, limit: usize) {
        self.limits.container = limit;
    }

    pub fn set_stream_limit(&mut self, limit: u64) {
        self.limits.stream = limit;
    }

    fn ready(&self) -> Result<()> {
        match self.error {
            Some(_) => Err(CodecError::Reinit),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: CodecError) -> CodecError {
        self.error = Some(err);
        self.limits = self.defaults;
        err
    }

    /// Schedule one wire value of the given shape.
    pub fn push(&mut self, kind: Kind) -> Result<()> {
        self.ready()?;
        let task = Self::task_for(kind);
        self.tasks.push_back(task);
        Ok(())
    }

    /// Schedule a chunk-framed stream draining into `sink`.
    pub fn push_stream(&mut self, sink: Box<dyn StreamSink>, offset: Option<u64>) -> Result<()> {
        self.ready()?;
        self.tasks.push_back(Task::Stream {
            sink,
            offset,
            started: false,
            drain: false,
            chunk: ChunkState::Header {
                have: 0,
                raw: [0; 2],
            },
        });
        Ok(())
    }

    /// Take the oldest fully decoded value, if one is available.
    pub fn take(&mut self) -> Option<Value> {
        if self.vals.is_empty() {
            None
        } else {
            Some(self.vals.remove(0))
        }
    }

    fn task_for(kind: Kind) -> Task {
        let prim = |prim| Task::Prim {
            have: 0,
            raw: [0; 8],
            prim,
        };
        let cross = |dest| Task::CrossVal {
            have: 0,
            raw: [0; crate::cross::MAX_SIZE],
            dest,
        };
        match kind {
            Kind::U8 => prim(Prim::U8),
            Kind::U16 => prim(Prim::U16),
            Kind::U32 => prim(Prim::U32),
            Kind::U64 => prim(Prim::U64),
            Kind::Bool => prim(Prim::Bool),
            Kind::Cross => cross(CrossDest::Plain),
            Kind::Bytes => cross(CrossDest::BytesLen),
            Kind::Bits => cross(CrossDest::BitsLen),
            Kind::Seq(elem) => cross(CrossDest::SeqLen(*elem)),
            Kind::Set(elem) => cross(CrossDest::SetLen(*elem)),
            Kind::Map(key, val) => cross(CrossDest::MapLen(*key, *val)),
            Kind::Tuple(kinds) => Task::Group {
                kinds,
                acc: Vec::new(),
                awaiting: false,
            },
            Kind::Option(elem) => Task::Opt {
                elem: *elem,
                payload: false,
                awaiting: false,
            },
        }
    }

    /// Consume bytes from `buf`, advancing pending work.
    ///
    /// Returns the number of bytes consumed. Remaining work resumes on the
    /// next call; `is_empty` tells completion from suspension apart.
    pub fn run(&mut self, buf: &[u8]) -> Result<usize> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut at = 0usize;
        while let Some(mut task) = self.tasks.pop_front() {
            match self.step(&mut task, buf, &mut at) {
                Ok(Step::Done(value)) => self.vals.push(value),
                Ok(Step::Wait) => {
                    self.tasks.push_front(task);
                    return Ok(at);
                }
                Ok(Step::Replace(next)) => self.tasks.push_front(next),
                Ok(Step::Descend(kind)) => {
                    self.tasks.push_front(task);
                    let child = Self::task_for(kind);
                    self.tasks.push_front(child);
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
        self.limits = self.defaults;
        Ok(at)
    }

    fn pop_val(&mut self) -> Result<Value> {
        self.vals.pop().ok_or(CodecError::Reinit)
    }

    fn step(&mut self, task: &mut Task, buf: &[u8], at: &mut usize) -> Result<Step> {
        match task {
            Task::Prim { have, raw, prim } => {
                let need = prim.width();
                let take = ((need - *have) as usize).min(buf.len() - *at);
                raw[*have as usize..*have as usize + take]
                    .copy_from_slice(&buf[*at..*at + take]);
                *at += take;
                *have += take as u8;
                if *have == need {
                    Ok(Step::Done(prim.finish(raw)))
                } else {
                    Ok(Step::Wait)
                }
            }
            Task::CrossVal { have, raw, dest } => {
                if *have == 0 {
                    if *at == buf.len() {
                        return Ok(Step::Wait);
                    }
                    raw[0] = buf[*at];
                    *at += 1;
                    *have = 1;
                    if crate::cross::size_of_first(raw[0]).is_none() {
                        return Err(CodecError::CrossValueTooSmall);
                    }
                }
                let total = 1 + raw[0] as usize;
                let take = (total - *have as usize).min(buf.len() - *at);
                raw[*have as usize..*have as usize + take]
                    .copy_from_slice(&buf[*at..*at + take]);
                *at += take;
                *have += take as u8;
                if (*have as usize) < total {
                    return Ok(Step::Wait);
                }
                let mut le = [0u8; 8];
                le[..total - 1].copy_from_slice(&raw[1..total]);
                let value = u64::from_le_bytes(le);
                self.finish_cross(value, dest)
            }
            Task::BytesData { remaining, data } => {
                let take = (*remaining as usize).min(buf.len() - *at);
                if take > 0 {
                    if let Some(check) = &self.string_check {
                        check(&buf[*at..*at + take]);
                    }
                    data.extend_from_slice(&buf[*at..*at + take]);
                    *at += take;
                    *remaining -= take as u64;
                }
                if *remaining == 0 {
                    Ok(Step::Done(Value::Bytes(Bytes::from(std::mem::take(data)))))
                } else {
                    Ok(Step::Wait)
                }
            }
            Task::BitsData { total, read, data } => {
                while *read < *total && *at < buf.len() {
                    let byte = buf[*at];
                    *at += 1;
                    let bits = (*total - *read).min(8);
                    for bit in 0..bits {
                        data.push(byte & (1 << bit) != 0);
                    }
                    *read += bits;
                }
                if *read == *total {
                    Ok(Step::Done(Value::Bits(Bits(std::mem::take(data)))))
                } else {
                    Ok(Step::Wait)
                }
            }
            Task::Seq {
                elem,
                total,
                acc,
                awaiting,
                is_set,
            } => {
                if *awaiting {
                    let value = self.pop_val()?;
                    acc.push(value);
                    *awaiting = false;
                }
                if acc.len() == *total {
                    let items = std::mem::take(acc);
                    return Ok(Step::Done(if *is_set {
                        Value::Set(items)
                    } else {
                        Value::Seq(items)
                    }));
                }
                *awaiting = true;
                Ok(Step::Descend(elem.clone()))
            }
            Task::MapEntries {
                key,
                val,
                total,
                acc,
                pending_key,
                awaiting,
            } => {
                match awaiting {
                    MapAwait::Key => {
                        *pending_key = Some(self.pop_val()?);
                        *awaiting = MapAwait::Val;
                        return Ok(Step::Descend(val.clone()));
                    }
                    MapAwait::Val => {
                        let value = self.pop_val()?;
                        let entry_key = pending_key.take().ok_or(CodecError::Reinit)?;
                        acc.push((entry_key, value));
                        *awaiting = MapAwait::Idle;
                    }
                    MapAwait::Idle => {}
                }
                if acc.len() == *total {
                    return Ok(Step::Done(Value::Map(std::mem::take(acc))));
                }
                *awaiting = MapAwait::Key;
                Ok(Step::Descend(key.clone()))
            }
            Task::Group {
                kinds,
                acc,
                awaiting,
            } => {
                if *awaiting {
                    let value = self.pop_val()?;
                    acc.push(value);
                    *awaiting = false;
                }
                if acc.len() == kinds.len() {
                    return Ok(Step::Done(Value::Tuple(std::mem::take(acc))));
                }
                *awaiting = true;
                Ok(Step::Descend(kinds[acc.len()].clone()))
            }
            Task::Opt {
                elem,
                payload,
                awaiting,
            } => {
                if *awaiting {
                    let value = self.pop_val()?;
                    *awaiting = false;
                    if *payload {
                        return Ok(Step::Done(Value::Option(Some(Box::new(value)))));
                    }
                    match value {
                        Value::Bool(true) => *payload = true,
                        Value::Bool(false) => return Ok(Step::Done(Value::Option(None))),
                        _ => return Err(CodecError::Reinit),
                    }
                }
                *awaiting = true;
                if *payload {
                    Ok(Step::Descend(elem.clone()))
                } else {
                    Ok(Step::Descend(Kind::Bool))
                }
            }
            Task::Stream {
                sink,
                offset,
                started,
                drain,
                chunk,
            } => {
                if !*started {
                    *started = true;
                    self.stream_error = None;
                    self.stream_total = 0;
                    if let Some(pos) = offset.take() {
                        if sink.seek(SeekFrom::Start(pos)).is_err() {
                            self.stream_error = Some(CodecError::StreamSeek);
                            *drain = true;
                        }
                    }
                }
                loop {
                    match chunk {
                        ChunkState::Header { have, raw } => {
                            let take = ((2 - *have) as usize).min(buf.len() - *at);
                            raw[*have as usize..*have as usize + take]
                                .copy_from_slice(&buf[*at..*at + take]);
                            *at += take;
                            *have += take as u8;
                            if *have < 2 {
                                return Ok(Step::Wait);
                            }
                            let sealed = u16::from_le_bytes(*raw);
                            if sealed == envelope::CHUNK_ABORT {
                                self.stream_error = Some(CodecError::StreamSender);
                                return Ok(Step::Done(Value::Stream(self.stream_total)));
                            }
                            if sealed == envelope::CHUNK_END {
                                return Ok(Step::Done(Value::Stream(self.stream_total)));
                            }
                            let size = envelope::open_chunk(sealed)
                                .ok_or(CodecError::StreamChunkMaxLimit)?;
                            self.stream_total += size as u64;
                            if self.stream_total > self.limits.stream {
                                self.stream_error = Some(CodecError::StreamLimit);
                                return Err(CodecError::StreamLimit);
                            }
                            *chunk = ChunkState::Body { left: size };
                        }
                        ChunkState::Body { left } => {
                            let take = (*left as usize).min(buf.len() - *at);
                            if take == 0 {
                                return Ok(Step::Wait);
                            }
                            if !*drain && sink.write_all(&buf[*at..*at + take]).is_err() {
                                self.stream_error = Some(CodecError::StreamWrite);
                                *drain = true;
                            }
                            *at += take;
                            *left -= take as u16;
                            if *left == 0 {
                                *chunk = ChunkState::Header {
                                    have: 0,
                                    raw: [0; 2],
                                };
                            }
                        }
                    }
                }
            }
        }
    }

    fn finish_cross(&self, value: u64, dest: &mut CrossDest) -> Result<Step> {
        match dest {
            CrossDest::Plain => Ok(Step::Done(Value::Cross(value))),
            CrossDest::BytesLen => {
                let len = envelope::open_len(value).ok_or(CodecError::StringMaxLimit)?;
                if len > self.limits.string as u64 {
                    return Err(CodecError::StringLimit);
                }
                Ok(Step::Replace(Task::BytesData {
                    remaining: len,
                    data: Vec::with_capacity(len.min(4096) as usize),
                }))
            }
            CrossDest::BitsLen => {
                let total = envelope::open_len(value).ok_or(CodecError::ContainerMaxLimit)?;
                if total > self.limits.container as u64 {
                    return Err(CodecError::ContainerLimit);
                }
                Ok(Step::Replace(Task::BitsData {
                    total,
                    read: 0,
                    data: Vec::with_capacity(total.min(4096) as usize),
                }))
            }
            CrossDest::SeqLen(elem) => {
                let total = envelope::open_len(value).ok_or(CodecError::ContainerMaxLimit)?;
                if total > self.limits.container as u64 {
                    return Err(CodecError::ContainerLimit);
                }
                Ok(Step::Replace(Task::Seq {
                    elem: elem.clone(),
                    total: total as usize,
                    acc: Vec::new(),
                    awaiting: false,
                    is_set: false,
                }))
            }
            CrossDest::SetLen(elem) => {
                let total = envelope::open_len(value).ok_or(CodecError::ContainerMaxLimit)?;
                if total > self.limits.container as u64 {
                    return Err(CodecError::ContainerLimit);
                }
                Ok(Step::Replace(Task::Seq {
                    elem: elem.clone(),
                    total: total as usize,
                    acc: Vec::new(),
                    awaiting: false,
                    is_set: true,
                }))
            }
            CrossDest::MapLen(key, val) => {
                let total = envelope::open_len(value).ok_or(CodecError::ContainerMaxLimit)?;
                if total > self.limits.container as u64 {
                    return Err(CodecError::ContainerLimit);
                }
                Ok(Step::Replace(Task::MapEntries {
                    key: key.clone(),
                    val: val.clone(),
                    total: total as usize,
                    acc: Vec::new(),
                    pending_key: None,
                    awaiting: MapAwait::Idle,
                }))
            }
        }
    }
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::serializer::Serializer;
    use crate::value::Decode;

    fn serialize_all(s: &mut Serializer) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 128];
        while !s.is_empty() || out.is_empty() {
            let n = s.run(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
            if s.is_empty() {
                break;
            }
        }
        out
    }

    fn decode_one<T: Decode>(wire: &[u8]) -> T {
        let mut d = Deserializer::new();
        d.push(T::kind()).unwrap();
        let n = d.run(wire).unwrap();
        assert!(d.is_empty());
        assert_eq!(n, wire.len());
        T::from_value(d.take().unwrap()).unwrap()
    }

    #[test]
    fn primitive_round_trip() {
        let mut s = Serializer::new();
        s.push_u32(0xDEAD_BEEF).unwrap();
        let wire = serialize_all(&mut s);
        assert_eq!(decode_one::<u32>(&wire), 0xDEAD_BEEF);
    }

    #[test]
    fn bool_decodes_one_as_true() {
        assert!(decode_one::<bool>(&[1]));
        assert!(!decode_one::<bool>(&[0]));
    }

    #[test]
    fn string_round_trip_byte_by_byte() {
        let mut s = Serializer::new();
        s.push_str("resumable").unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new();
        d.push(String::kind()).unwrap();
        let mut consumed = 0;
        for chunk in wire.chunks(1) {
            consumed += d.run(chunk).unwrap();
        }
        assert_eq!(consumed, wire.len());
        assert!(d.is_empty());
        let decoded = String::from_value(d.take().unwrap()).unwrap();
        assert_eq!(decoded, "resumable");
    }

    #[test]
    fn corrupted_string_length_rejected() {
        let mut s = Serializer::new();
        s.push_str("abc").unwrap();
        let mut wire = serialize_all(&mut s);
        // The sealed length is cross-encoded right at the front; flip a
        // payload bit to break the integrity check.
        wire[1] ^= 0x40;

        let mut d = Deserializer::new();
        d.push(String::kind()).unwrap();
        assert_eq!(d.run(&wire), Err(CodecError::StringMaxLimit));
        assert_eq!(d.error(), Some(CodecError::StringMaxLimit));
    }

    #[test]
    fn string_limit_enforced_on_load() {
        let mut s = Serializer::new();
        s.push_str("well past the limit").unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new();
        d.set_string_limit(4);
        d.push(String::kind()).unwrap();
        assert_eq!(d.run(&wire), Err(CodecError::StringLimit));
    }

    #[test]
    fn string_check_hook_sees_every_fragment() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = Arc::clone(&seen);

        let mut s = Serializer::new();
        s.push_str("0123456789").unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new().with_string_check(Box::new(move |frag| {
            seen_in_hook.fetch_add(frag.len(), Ordering::SeqCst);
        }));
        d.push(String::kind()).unwrap();
        for chunk in wire.chunks(3) {
            d.run(chunk).unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn bits_round_trip_partial_trailing_byte() {
        let bits = Bits(vec![true, false, true, true, false, true, false, true, true, false, true]);
        let mut s = Serializer::new();
        s.push(&bits).unwrap();
        let wire = serialize_all(&mut s);
        assert_eq!(decode_one::<Bits>(&wire), bits);
    }

    #[test]
    fn stream_drains_into_sink() {
        let mut s = Serializer::new();
        s.push_stream(Box::new(Cursor::new(b"stream payload".to_vec())), None, None)
            .unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new();
        d.push_stream(Box::new(Cursor::new(Vec::new())), None).unwrap();
        for chunk in wire.chunks(5) {
            d.run(chunk).unwrap();
        }
        assert!(d.is_empty());
        assert_eq!(d.take(), Some(Value::Stream(14)));
        assert_eq!(d.stream_error(), None);
    }

    #[test]
    fn stream_abort_sentinel_sets_sender_error() {
        let wire = envelope::CHUNK_ABORT.to_le_bytes();
        let mut d = Deserializer::new();
        d.push_stream(Box::new(Cursor::new(Vec::new())), None).unwrap();
        d.run(&wire).unwrap();
        assert!(d.is_empty());
        assert_eq!(d.stream_error(), Some(CodecError::StreamSender));
    }

    #[test]
    fn stream_limit_enforced_on_load() {
        let mut s = Serializer::new();
        s.push_stream(Box::new(Cursor::new(vec![7u8; 32])), None, None)
            .unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new();
        d.set_stream_limit(8);
        d.push_stream(Box::new(Cursor::new(Vec::new())), None).unwrap();
        assert_eq!(d.run(&wire), Err(CodecError::StreamLimit));
    }

    #[test]
    fn container_limit_enforced_on_load() {
        let mut s = Serializer::new();
        s.push(&vec![1u8, 2, 3, 4, 5]).unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new();
        d.set_container_limit(2);
        d.push(Vec::<u8>::kind()).unwrap();
        assert_eq!(d.run(&wire), Err(CodecError::ContainerLimit));
    }

    #[test]
    fn tuple_and_option_round_trip() {
        let mut s = Serializer::new();
        s.push_cross(77).unwrap();
        s.push(&Some(0xAAu8)).unwrap();
        s.push(&None::<u8>).unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new();
        d.push(Kind::Tuple(vec![
            Kind::Cross,
            Kind::Option(Box::new(Kind::U8)),
            Kind::Option(Box::new(Kind::U8)),
        ]))
        .unwrap();
        d.run(&wire).unwrap();
        assert!(d.is_empty());
        assert_eq!(
            d.take(),
            Some(Value::Tuple(vec![
                Value::Cross(77),
                Value::Option(Some(Box::new(Value::U8(0xAA)))),
                Value::Option(None),
            ]))
        );
    }

    #[test]
    fn multiple_roots_complete_in_push_order() {
        let mut s = Serializer::new();
        s.push_u8(1).unwrap();
        s.push_u16(2).unwrap();
        let wire = serialize_all(&mut s);

        let mut d = Deserializer::new();
        d.push(Kind::U8).unwrap();
        d.push(Kind::U16).unwrap();
        d.run(&wire).unwrap();
        assert_eq!(d.take(), Some(Value::U8(1)));
        assert_eq!(d.take(), Some(Value::U16(2)));
        assert_eq!(d.take(), None);
    }
}
