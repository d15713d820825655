//! Resumable serializer.
//!
//! Pending work lives in a deque of tagged task records. Small values are
//! rendered into task-owned bytes when pushed, so suspended tasks never
//! borrow the source value; streams stay live tasks that pull from their
//! source as buffer space allows. `run` drains tasks front to back into the
//! caller's buffer and returns how many bytes it produced; tasks that run out
//! of buffer stay queued for the next call.

use std::collections::VecDeque;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;

use crate::envelope;
use crate::error::{CodecError, Result};
use crate::limits::Limits;
use crate::store;
use crate::value::Bits;
use crate::{cross, MIN_RUN_BUFFER_SIZE};

/// Byte source for streamed values. Seeking is only exercised when a start
/// offset is supplied.
pub trait StreamSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> StreamSource for T {}

const SCALAR_MAX: usize = cross::MAX_SIZE;

enum Task {
    /// Pre-rendered fixed-size value (integer, bool, cross, sealed count).
    Scalar { buf: [u8; SCALAR_MAX], len: u8, at: u8 },
    /// Owned byte payload (string/byte-string bodies, packed bits).
    Blob { data: Bytes, at: usize },
    /// Chunk-framed byte stream.
    Stream {
        source: Box<dyn StreamSource>,
        offset: Option<u64>,
        remaining: Option<u64>,
        started: bool,
    },
}

enum Step {
    Done,
    Wait,
}

pub struct Serializer {
    tasks: VecDeque<Task>,
    limits: Limits,
    defaults: Limits,
    error: Option<CodecError>,
    stream_error: Option<CodecError>,
    stream_total: u64,
}

impl Serializer {
    pub fn new() -> Self {
        Self::with_limits(Limits::unlimited())
    }

    /// Create a serializer whose limits reset to `defaults` after every run.
    pub fn with_limits(defaults: Limits) -> Self {
        Self {
            tasks: VecDeque::new(),
            limits: defaults,
            defaults,
            error: None,
            stream_error: None,
            stream_total: 0,
        }
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

    fn push_scalar(&mut self, bytes: &[u8]) {
        let mut buf = [0u8; SCALAR_MAX];
        buf[..bytes.len()].copy_from_slice(bytes);
        self.tasks.push_back(Task::Scalar {
            buf,
            len: bytes.len() as u8,
            at: 0,
        });
    }

    pub fn push<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.ready()?;
        value.encode(self)
    }

    pub fn push_u8(&mut self, v: u8) -> Result<()> {
        self.ready()?;
        self.push_scalar(&[v]);
        Ok(())
    }

    pub fn push_u16(&mut self, v: u16) -> Result<()> {
        self.ready()?;
        self.push_scalar(&v.to_le_bytes());
        Ok(())
    }

    pub fn push_u32(&mut self, v: u32) -> Result<()> {
        self.ready()?;
        self.push_scalar(&v.to_le_bytes());
        Ok(())
    }

    pub fn push_u64(&mut self, v: u64) -> Result<()> {
        self.ready()?;
        self.push_scalar(&v.to_le_bytes());
        Ok(())
    }

    pub fn push_bool(&mut self, v: bool) -> Result<()> {
        self.push_u8(v as u8)
    }

    pub fn push_cross(&mut self, v: u64) -> Result<()> {
        self.ready()?;
        let mut buf = [0u8; cross::MAX_SIZE];
        let n = cross::store(&mut buf, v);
        self.push_scalar(&buf[..n]);
        Ok(())
    }

    /// Push a length-checked byte string.
    pub fn push_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.ready()?;
        if data.len() > self.limits.string {
            return Err(self.fail(CodecError::StringLimit));
        }
        let sealed = match envelope::seal_len(data.len() as u64) {
            Some(sealed) => sealed,
            None => return Err(self.fail(CodecError::StringMaxLimit)),
        };
        self.push_cross(sealed)?;
        self.tasks.push_back(Task::Blob {
            data: Bytes::copy_from_slice(data),
            at: 0,
        });
        Ok(())
    }

    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.push_bytes(s.as_bytes())
    }

    /// Push a bit sequence: checked bit count, then bits packed eight per
    /// byte, least-significant bit first.
    pub fn push_bits(&mut self, bits: &[bool]) -> Result<()> {
        self.ready()?;
        if bits.len() > self.limits.container {
            return Err(self.fail(CodecError::ContainerLimit));
        }
        let sealed = match envelope::seal_len(bits.len() as u64) {
            Some(sealed) => sealed,
            None => return Err(self.fail(CodecError::ContainerMaxLimit)),
        };
        self.push_cross(sealed)?;
        let mut packed = vec![0u8; bits.len().div_ceil(8)];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                packed[i / 8] |= 1 << (i % 8);
            }
        }
        self.tasks.push_back(Task::Blob {
            data: Bytes::from(packed),
            at: 0,
        });
        Ok(())
    }

    /// Open a counted container; the caller pushes `count` elements next.
    pub fn push_container_count(&mut self, count: usize) -> Result<()> {
        self.ready()?;
        if count > self.limits.container {
            return Err(self.fail(CodecError::ContainerLimit));
        }
        let sealed = match envelope::seal_len(count as u64) {
            Some(sealed) => sealed,
            None => return Err(self.fail(CodecError::ContainerMaxLimit)),
        };
        self.push_cross(sealed)
    }

    /// Push a chunk-framed stream.
    ///
    /// With `offset` the source is seeked first; a failed seek aborts only
    /// the stream (the abort sentinel is emitted and the stream error is
    /// recorded). With `len` at most that many bytes are taken from the
    /// source.
    pub fn push_stream(
        &mut self,
        source: Box<dyn StreamSource>,
        offset: Option<u64>,
        len: Option<u64>,
    ) -> Result<()> {
        self.ready()?;
        self.tasks.push_back(Task::Stream {
            source,
            offset,
            remaining: len,
            started: false,
        });
        Ok(())
    }

    /// Serialize pending work into `buf`.
    ///
    /// Returns the number of bytes written. Pending work remaining after the
    /// buffer is exhausted is resumed by the next call; `is_empty` tells the
    /// two cases apart.
    pub fn run(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut at = 0usize;
        while let Some(mut task) = self.tasks.pop_front() {
            match self.step(&mut task, buf, &mut at) {
                Ok(Step::Done) => {}
                Ok(Step::Wait) => {
                    self.tasks.push_front(task);
                    return Ok(at);
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
        self.limits = self.defaults;
        Ok(at)
    }

    fn step(&mut self, task: &mut Task, buf: &mut [u8], at: &mut usize) -> Result<Step> {
        match task {
            Task::Scalar { buf: src, len, at: done } => {
                let want = (*len - *done) as usize;
                let take = want.min(buf.len() - *at);
                buf[*at..*at + take]
                    .copy_from_slice(&src[*done as usize..*done as usize + take]);
                *at += take;
                *done += take as u8;
                if *done == *len {
                    Ok(Step::Done)
                } else {
                    Ok(Step::Wait)
                }
            }
            Task::Blob { data, at: done } => {
                let want = data.len() - *done;
                let take = want.min(buf.len() - *at);
                buf[*at..*at + take].copy_from_slice(&data[*done..*done + take]);
                *at += take;
                *done += take;
                if *done == data.len() {
                    Ok(Step::Done)
                } else {
                    Ok(Step::Wait)
                }
            }
            Task::Stream {
                source,
                offset,
                remaining,
                started,
            } => Self::step_stream(
                source,
                offset,
                remaining,
                started,
                &self.limits,
                &mut self.stream_error,
                &mut self.stream_total,
                buf,
                at,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step_stream(
        source: &mut Box<dyn StreamSource>,
        offset: &mut Option<u64>,
        remaining: &mut Option<u64>,
        started: &mut bool,
        limits: &Limits,
        stream_error: &mut Option<CodecError>,
        stream_total: &mut u64,
        buf: &mut [u8],
        at: &mut usize,
    ) -> Result<Step> {
        if !*started {
            if buf.len() - *at < MIN_RUN_BUFFER_SIZE {
                return Ok(Step::Wait);
            }
            *started = true;
            *stream_error = None;
            *stream_total = 0;
            if let Some(pos) = offset.take() {
                if source.seek(SeekFrom::Start(pos)).is_err() {
                    *stream_error = Some(CodecError::StreamSeek);
                    *at += store::store_u16(&mut buf[*at..], envelope::CHUNK_ABORT);
                    return Ok(Step::Done);
                }
            }
        }

        loop {
            let free = buf.len() - *at;
            if free < MIN_RUN_BUFFER_SIZE {
                return Ok(Step::Wait);
            }
            let mut take = (free - 2).min(envelope::MAX_SEALED_CHUNK as usize);
            if let Some(left) = *remaining {
                take = take.min(left as usize);
            }
            if take == 0 {
                // Declared length exhausted.
                *at += store::store_u16(&mut buf[*at..], envelope::CHUNK_END);
                return Ok(Step::Done);
            }
            let read = match source.read(&mut buf[*at + 2..*at + 2 + take]) {
                Ok(n) => n,
                Err(_) => {
                    *stream_error = Some(CodecError::StreamRead);
                    *at += store::store_u16(&mut buf[*at..], envelope::CHUNK_ABORT);
                    return Ok(Step::Done);
                }
            };
            if read == 0 {
                *at += store::store_u16(&mut buf[*at..], envelope::CHUNK_END);
                return Ok(Step::Done);
            }
            *stream_total += read as u64;
            if *stream_total > limits.stream {
                *stream_error = Some(CodecError::StreamLimit);
                return Err(CodecError::StreamLimit);
            }
            let sealed = envelope::seal_chunk(read as u16)
                .ok_or(CodecError::StreamChunkMaxLimit)?;
            store::store_u16(&mut buf[*at..], sealed);
            *at += 2 + read;
            if let Some(left) = remaining {
                *left -= read as u64;
            }
        }
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// A value that can be written to the wire.
pub trait Encode {
    fn encode(&self, s: &mut Serializer) -> Result<()>;
}

macro_rules! encode_prim {
    ($ty:ty, $push:ident) => {
        impl Encode for $ty {
            fn encode(&self, s: &mut Serializer) -> Result<()> {
                s.$push(*self)
            }
        }
    };
}

encode_prim!(u8, push_u8);
encode_prim!(u16, push_u16);
encode_prim!(u32, push_u32);
encode_prim!(u64, push_u64);
encode_prim!(bool, push_bool);

macro_rules! encode_signed {
    ($ty:ty, $un:ty, $push:ident) => {
        impl Encode for $ty {
            fn encode(&self, s: &mut Serializer) -> Result<()> {
                s.$push(*self as $un)
            }
        }
    };
}

encode_signed!(i8, u8, push_u8);
encode_signed!(i16, u16, push_u16);
encode_signed!(i32, u32, push_u32);
encode_signed!(i64, u64, push_u64);

impl Encode for str {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.push_str(self)
    }
}

impl Encode for String {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.push_str(self)
    }
}

impl Encode for Bytes {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.push_bytes(self)
    }
}

impl Encode for Bits {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.push_bits(&self.0)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.push_container_count(self.len())?;
        for item in self {
            item.encode(s)?;
        }
        Ok(())
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.push_container_count(self.len())?;
        for (key, value) in self {
            key.encode(s)?;
            value.encode(s)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.push_container_count(self.len())?;
        for item in self {
            item.encode(s)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, s: &mut Serializer) -> Result<()> {
        match self {
            Some(value) => {
                s.push_bool(true)?;
                value.encode(s)
            }
            None => s.push_bool(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn drain(s: &mut Serializer) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = s.run(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
            if s.is_empty() {
                return out;
            }
        }
    }

    #[test]
    fn integers_are_little_endian() {
        let mut s = Serializer::new();
        s.push_u32(0x0403_0201).unwrap();
        assert_eq!(drain(&mut s), vec![1, 2, 3, 4]);
    }

    #[test]
    fn partial_integer_never_stalls() {
        let mut s = Serializer::new();
        s.push_u64(0x0807_0605_0403_0201).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        while !s.is_empty() {
            let n = s.run(&mut buf).unwrap();
            assert!(n > 0, "progress must be made while buffer remains");
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn string_limit_enforced() {
        let mut s = Serializer::new();
        s.set_string_limit(4);
        assert_eq!(s.push_str("too long"), Err(CodecError::StringLimit));
        assert_eq!(s.error(), Some(CodecError::StringLimit));
        // Further pushes are refused until cleared.
        assert_eq!(s.push_u8(0), Err(CodecError::Reinit));
        s.clear();
        s.push_u8(0).unwrap();
    }

    #[test]
    fn container_limit_enforced() {
        let mut s = Serializer::new();
        s.set_container_limit(2);
        let v = vec![1u8, 2, 3];
        assert_eq!(s.push(&v), Err(CodecError::ContainerLimit));
    }

    #[test]
    fn limits_reset_after_run() {
        let mut s = Serializer::new();
        s.set_string_limit(4);
        s.push_str("ok").unwrap();
        drain(&mut s);
        // The run completed, so the limit is back to the default.
        s.push_str("a longer string than four").unwrap();
    }

    #[test]
    fn stream_emits_end_marker() {
        let mut s = Serializer::new();
        s.push_stream(Box::new(Cursor::new(b"abc".to_vec())), None, None)
            .unwrap();
        let out = drain(&mut s);
        let sealed = envelope::seal_chunk(3).unwrap();
        let mut expect = sealed.to_le_bytes().to_vec();
        expect.extend_from_slice(b"abc");
        expect.extend_from_slice(&envelope::CHUNK_END.to_le_bytes());
        assert_eq!(out, expect);
        assert_eq!(s.stream_error(), None);
    }

    #[test]
    fn stream_seek_failure_emits_abort() {
        struct NoSeek(Cursor<Vec<u8>>);
        impl Read for NoSeek {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.0.read(buf)
            }
        }
        impl Seek for NoSeek {
            fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
                Err(std::io::Error::other("no seek"))
            }
        }

        let mut s = Serializer::new();
        s.push_stream(Box::new(NoSeek(Cursor::new(b"x".to_vec()))), Some(4), None)
            .unwrap();
        let out = drain(&mut s);
        assert_eq!(out, envelope::CHUNK_ABORT.to_le_bytes().to_vec());
        assert_eq!(s.stream_error(), Some(CodecError::StreamSeek));
    }

    #[test]
    fn stream_limit_is_hard_failure() {
        let mut s = Serializer::new();
        s.set_stream_limit(2);
        s.push_stream(Box::new(Cursor::new(vec![0u8; 64])), None, None)
            .unwrap();
        let mut buf = [0u8; 128];
        assert_eq!(s.run(&mut buf), Err(CodecError::StreamLimit));
        assert_eq!(s.error(), Some(CodecError::StreamLimit));
    }

    #[test]
    fn stream_respects_declared_length() {
        let mut s = Serializer::new();
        s.push_stream(Box::new(Cursor::new(b"abcdef".to_vec())), Some(1), Some(3))
            .unwrap();
        let out = drain(&mut s);
        let sealed = envelope::seal_chunk(3).unwrap();
        let mut expect = sealed.to_le_bytes().to_vec();
        expect.extend_from_slice(b"bcd");
        expect.extend_from_slice(&envelope::CHUNK_END.to_le_bytes());
        assert_eq!(out, expect);
    }
}
