//! Whole-codec properties: chunking independence, round-trips, bounds.

use std::collections::BTreeMap;
use std::io::Cursor;

use muxrpc_codec::{Bits, CodecError, Decode, Deserializer, Kind, Serializer, Value};

fn serialize_chunked(s: &mut Serializer, chunk_sizes: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut sizes = chunk_sizes.iter().copied().cycle();
    while !s.is_empty() {
        let size = sizes.next().unwrap().max(1);
        let mut buf = vec![0u8; size];
        let n = s.run(&mut buf).unwrap();
        assert!(n <= buf.len(), "codec wrote past the buffer it was given");
        out.extend_from_slice(&buf[..n]);
    }
    out
}

fn fill_sample(s: &mut Serializer) {
    s.push_u8(0x5A).unwrap();
    s.push_u16(0xBEEF).unwrap();
    s.push_u32(0xDEAD_BEEF).unwrap();
    s.push_u64(0x0123_4567_89AB_CDEF).unwrap();
    s.push_bool(true).unwrap();
    s.push_cross(300_000).unwrap();
    s.push_str("chunking must not matter").unwrap();
    s.push(&Bits(vec![true, true, false, true, false, false, true, true, true]))
        .unwrap();
    s.push(&vec![10u32, 20, 30, 40]).unwrap();
}

#[test]
fn serialization_is_chunking_independent() {
    let mut reference = Serializer::new();
    fill_sample(&mut reference);
    let whole = serialize_chunked(&mut reference, &[1 << 16]);

    for chunking in [
        vec![1],
        vec![2],
        vec![3, 1],
        vec![7],
        vec![1, 9, 2],
        vec![13, 5, 1, 1],
    ] {
        let mut s = Serializer::new();
        fill_sample(&mut s);
        assert_eq!(
            serialize_chunked(&mut s, &chunking),
            whole,
            "chunk sizes {chunking:?} changed the wire bytes"
        );
    }
}

#[test]
fn deserialization_is_chunking_independent() {
    let mut s = Serializer::new();
    fill_sample(&mut s);
    let wire = serialize_chunked(&mut s, &[1 << 16]);

    for step in [1usize, 2, 3, 5, 11, wire.len()] {
        let mut d = Deserializer::new();
        d.push(Kind::U8).unwrap();
        d.push(Kind::U16).unwrap();
        d.push(Kind::U32).unwrap();
        d.push(Kind::U64).unwrap();
        d.push(Kind::Bool).unwrap();
        d.push(Kind::Cross).unwrap();
        d.push(String::kind()).unwrap();
        d.push(Bits::kind()).unwrap();
        d.push(Vec::<u32>::kind()).unwrap();

        let mut consumed = 0;
        for chunk in wire.chunks(step) {
            consumed += d.run(chunk).unwrap();
        }
        assert_eq!(consumed, wire.len());
        assert!(d.is_empty(), "step {step} left work pending");

        assert_eq!(d.take(), Some(Value::U8(0x5A)));
        assert_eq!(d.take(), Some(Value::U16(0xBEEF)));
        assert_eq!(d.take(), Some(Value::U32(0xDEAD_BEEF)));
        assert_eq!(d.take(), Some(Value::U64(0x0123_4567_89AB_CDEF)));
        assert_eq!(d.take(), Some(Value::Bool(true)));
        assert_eq!(d.take(), Some(Value::Cross(300_000)));
        let text = String::from_value(d.take().unwrap()).unwrap();
        assert_eq!(text, "chunking must not matter");
        let bits = Bits::from_value(d.take().unwrap()).unwrap();
        assert_eq!(
            bits,
            Bits(vec![true, true, false, true, false, false, true, true, true])
        );
        let seq = Vec::<u32>::from_value(d.take().unwrap()).unwrap();
        assert_eq!(seq, vec![10, 20, 30, 40]);
    }
}

fn round_trip<T: muxrpc_codec::Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
    let mut s = Serializer::new();
    s.push(&value).unwrap();
    let wire = serialize_chunked(&mut s, &[3, 1, 8]);

    let mut d = Deserializer::new();
    d.push(T::kind()).unwrap();
    for chunk in wire.chunks(4) {
        d.run(chunk).unwrap();
    }
    assert!(d.is_empty());
    let decoded = T::from_value(d.take().unwrap()).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn primitive_round_trips() {
    round_trip(0u8);
    round_trip(u8::MAX);
    round_trip(0x1234u16);
    round_trip(u32::MAX);
    round_trip(u64::MAX);
    round_trip(-1i32);
    round_trip(i64::MIN);
    round_trip(true);
    round_trip(false);
}

#[test]
fn string_and_bitset_round_trips() {
    round_trip(String::new());
    round_trip("short".to_string());
    round_trip("s".repeat(10_000));
    round_trip(Bits(Vec::new()));
    round_trip(Bits((0..4096).map(|i| i % 3 == 0).collect()));
}

#[test]
fn large_map_round_trip() {
    let map: BTreeMap<u32, String> = (0..10_000u32).map(|i| (i, format!("value-{i}"))).collect();
    let mut s = Serializer::new();
    s.push(&map).unwrap();
    let wire = serialize_chunked(&mut s, &[4096]);

    let mut d = Deserializer::new();
    d.push(BTreeMap::<u32, String>::kind()).unwrap();
    for chunk in wire.chunks(4096) {
        d.run(chunk).unwrap();
    }
    assert!(d.is_empty());
    let decoded = BTreeMap::<u32, String>::from_value(d.take().unwrap()).unwrap();
    assert_eq!(decoded, map);
}

#[test]
fn cross_integer_size_law() {
    use muxrpc_codec::cross;

    assert_eq!(cross::size(0), 1);
    for v in [1u64, 5, 0xFF, 0x100, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, u64::MAX] {
        let bits = 64 - v.leading_zeros() as usize;
        let expected = 1 + bits.div_ceil(8);
        assert_eq!(cross::size(v), expected, "size law failed for {v:#x}");
        let mut buf = [0u8; cross::MAX_SIZE];
        assert_eq!(cross::store(&mut buf, v), expected);
    }
}

#[test]
fn codec_never_reads_past_len() {
    // A declared string length far beyond the supplied bytes must suspend,
    // not read ahead.
    let mut s = Serializer::new();
    s.push_str(&"x".repeat(100)).unwrap();
    let wire = serialize_chunked(&mut s, &[256]);

    let mut d = Deserializer::new();
    d.push(String::kind()).unwrap();
    let n = d.run(&wire[..10]).unwrap();
    assert_eq!(n, 10);
    assert!(!d.is_empty());
    let n = d.run(&wire[10..]).unwrap();
    assert_eq!(n, wire.len() - 10);
    assert!(d.is_empty());
}

#[test]
fn stream_round_trip_with_tiny_buffers() {
    let payload: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
    let mut s = Serializer::new();
    s.push_stream(Box::new(Cursor::new(payload.clone())), None, None)
        .unwrap();
    // Small destination buffers force the stream into many short chunks.
    let wire = serialize_chunked(&mut s, &[32, 17, 64]);

    let mut d = Deserializer::new();
    let sink = Cursor::new(Vec::new());
    d.push_stream(Box::new(sink), None).unwrap();
    for chunk in wire.chunks(7) {
        d.run(chunk).unwrap();
    }
    assert!(d.is_empty());
    assert_eq!(d.take(), Some(Value::Stream(1000)));
}

#[test]
fn reused_codec_after_failure_requires_clear() {
    let mut s = Serializer::new();
    s.set_container_limit(1);
    assert_eq!(s.push(&vec![1u8, 2]), Err(CodecError::ContainerLimit));
    assert_eq!(s.push_u8(9), Err(CodecError::Reinit));
    s.clear();
    s.push_u8(9).unwrap();
    let wire = serialize_chunked(&mut s, &[8]);
    assert_eq!(wire, vec![9]);
}
