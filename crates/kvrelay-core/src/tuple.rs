//! Order-preserving tuple key codec.
//!
//! Each [`KeyPart`] is written as a one-byte type tag followed by a
//! self-delimited body. Concatenating the encodings of a [`Key`]'s parts
//! produces a byte string whose `memcmp` order equals the type-aware ordering
//! of the parts: bytes < string < integer < float < false < true, and within a
//! type, the natural ordering of that type.
//!
//! This is the order-critical codec in the relay — every other codec can be
//! replaced without breaking clients; this one cannot, because clients expect
//! range scans over these keys to return entries in the order the managed
//! service defines.

use num_bigint::{BigInt, Sign};
use thiserror::Error;

use crate::io::{ByteReader, ByteWriter};

/// Errors arising while encoding or decoding a tuple key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyCodecError {
    #[error("unexpected end of key encoding")]
    UnexpectedEof,

    #[error("unknown type tag: 0x{0:02x}")]
    UnknownTag(u8),

    #[error("integer magnitude of {0} bytes exceeds the 255-byte limit")]
    IntegerTooLarge(usize),

    #[error("byte run is not null-terminated")]
    UnterminatedByteRun,
}

/// One part of a [`Key`]. Ordering between variants follows the fixed type
/// precedence documented on the module; ordering within a variant follows
/// that type's natural order (see [`encode_part`] for the exact byte layout).
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    Bytes(Vec<u8>),
    String(String),
    Int(BigInt),
    Float(f64),
    Bool(bool),
}

/// An ordered sequence of key parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Key(pub Vec<KeyPart>);

impl Key {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }
}

/// The selector mode of a [`RangeKey`] — only meaningful at range boundaries,
/// never inside a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    Exact,
    /// The smallest key strictly greater than every key with this prefix of parts.
    After,
    /// The complementary lower-bound marker, used only as a range `end`.
    Before,
}

/// A key plus a range-selector mode, used only at range-read boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeKey {
    pub key: Key,
    pub mode: RangeMode,
}

// ── Type tags ─────────────────────────────────────────────────────────────────

const TAG_BYTES: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_NEG_INT_EXT: u8 = 0x0B;
const TAG_INT_ZERO: u8 = 0x14;
const TAG_POS_INT_EXT: u8 = 0x1D;
const TAG_FLOAT: u8 = 0x21;
const TAG_FALSE: u8 = 0x26;
const TAG_TRUE: u8 = 0x27;

const MAX_INT_BYTES: usize = 255;

// ── Key-level encode/decode ──────────────────────────────────────────────────

/// Encode a full key. The result is the concatenation of each part's encoding.
pub fn encode_key(key: &Key) -> Result<Vec<u8>, KeyCodecError> {
    let mut out = ByteWriter::new();
    for part in &key.0 {
        encode_part(&mut out, part)?;
    }
    Ok(out.into_vec())
}

/// Decode a full key from an exact, non-range-extended encoding.
pub fn decode_key(bytes: &[u8]) -> Result<Key, KeyCodecError> {
    let mut reader = ByteReader::new(bytes);
    let mut parts = Vec::new();
    while !reader.is_empty() {
        parts.push(decode_part(&mut reader)?);
    }
    Ok(Key(parts))
}

/// Decode a [`RangeKey`], honoring the trailing `0x00`/`0xFF` range-endpoint
/// extension. Any bytes following the marker are
/// ignored, since the marker always terminates the encoding.
pub fn decode_range_key(bytes: &[u8]) -> Result<RangeKey, KeyCodecError> {
    let mut reader = ByteReader::new(bytes);
    let mut parts = Vec::new();
    loop {
        match reader.peek_u8() {
            None => {
                return Ok(RangeKey {
                    key: Key(parts),
                    mode: RangeMode::Exact,
                })
            }
            Some(0x00) => {
                reader.read_u8().expect("peeked");
                return Ok(RangeKey {
                    key: Key(parts),
                    mode: RangeMode::After,
                });
            }
            Some(0xFF) => {
                reader.read_u8().expect("peeked");
                return Ok(RangeKey {
                    key: Key(parts),
                    mode: RangeMode::Before,
                });
            }
            Some(_) => parts.push(decode_part(&mut reader)?),
        }
    }
}

// ── Part-level encode ─────────────────────────────────────────────────────────

fn encode_part(out: &mut ByteWriter, part: &KeyPart) -> Result<(), KeyCodecError> {
    match part {
        KeyPart::Bytes(bytes) => {
            out.write_u8(TAG_BYTES);
            write_null_escaped(out, bytes);
        }
        KeyPart::String(s) => {
            out.write_u8(TAG_STRING);
            write_null_escaped(out, s.as_bytes());
        }
        KeyPart::Int(n) => encode_int(out, n)?,
        KeyPart::Float(f) => {
            out.write_u8(TAG_FLOAT);
            out.write_u64_be(canonicalize_float_bits(*f));
        }
        KeyPart::Bool(false) => out.write_u8(TAG_FALSE),
        KeyPart::Bool(true) => out.write_u8(TAG_TRUE),
    }
    Ok(())
}

fn encode_int(out: &mut ByteWriter, value: &BigInt) -> Result<(), KeyCodecError> {
    if value.sign() == Sign::NoSign {
        out.write_u8(TAG_INT_ZERO);
        return Ok(());
    }

    let magnitude_be = value.magnitude().to_bytes_be();
    let n = magnitude_be.len();
    if n > MAX_INT_BYTES {
        return Err(KeyCodecError::IntegerTooLarge(n));
    }

    if value.sign() == Sign::Plus {
        if n <= 8 {
            out.write_u8(TAG_INT_ZERO + n as u8);
            out.write_bytes(&magnitude_be);
        } else {
            out.write_u8(TAG_POS_INT_EXT);
            out.write_u8(n as u8);
            out.write_bytes(&magnitude_be);
        }
    } else {
        let inverted: Vec<u8> = magnitude_be.iter().map(|b| !b).collect();
        if n <= 8 {
            out.write_u8(TAG_INT_ZERO - n as u8);
            out.write_bytes(&inverted);
        } else {
            out.write_u8(TAG_NEG_INT_EXT);
            out.write_u8(!(n as u8));
            out.write_bytes(&inverted);
        }
    }
    Ok(())
}

/// IEEE-754 bit pattern, NaN-canonicalized and sign-flipped/inverted so the
/// resulting `u64` sorts in the same order as the numeric value.
fn canonicalize_float_bits(value: f64) -> u64 {
    let bits = value.to_bits();
    let sign_bit = bits >> 63;
    let canonical = if value.is_nan() {
        (sign_bit << 63) | 0x7ff8_0000_0000_0000
    } else {
        bits
    };
    let mask = if (canonical >> 63) & 1 == 1 {
        u64::MAX
    } else {
        0x8000_0000_0000_0000
    };
    canonical ^ mask
}

/// Inverse of [`canonicalize_float_bits`]. Not exact for NaN input (recovers
/// the canonical quiet NaN with the encoded sign, not the original payload),
/// which matches the codec's documented canonicalization.
fn decanonicalize_float_bits(encoded: u64) -> f64 {
    // The mask depends on the *original* sign bit, which after encoding lives
    // in bit 63 of `encoded` for the sign=0 case (mask only flipped bit 63),
    // and is inverted for the sign=1 case (mask flipped everything). Bit 63
    // of `encoded` is 1 for every non-negative source value and 0 for every
    // negative source value, in both cases — so it tells us which mask to undo.
    let mask = if (encoded >> 63) & 1 == 1 {
        0x8000_0000_0000_0000
    } else {
        u64::MAX
    };
    f64::from_bits(encoded ^ mask)
}

/// Null-escaped byte run: every `0x00` byte is followed by `0xFF`; the run is
/// terminated by a single `0x00` not followed by `0xFF`.
fn write_null_escaped(out: &mut ByteWriter, bytes: &[u8]) {
    for &b in bytes {
        out.write_u8(b);
        if b == 0 {
            out.write_u8(0xFF);
        }
    }
    out.write_u8(0x00);
}

/// Reads one null-escaped byte run, consuming through its terminator.
fn read_null_escaped(reader: &mut ByteReader<'_>) -> Result<Vec<u8>, KeyCodecError> {
    let mut result = Vec::new();
    loop {
        let b = reader
            .read_u8()
            .map_err(|_| KeyCodecError::UnterminatedByteRun)?;
        if b != 0x00 {
            result.push(b);
            continue;
        }
        // Saw a 0x00 — peek (without consuming) to decide escape vs terminator.
        if reader.peek_u8() == Some(0xFF) {
            reader.read_u8().expect("peeked");
            result.push(0x00);
        } else {
            return Ok(result);
        }
    }
}

// ── Part-level decode ─────────────────────────────────────────────────────────

/// Decodes one key part. Callers that need to recognize the range-endpoint
/// markers (`0x00`/`0xFF`) must check [`ByteReader::peek_u8`] before calling
/// this — it always treats those tags as ordinary (here, unknown) tags.
fn decode_part(reader: &mut ByteReader<'_>) -> Result<KeyPart, KeyCodecError> {
    let tag = reader.read_u8().map_err(|_| KeyCodecError::UnexpectedEof)?;

    let part = match tag {
        TAG_BYTES => KeyPart::Bytes(read_null_escaped(reader)?),
        TAG_STRING => {
            let bytes = read_null_escaped(reader)?;
            let s = String::from_utf8(bytes).map_err(|_| KeyCodecError::UnknownTag(TAG_STRING))?;
            KeyPart::String(s)
        }
        TAG_INT_ZERO => KeyPart::Int(BigInt::from(0)),
        TAG_NEG_INT_EXT => {
            let inv_n = reader.read_u8().map_err(|_| KeyCodecError::UnexpectedEof)?;
            let n = !inv_n as usize;
            let magnitude = read_magnitude(reader, n)?;
            let inverted: Vec<u8> = magnitude.iter().map(|b| !b).collect();
            KeyPart::Int(-BigInt::from_bytes_be(Sign::Plus, &inverted))
        }
        TAG_POS_INT_EXT => {
            let n = reader.read_u8().map_err(|_| KeyCodecError::UnexpectedEof)? as usize;
            let magnitude = read_magnitude(reader, n)?;
            KeyPart::Int(BigInt::from_bytes_be(Sign::Plus, &magnitude))
        }
        TAG_FLOAT => {
            let bits = reader
                .read_u64_be()
                .map_err(|_| KeyCodecError::UnexpectedEof)?;
            KeyPart::Float(decanonicalize_float_bits(bits))
        }
        TAG_FALSE => KeyPart::Bool(false),
        TAG_TRUE => KeyPart::Bool(true),
        other if (TAG_NEG_INT_EXT + 1..TAG_INT_ZERO).contains(&other) => {
            let n = (TAG_INT_ZERO - other) as usize;
            let inverted = read_magnitude(reader, n)?;
            let magnitude: Vec<u8> = inverted.iter().map(|b| !b).collect();
            KeyPart::Int(-BigInt::from_bytes_be(Sign::Plus, &magnitude))
        }
        other if (TAG_INT_ZERO + 1..TAG_POS_INT_EXT).contains(&other) => {
            let n = (other - TAG_INT_ZERO) as usize;
            let magnitude = read_magnitude(reader, n)?;
            KeyPart::Int(BigInt::from_bytes_be(Sign::Plus, &magnitude))
        }
        other => return Err(KeyCodecError::UnknownTag(other)),
    };
    Ok(part)
}

fn read_magnitude(reader: &mut ByteReader<'_>, n: usize) -> Result<Vec<u8>, KeyCodecError> {
    reader
        .read_full(n)
        .map(|s| s.to_vec())
        .map_err(|_| KeyCodecError::UnexpectedEof)
}
