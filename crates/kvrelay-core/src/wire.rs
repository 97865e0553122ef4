//! Tag-wire codec — the generic field-number + wire-type record stream that
//! every datapath message is built from.
//!
//! A record is a varint tag `(field_number << 3) | wire_type` followed by a
//! payload whose shape depends on the wire type. Unknown field numbers must be
//! skippable without understanding their meaning — that is what makes the
//! format forward-compatible, and it is the one invariant every message codec
//! built on top of this module depends on.

use thiserror::Error;

use crate::io::{ByteReader, ByteWriter, IoError};

/// Errors arising while decoding a tag-wire record stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("unknown wire type: {0}")]
    UnknownWireType(u64),

    #[error("field {field} has wire type {actual:?}, expected {expected:?}")]
    WireTypeMismatch {
        field: u32,
        expected: WireType,
        actual: WireType,
    },
}

/// The wire types the tag-wire format recognizes.
///
/// `SGroup`/`EGroup` are accepted on decode (for forward compatibility with
/// senders that still emit them) but carry no payload of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    I64 = 1,
    Len = 2,
    SGroup = 3,
    EGroup = 4,
    I32 = 5,
}

impl WireType {
    fn from_u64(value: u64) -> Result<Self, WireError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::SGroup),
            4 => Ok(WireType::EGroup),
            5 => Ok(WireType::I32),
            other => Err(WireError::UnknownWireType(other)),
        }
    }
}

/// A decoded tag: which field, and how its payload is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub field: u32,
    pub wire_type: WireType,
}

impl Tag {
    fn decode(raw: u64) -> Result<Self, WireError> {
        let wire_type = WireType::from_u64(raw & 0x7)?;
        let field = (raw >> 3) as u32;
        Ok(Tag { field, wire_type })
    }

    fn encoded(&self) -> u64 {
        ((self.field as u64) << 3) | (self.wire_type as u64)
    }
}

/// The payload carried by one decoded record, already sized per its wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Len(&'a [u8]),
    /// `SGROUP`/`EGROUP` carry no data — present only so the reader can skip them.
    Group,
}

/// One decoded `(tag, value)` pair from the record stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    pub tag: Tag,
    pub value: RecordValue<'a>,
}

/// Reads the next record from `input`, or `Ok(None)` at a clean end of stream.
pub fn read_record<'a>(input: &mut ByteReader<'a>) -> Result<Option<Record<'a>>, WireError> {
    if input.is_empty() {
        return Ok(None);
    }
    let raw_tag = input.read_var_u64()?;
    let tag = Tag::decode(raw_tag)?;
    let value = match tag.wire_type {
        WireType::Varint => RecordValue::Varint(input.read_var_u64()?),
        WireType::I64 => RecordValue::Fixed64(input.read_u64_le()?),
        WireType::I32 => RecordValue::Fixed32(input.read_u32_le()?),
        WireType::Len => {
            let len = input.read_var_u64()? as usize;
            RecordValue::Len(input.read_full(len)?)
        }
        WireType::SGroup | WireType::EGroup => RecordValue::Group,
    };
    Ok(Some(Record { tag, value }))
}

/// Asserts a record's wire type matches what the caller's field schema expects.
/// Message codecs call this right after `read_record` for a field they know.
pub fn expect_wire_type(record: &Record<'_>, expected: WireType) -> Result<(), WireError> {
    if record.tag.wire_type == expected {
        Ok(())
    } else {
        Err(WireError::WireTypeMismatch {
            field: record.tag.field,
            expected,
            actual: record.tag.wire_type,
        })
    }
}

// ── Encoding helpers ──────────────────────────────────────────────────────────

pub fn write_varint_field(out: &mut ByteWriter, field: u32, value: u64) {
    if value == 0 {
        return; // defaults are omitted
    }
    write_tag(out, field, WireType::Varint);
    out.write_var_u64(value);
}

pub fn write_bool_field(out: &mut ByteWriter, field: u32, value: bool) {
    if !value {
        return;
    }
    write_tag(out, field, WireType::Varint);
    out.write_var_u64(1);
}

pub fn write_bytes_field(out: &mut ByteWriter, field: u32, value: &[u8]) {
    if value.is_empty() {
        return;
    }
    write_tag(out, field, WireType::Len);
    out.write_var_u64(value.len() as u64);
    out.write_bytes(value);
}

pub fn write_message_field(out: &mut ByteWriter, field: u32, encoded: &[u8]) {
    write_bytes_field(out, field, encoded);
}

/// Packed repeated `uint32`, used by `Enqueue.backoff_schedule` and
/// `AtomicWriteOutput.failed_checks`. Omitted entirely when `values` is empty.
pub fn write_packed_u32_field(out: &mut ByteWriter, field: u32, values: &[u32]) {
    if values.is_empty() {
        return;
    }
    let mut payload = ByteWriter::new();
    for &v in values {
        payload.write_var_u64(v as u64);
    }
    write_bytes_field(out, field, &payload.into_vec());
}

fn write_tag(out: &mut ByteWriter, field: u32, wire_type: WireType) {
    out.write_var_u64(Tag { field, wire_type }.encoded());
}

/// Decode a packed (or singly-repeated-varint) `uint32` payload. Accepts both:
/// the `LEN`-wrapped packed form, and bare varints sent one record per value
/// (some encoders do not pack short repeated fields).
pub fn read_packed_u32(payload: &[u8]) -> Result<Vec<u32>, WireError> {
    let mut reader = ByteReader::new(payload);
    let mut values = Vec::new();
    while !reader.is_empty() {
        values.push(reader.read_var_u64()? as u32);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        let tag = Tag {
            field: 5,
            wire_type: WireType::Len,
        };
        assert_eq!(Tag::decode(tag.encoded()).unwrap(), tag);
    }

    #[test]
    fn unknown_wire_type_is_decode_error() {
        // field 1, wire type 6 (unassigned)
        let raw = (1u64 << 3) | 6;
        assert_eq!(
            Tag::decode(raw).unwrap_err(),
            WireError::UnknownWireType(6)
        );
    }

    #[test]
    fn varint_field_roundtrip() {
        let mut w = ByteWriter::new();
        write_varint_field(&mut w, 3, 42);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        let record = read_record(&mut r).unwrap().unwrap();
        assert_eq!(record.tag.field, 3);
        assert_eq!(record.value, RecordValue::Varint(42));
        assert!(read_record(&mut r).unwrap().is_none());
    }

    #[test]
    fn default_value_fields_are_omitted() {
        let mut w = ByteWriter::new();
        write_varint_field(&mut w, 1, 0);
        write_bool_field(&mut w, 2, false);
        write_bytes_field(&mut w, 3, &[]);
        write_packed_u32_field(&mut w, 4, &[]);
        assert!(w.is_empty());
    }

    #[test]
    fn len_field_roundtrip() {
        let mut w = ByteWriter::new();
        write_bytes_field(&mut w, 7, b"hello");
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        let record = read_record(&mut r).unwrap().unwrap();
        assert_eq!(record.value, RecordValue::Len(b"hello"));
    }

    #[test]
    fn unknown_fields_are_skippable() {
        // A record stream with an unrecognized field number should still be
        // fully consumable by generic read_record — the caller decides what
        // to do with fields it doesn't recognize, but the reader never gets
        // stuck on them.
        let mut w = ByteWriter::new();
        write_varint_field(&mut w, 99, 7);
        write_bytes_field(&mut w, 100, b"ignored");
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert!(read_record(&mut r).unwrap().is_some());
        assert!(read_record(&mut r).unwrap().is_some());
        assert!(read_record(&mut r).unwrap().is_none());
    }

    #[test]
    fn packed_u32_roundtrip() {
        let mut w = ByteWriter::new();
        write_packed_u32_field(&mut w, 4, &[1, 1000, 5000]);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        let record = read_record(&mut r).unwrap().unwrap();
        match record.value {
            RecordValue::Len(payload) => {
                assert_eq!(read_packed_u32(payload).unwrap(), vec![1, 1000, 5000]);
            }
            _ => panic!("expected Len"),
        }
    }

    #[test]
    fn fixed32_and_fixed64_roundtrip() {
        let mut w = ByteWriter::new();
        write_tag(&mut w, 1, WireType::I32);
        w.write_u32_le(0xdead_beef);
        write_tag(&mut w, 2, WireType::I64);
        w.write_u64_le(0x1122_3344_5566_7788);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        let rec1 = read_record(&mut r).unwrap().unwrap();
        assert_eq!(rec1.value, RecordValue::Fixed32(0xdead_beef));
        let rec2 = read_record(&mut r).unwrap().unwrap();
        assert_eq!(rec2.value, RecordValue::Fixed64(0x1122_3344_5566_7788));
    }

    #[test]
    fn group_wire_types_are_payload_less() {
        let mut w = ByteWriter::new();
        write_tag(&mut w, 1, WireType::SGroup);
        write_tag(&mut w, 1, WireType::EGroup);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(read_record(&mut r).unwrap().unwrap().value, RecordValue::Group);
        assert_eq!(read_record(&mut r).unwrap().unwrap().value, RecordValue::Group);
    }

    #[test]
    fn expect_wire_type_mismatch_errors() {
        let mut w = ByteWriter::new();
        write_varint_field(&mut w, 1, 5);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        let record = read_record(&mut r).unwrap().unwrap();
        assert!(expect_wire_type(&record, WireType::Len).is_err());
        assert!(expect_wire_type(&record, WireType::Varint).is_ok());
    }
}
