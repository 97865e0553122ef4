//! Datapath message codecs. Each message is a struct with a
//! `decode`/`encode` pair; nested messages are `LEN`-wrapped and decoded
//! recursively from the record's payload slice.

use thiserror::Error;

use kvrelay_core::io::{ByteReader, ByteWriter};
use kvrelay_core::wire::{
    read_packed_u32, read_record, write_bool_field, write_bytes_field, write_message_field,
    write_packed_u32_field, write_varint_field, Record, RecordValue, WireError, WireType,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("field {field} has unrecognized enum value {value}")]
    UnrecognizedEnum { field: u32, value: i64 },
}

fn decode_varint(record: &Record<'_>) -> Result<u64, ProtoError> {
    match record.value.clone() {
        RecordValue::Varint(v) => Ok(v),
        other => Err(ProtoError::Wire(WireError::WireTypeMismatch {
            field: record.tag.field,
            expected: WireType::Varint,
            actual: wire_type_of(&other),
        })),
    }
}

fn decode_len<'a>(record: &Record<'a>) -> Result<&'a [u8], ProtoError> {
    match record.value.clone() {
        RecordValue::Len(bytes) => Ok(bytes),
        other => Err(ProtoError::Wire(WireError::WireTypeMismatch {
            field: record.tag.field,
            expected: WireType::Len,
            actual: wire_type_of(&other),
        })),
    }
}

fn wire_type_of(value: &RecordValue<'_>) -> WireType {
    match value {
        RecordValue::Varint(_) => WireType::Varint,
        RecordValue::Fixed64(_) => WireType::I64,
        RecordValue::Fixed32(_) => WireType::I32,
        RecordValue::Len(_) => WireType::Len,
        RecordValue::Group => WireType::SGroup,
    }
}

// ── SnapshotRead / ReadRange ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
    pub limit: u32,
    pub reverse: bool,
}

impl ReadRange {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bytes_field(out, 1, &self.start);
        write_bytes_field(out, 2, &self.end);
        write_varint_field(out, 3, self.limit as u64);
        write_bool_field(out, 4, self.reverse);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = ReadRange::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.start = decode_len(&record)?.to_vec(),
                2 => out.end = decode_len(&record)?.to_vec(),
                3 => out.limit = decode_varint(&record)? as u32,
                4 => out.reverse = decode_varint(&record)? != 0,
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRead {
    pub ranges: Vec<ReadRange>,
}

impl SnapshotRead {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = ByteWriter::new();
        for range in &self.ranges {
            let mut nested = ByteWriter::new();
            range.encode(&mut nested);
            write_message_field(&mut out, 1, &nested.into_vec());
        }
        out.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut ranges = Vec::new();
        while let Some(record) = read_record(&mut reader)? {
            if record.tag.field == 1 {
                ranges.push(ReadRange::decode(decode_len(&record)?)?);
            }
        }
        Ok(SnapshotRead { ranges })
    }
}

// ── KvEntry / ReadRangeOutput / SnapshotReadOutput ───────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub encoding: u32,
    pub versionstamp: Vec<u8>,
}

impl KvEntry {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bytes_field(out, 1, &self.key);
        write_bytes_field(out, 2, &self.value);
        write_varint_field(out, 3, self.encoding as u64);
        write_bytes_field(out, 4, &self.versionstamp);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = KvEntry::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.key = decode_len(&record)?.to_vec(),
                2 => out.value = decode_len(&record)?.to_vec(),
                3 => out.encoding = decode_varint(&record)? as u32,
                4 => out.versionstamp = decode_len(&record)?.to_vec(),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRangeOutput {
    pub values: Vec<KvEntry>,
}

impl ReadRangeOutput {
    pub fn encode(&self, out: &mut ByteWriter) {
        for entry in &self.values {
            let mut nested = ByteWriter::new();
            entry.encode(&mut nested);
            write_message_field(out, 1, &nested.into_vec());
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut values = Vec::new();
        while let Some(record) = read_record(&mut reader)? {
            if record.tag.field == 1 {
                values.push(KvEntry::decode(decode_len(&record)?)?);
            }
        }
        Ok(ReadRangeOutput { values })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotReadStatus {
    #[default]
    Unspecified = 0,
    Success = 1,
    ReadDisabled = 2,
}

impl SnapshotReadStatus {
    fn from_i64(field: u32, value: i64) -> Result<Self, ProtoError> {
        match value {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::Success),
            2 => Ok(Self::ReadDisabled),
            other => Err(ProtoError::UnrecognizedEnum { field, value: other }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReadOutput {
    pub ranges: Vec<ReadRangeOutput>,
    pub read_disabled: bool,
    pub read_is_strongly_consistent: bool,
    pub status: SnapshotReadStatus,
}

impl SnapshotReadOutput {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = ByteWriter::new();
        for range in &self.ranges {
            let mut nested = ByteWriter::new();
            range.encode(&mut nested);
            write_message_field(&mut out, 1, &nested.into_vec());
        }
        write_bool_field(&mut out, 2, self.read_disabled);
        write_bool_field(&mut out, 4, self.read_is_strongly_consistent);
        write_varint_field(&mut out, 8, self.status as u64);
        out.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = SnapshotReadOutput::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.ranges.push(ReadRangeOutput::decode(decode_len(&record)?)?),
                2 => out.read_disabled = decode_varint(&record)? != 0,
                4 => out.read_is_strongly_consistent = decode_varint(&record)? != 0,
                8 => out.status = SnapshotReadStatus::from_i64(8, decode_varint(&record)? as i64)?,
                _ => {}
            }
        }
        Ok(out)
    }
}

// ── AtomicWrite / Check / Mutation / KvValue / Enqueue ───────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Check {
    pub key: Vec<u8>,
    pub versionstamp: Vec<u8>,
}

impl Check {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bytes_field(out, 1, &self.key);
        write_bytes_field(out, 2, &self.versionstamp);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = Check::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.key = decode_len(&record)?.to_vec(),
                2 => out.versionstamp = decode_len(&record)?.to_vec(),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvValue {
    pub data: Vec<u8>,
    pub encoding: u32,
}

impl KvValue {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bytes_field(out, 1, &self.data);
        write_varint_field(out, 2, self.encoding as u64);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = KvValue::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.data = decode_len(&record)?.to_vec(),
                2 => out.encoding = decode_varint(&record)? as u32,
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationType {
    #[default]
    Unspecified = 0,
    Set = 1,
    Delete = 2,
    Sum = 3,
    Max = 4,
    Min = 5,
    SetSuffixVersionstampedKey = 9,
}

impl MutationType {
    fn from_i64(field: u32, value: i64) -> Result<Self, ProtoError> {
        match value {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::Set),
            2 => Ok(Self::Delete),
            3 => Ok(Self::Sum),
            4 => Ok(Self::Max),
            5 => Ok(Self::Min),
            9 => Ok(Self::SetSuffixVersionstampedKey),
            other => Err(ProtoError::UnrecognizedEnum { field, value: other }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutation {
    pub key: Vec<u8>,
    pub value: Option<KvValue>,
    pub mutation_type: MutationType,
    pub expire_at_ms: i64,
}

impl Mutation {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bytes_field(out, 1, &self.key);
        if let Some(value) = &self.value {
            let mut nested = ByteWriter::new();
            value.encode(&mut nested);
            write_message_field(out, 2, &nested.into_vec());
        }
        write_varint_field(out, 3, self.mutation_type as u64);
        write_varint_field(out, 4, self.expire_at_ms as u64);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = Mutation::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.key = decode_len(&record)?.to_vec(),
                2 => out.value = Some(KvValue::decode(decode_len(&record)?)?),
                3 => out.mutation_type = MutationType::from_i64(3, decode_varint(&record)? as i64)?,
                4 => out.expire_at_ms = decode_varint(&record)? as i64,
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enqueue {
    pub payload: Vec<u8>,
    pub deadline_ms: i64,
    pub keys_if_undelivered: Vec<Vec<u8>>,
    pub backoff_schedule: Vec<u32>,
}

impl Enqueue {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bytes_field(out, 1, &self.payload);
        write_varint_field(out, 2, self.deadline_ms as u64);
        for key in &self.keys_if_undelivered {
            write_bytes_field(out, 3, key);
        }
        write_packed_u32_field(out, 4, &self.backoff_schedule);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = Enqueue::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.payload = decode_len(&record)?.to_vec(),
                2 => out.deadline_ms = decode_varint(&record)? as i64,
                3 => out.keys_if_undelivered.push(decode_len(&record)?.to_vec()),
                4 => out.backoff_schedule.extend(read_packed_u32(decode_len(&record)?)?),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicWrite {
    pub checks: Vec<Check>,
    pub mutations: Vec<Mutation>,
    pub enqueues: Vec<Enqueue>,
}

impl AtomicWrite {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = ByteWriter::new();
        for check in &self.checks {
            let mut nested = ByteWriter::new();
            check.encode(&mut nested);
            write_message_field(&mut out, 1, &nested.into_vec());
        }
        for mutation in &self.mutations {
            let mut nested = ByteWriter::new();
            mutation.encode(&mut nested);
            write_message_field(&mut out, 2, &nested.into_vec());
        }
        for enqueue in &self.enqueues {
            let mut nested = ByteWriter::new();
            enqueue.encode(&mut nested);
            write_message_field(&mut out, 3, &nested.into_vec());
        }
        out.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = AtomicWrite::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.checks.push(Check::decode(decode_len(&record)?)?),
                2 => out.mutations.push(Mutation::decode(decode_len(&record)?)?),
                3 => out.enqueues.push(Enqueue::decode(decode_len(&record)?)?),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtomicWriteStatus {
    #[default]
    Unspecified = 0,
    Success = 1,
    CheckFailure = 2,
    WriteDisabled = 5,
}

impl AtomicWriteStatus {
    fn from_i64(field: u32, value: i64) -> Result<Self, ProtoError> {
        match value {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::Success),
            2 => Ok(Self::CheckFailure),
            5 => Ok(Self::WriteDisabled),
            other => Err(ProtoError::UnrecognizedEnum { field, value: other }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicWriteOutput {
    pub status: AtomicWriteStatus,
    pub versionstamp: Vec<u8>,
    pub failed_checks: Vec<u32>,
}

impl AtomicWriteOutput {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = ByteWriter::new();
        write_varint_field(&mut out, 1, self.status as u64);
        write_bytes_field(&mut out, 2, &self.versionstamp);
        write_packed_u32_field(&mut out, 4, &self.failed_checks);
        out.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = AtomicWriteOutput::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.status = AtomicWriteStatus::from_i64(1, decode_varint(&record)? as i64)?,
                2 => out.versionstamp = decode_len(&record)?.to_vec(),
                4 => out.failed_checks = read_packed_u32(decode_len(&record)?)?,
                _ => {}
            }
        }
        Ok(out)
    }
}

// ── Watch / WatchKey / WatchOutput / WatchKeyOutput ──────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchKey {
    pub key: Vec<u8>,
}

impl WatchKey {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bytes_field(out, 1, &self.key);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = WatchKey::default();
        while let Some(record) = read_record(&mut reader)? {
            if record.tag.field == 1 {
                out.key = decode_len(&record)?.to_vec();
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watch {
    pub keys: Vec<WatchKey>,
}

impl Watch {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = ByteWriter::new();
        for key in &self.keys {
            let mut nested = ByteWriter::new();
            key.encode(&mut nested);
            write_message_field(&mut out, 1, &nested.into_vec());
        }
        out.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut keys = Vec::new();
        while let Some(record) = read_record(&mut reader)? {
            if record.tag.field == 1 {
                keys.push(WatchKey::decode(decode_len(&record)?)?);
            }
        }
        Ok(Watch { keys })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchKeyOutput {
    pub changed: bool,
    pub entry_if_changed: Option<KvEntry>,
}

impl WatchKeyOutput {
    pub fn encode(&self, out: &mut ByteWriter) {
        write_bool_field(out, 1, self.changed);
        if let Some(entry) = &self.entry_if_changed {
            let mut nested = ByteWriter::new();
            entry.encode(&mut nested);
            write_message_field(out, 2, &nested.into_vec());
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = WatchKeyOutput::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.changed = decode_varint(&record)? != 0,
                2 => out.entry_if_changed = Some(KvEntry::decode(decode_len(&record)?)?),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOutput {
    pub status: u32,
    pub keys: Vec<WatchKeyOutput>,
}

impl WatchOutput {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = ByteWriter::new();
        write_varint_field(&mut out, 1, self.status as u64);
        for key in &self.keys {
            let mut nested = ByteWriter::new();
            key.encode(&mut nested);
            write_message_field(&mut out, 2, &nested.into_vec());
        }
        out.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut reader = ByteReader::new(bytes);
        let mut out = WatchOutput::default();
        while let Some(record) = read_record(&mut reader)? {
            match record.tag.field {
                1 => out.status = decode_varint(&record)? as u32,
                2 => out.keys.push(WatchKeyOutput::decode(decode_len(&record)?)?),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_range_roundtrip() {
        let range = ReadRange {
            start: vec![1, 2, 3],
            end: vec![4, 5],
            limit: 10,
            reverse: true,
        };
        let mut w = ByteWriter::new();
        range.encode(&mut w);
        assert_eq!(ReadRange::decode(&w.into_vec()).unwrap(), range);
    }

    #[test]
    fn snapshot_read_roundtrip_with_multiple_ranges() {
        let req = SnapshotRead {
            ranges: vec![
                ReadRange { start: vec![1], end: vec![2], limit: 0, reverse: false },
                ReadRange { start: vec![3], end: vec![4], limit: 5, reverse: true },
            ],
        };
        let encoded = req.encode();
        assert_eq!(SnapshotRead::decode(&encoded).unwrap(), req);
    }

    #[test]
    fn default_fields_are_omitted_on_encode() {
        let req = SnapshotRead::default();
        assert!(req.encode().is_empty());
    }

    #[test]
    fn kv_entry_roundtrip() {
        let entry = KvEntry {
            key: vec![9, 9],
            value: b"hi".to_vec(),
            encoding: 3,
            versionstamp: vec![0u8; 10],
        };
        let mut w = ByteWriter::new();
        entry.encode(&mut w);
        assert_eq!(KvEntry::decode(&w.into_vec()).unwrap(), entry);
    }

    #[test]
    fn snapshot_read_output_roundtrip() {
        let output = SnapshotReadOutput {
            ranges: vec![ReadRangeOutput {
                values: vec![KvEntry {
                    key: vec![1],
                    value: vec![2],
                    encoding: 3,
                    versionstamp: vec![0; 10],
                }],
            }],
            read_disabled: false,
            read_is_strongly_consistent: true,
            status: SnapshotReadStatus::Success,
        };
        let encoded = output.encode();
        assert_eq!(SnapshotReadOutput::decode(&encoded).unwrap(), output);
    }

    #[test]
    fn atomic_write_roundtrip_preserves_order() {
        let write = AtomicWrite {
            checks: vec![Check { key: vec![1], versionstamp: vec![] }],
            mutations: vec![
                Mutation {
                    key: vec![2],
                    value: Some(KvValue { data: vec![9], encoding: 3 }),
                    mutation_type: MutationType::Set,
                    expire_at_ms: -500,
                },
                Mutation {
                    key: vec![3],
                    value: None,
                    mutation_type: MutationType::Delete,
                    expire_at_ms: 0,
                },
            ],
            enqueues: vec![Enqueue {
                payload: vec![1, 2, 3],
                deadline_ms: 1000,
                keys_if_undelivered: vec![vec![4], vec![5]],
                backoff_schedule: vec![100, 200, 400],
            }],
        };
        let encoded = write.encode();
        assert_eq!(AtomicWrite::decode(&encoded).unwrap(), write);
    }

    #[test]
    fn negative_expire_at_ms_roundtrips() {
        let mutation = Mutation {
            key: vec![1],
            value: None,
            mutation_type: MutationType::Set,
            expire_at_ms: -123456,
        };
        let mut w = ByteWriter::new();
        mutation.encode(&mut w);
        assert_eq!(Mutation::decode(&w.into_vec()).unwrap(), mutation);
    }

    #[test]
    fn atomic_write_output_roundtrip() {
        let output = AtomicWriteOutput {
            status: AtomicWriteStatus::CheckFailure,
            versionstamp: vec![],
            failed_checks: vec![],
        };
        let encoded = output.encode();
        assert_eq!(AtomicWriteOutput::decode(&encoded).unwrap(), output);
    }

    #[test]
    fn watch_and_watch_output_roundtrip() {
        let watch = Watch {
            keys: vec![WatchKey { key: vec![1] }, WatchKey { key: vec![2] }],
        };
        let encoded = watch.encode();
        assert_eq!(Watch::decode(&encoded).unwrap(), watch);

        let output = WatchOutput {
            status: 0,
            keys: vec![
                WatchKeyOutput { changed: true, entry_if_changed: Some(KvEntry {
                    key: vec![1],
                    value: vec![9],
                    encoding: 3,
                    versionstamp: vec![0; 10],
                }) },
                WatchKeyOutput { changed: false, entry_if_changed: None },
            ],
        };
        let encoded = output.encode();
        assert_eq!(WatchOutput::decode(&encoded).unwrap(), output);
    }

    #[test]
    fn unknown_fields_are_ignored_on_decode() {
        let mut w = ByteWriter::new();
        write_varint_field(&mut w, 99, 7);
        write_bytes_field(&mut w, 1, &[1, 2, 3]);
        let check = Check::decode(&w.into_vec()).unwrap();
        assert_eq!(check.key, vec![1, 2, 3]);
    }

    #[test]
    fn unrecognized_enum_value_is_an_error() {
        let mut w = ByteWriter::new();
        write_varint_field(&mut w, 8, 99);
        assert!(SnapshotReadOutput::decode(&w.into_vec()).is_err());
    }
}
