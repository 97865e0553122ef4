//! Value envelope codec — tags an engine value with an encoding
//! discriminator and round-trips it through the engine's own value model.
//!
//! This module never inspects the bytes of a `Structured` value; it only
//! shuffles them between the wire envelope and [`EngineValue`].

use thiserror::Error;

use crate::engine::EngineValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEncoding {
    V8 = 1,
    Le64 = 2,
    Bytes = 3,
}

impl ValueEncoding {
    pub fn from_wire(value: u32) -> Result<Self, ValueCodecError> {
        match value {
            1 => Ok(Self::V8),
            2 => Ok(Self::Le64),
            3 => Ok(Self::Bytes),
            other => Err(ValueCodecError::UnknownEncoding(other)),
        }
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueCodecError {
    #[error("unknown value encoding: {0}")]
    UnknownEncoding(u32),

    #[error("LE64 envelope must be exactly 8 bytes, got {0}")]
    BadLe64Length(usize),

    #[error("mutation requires a counter value but the envelope decoded to a non-counter type")]
    NotACounter,
}

/// A value envelope as carried on the wire: opaque bytes plus an encoding tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEnvelope {
    pub data: Vec<u8>,
    pub encoding: ValueEncoding,
}

/// Converts an engine-side value into its wire envelope (read path).
pub fn envelope_from_engine_value(value: &EngineValue) -> ValueEnvelope {
    match value {
        EngineValue::Bytes(bytes) => ValueEnvelope {
            data: bytes.clone(),
            encoding: ValueEncoding::Bytes,
        },
        EngineValue::Counter(counter) => ValueEnvelope {
            data: counter.to_le_bytes().to_vec(),
            encoding: ValueEncoding::Le64,
        },
        EngineValue::Structured(blob) => ValueEnvelope {
            data: blob.clone(),
            encoding: ValueEncoding::V8,
        },
    }
}

/// Converts a wire envelope into an engine-side value (write path).
pub fn engine_value_from_envelope(envelope: &ValueEnvelope) -> Result<EngineValue, ValueCodecError> {
    match envelope.encoding {
        ValueEncoding::Bytes => Ok(EngineValue::Bytes(envelope.data.clone())),
        ValueEncoding::Le64 => Ok(EngineValue::Counter(decode_le64(&envelope.data)?)),
        ValueEncoding::V8 => Ok(EngineValue::Structured(envelope.data.clone())),
    }
}

/// Decodes a counter value specifically, for SUM/MAX/MIN mutations — these
/// require the envelope to already carry an LE64 encoding.
pub fn counter_from_envelope(envelope: &ValueEnvelope) -> Result<u64, ValueCodecError> {
    match envelope.encoding {
        ValueEncoding::Le64 => decode_le64(&envelope.data),
        _ => Err(ValueCodecError::NotACounter),
    }
}

fn decode_le64(data: &[u8]) -> Result<u64, ValueCodecError> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| ValueCodecError::BadLe64Length(data.len()))?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_roundtrip() {
        let envelope = ValueEnvelope { data: b"hi".to_vec(), encoding: ValueEncoding::Bytes };
        let value = engine_value_from_envelope(&envelope).unwrap();
        assert_eq!(value, EngineValue::Bytes(b"hi".to_vec()));
        assert_eq!(envelope_from_engine_value(&value), envelope);
    }

    #[test]
    fn le64_roundtrip() {
        let envelope = ValueEnvelope { data: 5u64.to_le_bytes().to_vec(), encoding: ValueEncoding::Le64 };
        let value = engine_value_from_envelope(&envelope).unwrap();
        assert_eq!(value, EngineValue::Counter(5));
        assert_eq!(envelope_from_engine_value(&value), envelope);
    }

    #[test]
    fn le64_rejects_wrong_length() {
        let envelope = ValueEnvelope { data: vec![1, 2, 3], encoding: ValueEncoding::Le64 };
        assert_eq!(
            engine_value_from_envelope(&envelope).unwrap_err(),
            ValueCodecError::BadLe64Length(3)
        );
    }

    #[test]
    fn structured_roundtrip_is_opaque() {
        let blob = vec![0xde, 0xad, 0xbe, 0xef];
        let envelope = ValueEnvelope { data: blob.clone(), encoding: ValueEncoding::V8 };
        let value = engine_value_from_envelope(&envelope).unwrap();
        assert_eq!(value, EngineValue::Structured(blob));
    }

    #[test]
    fn counter_from_envelope_rejects_non_counter() {
        let envelope = ValueEnvelope { data: b"hi".to_vec(), encoding: ValueEncoding::Bytes };
        assert_eq!(counter_from_envelope(&envelope).unwrap_err(), ValueCodecError::NotACounter);
    }
}
