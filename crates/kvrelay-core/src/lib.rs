//! Shared codecs for the key-value relay: binary I/O primitives, the generic
//! tag-wire record format, and the order-preserving tuple key encoding.
//!
//! This crate has no knowledge of HTTP, the engine trait, or any particular
//! message shape — those live in `kvrelay-proto` and `kvrelay-engine`. What's
//! here is meant to be the stable foundation everything else is built on.

pub mod io;
pub mod tuple;
pub mod wire;

pub use io::{ByteReader, ByteWriter, IoError};
pub use tuple::{decode_key, decode_range_key, encode_key, Key, KeyCodecError, KeyPart, RangeKey, RangeMode};
pub use wire::{read_record, Record, RecordValue, Tag, WireError, WireType};
