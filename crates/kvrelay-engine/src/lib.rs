//! The engine boundary and the one in-process engine this repo ships.
//!
//! Everything above `Engine` (HTTP handlers, wire decode/encode) is codec and
//! dispatch; this crate is where storage semantics actually live.

pub mod engine;
pub mod store;
pub mod value;

pub use engine::{
    AtomicTransactionBuilder, CommitOutcome, Engine, EngineCheck, EngineEnqueue, EngineEntry,
    EngineError, EngineMutation, EngineValue, ListOptions, RangeSelector, WatchBatch,
    WatchKeyChange,
};
pub use store::MemoryEngine;
pub use value::{
    counter_from_envelope, engine_value_from_envelope, envelope_from_engine_value, ValueCodecError,
    ValueEncoding, ValueEnvelope,
};
