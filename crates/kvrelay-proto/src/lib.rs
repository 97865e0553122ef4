//! Per-message encode/decode for the datapath wire schema, layered on
//! `kvrelay_core::wire`'s generic tag-wire record reader/writer.
//!
//! Message shapes mirror the wire schema field numbers exactly (field
//! renumbering would break compatibility with existing clients); gaps in
//! numbering are the schema's, not an error here.

pub mod messages;

pub use messages::*;
