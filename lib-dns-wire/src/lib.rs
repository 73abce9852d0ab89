//! The DNS wire format of RFC 1035 section 4.1, restricted to what a
//! small UDP-only server needs: the 12-octet header, questions, and
//! uninterpreted resource records.
//!
//! - `types` has the message model and the enumerations.
//! - `deserialise` decodes datagrams, expanding name-compression
//!   pointers (section 4.1.4) with bounded pointer chasing.
//! - `serialise` encodes messages, never compressing names, and
//!   truncates oversized responses to the 512-octet UDP limit.

pub mod deserialise;
pub mod serialise;
pub mod types;
