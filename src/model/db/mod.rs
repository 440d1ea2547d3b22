//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs are serialised in MongoDB's own format.
//! - Maps keyed by IDs use the hex string of the ID as the key.

pub mod poll;
pub mod user;
