//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Option lists are serialised as arrays rather than a delimited string.

pub mod auth;
pub mod id;
pub mod import;
pub mod poll;
pub mod results;
pub mod user;
