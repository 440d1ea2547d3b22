//! Types shared between the DB and API representations.

pub mod options;
pub mod role;
pub mod tenant;
