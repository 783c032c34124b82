//! Repository traits for the storage layer.
//!
//! Services talk to storage only through these traits, so backends (an
//! in-memory map, a relational table, a key-value store) can plug in without
//! touching the decision logic.

pub mod access_log;
pub mod attempts;

pub use access_log::AccessLogRepository;
pub use attempts::AttemptRepository;
