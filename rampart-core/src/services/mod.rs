//! Services coordinating repositories, whitelist, and the event bus.

pub mod access;
pub mod lockout;

pub use access::AccessRecorder;
pub use lockout::{Decision, LockoutEngine};
