//! Core attempt tracking and lockout decisions for rampart.
//!
//! rampart watches authentication outcomes and locks clients out after
//! repeated failures. The authentication layer calls one entry point per
//! outcome: [`LockoutEngine::record_failure`] for a failed attempt,
//! [`AccessRecorder::record_success`] for a login, and
//! [`AccessRecorder::record_logout`] for a logout. A `LockedOut` decision
//! must be treated as a hard denial.
//!
//! Storage lives behind the [`AttemptRepository`] and
//! [`AccessLogRepository`] traits so backends (in-memory map, relational
//! table, key-value store) can plug in. Lockout notifications go out over
//! the [`EventBus`].

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod record;
pub mod repositories;
pub mod services;
pub mod whitelist;

pub use config::LockoutConfig;
pub use error::Error;
pub use events::{Event, EventBus, EventHandler};
pub use identity::{AttemptContext, ClientIdentity, IdentificationPolicy};
pub use record::{AccessEvent, AttemptRecord, ContextEntry, UpsertOutcome};
pub use repositories::{AccessLogRepository, AttemptRepository};
pub use services::{AccessRecorder, Decision, LockoutEngine};
pub use whitelist::{StaticWhitelist, WhitelistEntry, WhitelistPolicy};
