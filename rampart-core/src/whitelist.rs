//! Whitelist evaluation.
//!
//! Exemption is checked before any counter mutation: a whitelisted client
//! never accumulates failures and can never be locked out.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::identity::AttemptContext;

/// A single exemption rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhitelistEntry {
    /// Exempt a specific account name.
    Username(String),
    /// Exempt a source address.
    IpAddress(IpAddr),
}

impl WhitelistEntry {
    fn matches(&self, ctx: &AttemptContext) -> bool {
        match self {
            Self::Username(name) => ctx.username.as_deref() == Some(name.as_str()),
            Self::IpAddress(ip) => ctx.ip_address == Some(*ip),
        }
    }
}

/// Decides whether an attempt is exempt from lockout tracking.
///
/// Evaluation must be pure and stateless; it runs on every failure before
/// any record is created or updated.
pub trait WhitelistPolicy: Send + Sync + 'static {
    fn is_exempt(&self, ctx: &AttemptContext) -> bool;
}

/// Whitelist backed by a fixed list of entries. An attempt is exempt when
/// any entry matches.
#[derive(Debug, Clone, Default)]
pub struct StaticWhitelist {
    entries: Vec<WhitelistEntry>,
}

impl StaticWhitelist {
    pub fn new(entries: Vec<WhitelistEntry>) -> Self {
        Self { entries }
    }

    /// A whitelist that exempts nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl WhitelistPolicy for StaticWhitelist {
    fn is_exempt(&self, ctx: &AttemptContext) -> bool {
        self.entries.iter().any(|entry| entry.matches(ctx))
    }
}
