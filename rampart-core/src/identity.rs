//! Client identity resolution.
//!
//! Failed attempts aggregate onto one record per identity. The identity is
//! derived from the raw attempt signals under a configurable policy, and the
//! derivation is deterministic so retries land on the same record.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Raw signals describing one authentication attempt.
///
/// The authentication layer extracts these from its request object. All
/// fields are optional; a context with no usable signal cannot be tracked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptContext {
    pub username: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
    /// Free-form diagnostic payload (query or body summaries). Accumulated
    /// on the attempt record but never used for decisions.
    pub extra: Option<serde_json::Value>,
}

impl AttemptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn ip_address(mut self, ip_address: IpAddr) -> Self {
        self.ip_address = Some(ip_address);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

impl fmt::Display for AttemptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{username: {}, ip: {}, agent: {}, path: {}}}",
            self.username.as_deref().unwrap_or("<unknown>"),
            self.ip_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            self.user_agent.as_deref().unwrap_or("<unknown>"),
            self.path.as_deref().unwrap_or("<unknown>"),
        )
    }
}

/// How attempts are grouped for counting. Policies are mutually exclusive;
/// exactly one is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationPolicy {
    /// Group by account name; anonymous attempts fall back to the source
    /// address so unknown-user floods are still tracked.
    Username,
    /// Group by source address only.
    SourceAddress,
    /// Group by account name and source address together.
    #[default]
    UsernameAndSourceAddress,
    /// Group by source address and user agent together.
    UserAgentCombination,
}

/// The aggregation key for failed attempts.
///
/// Only the fields selected by the active policy are populated, so two
/// attempts that the policy considers the same client compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub username: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{username: {}, ip: {}, agent: {}}}",
            self.username.as_deref().unwrap_or("<unknown>"),
            self.ip_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            self.user_agent.as_deref().unwrap_or("<unknown>"),
        )
    }
}

impl IdentificationPolicy {
    /// Derive the aggregation key for an attempt.
    ///
    /// Returns [`IdentityError::MissingContext`] when the context carries
    /// none of the signals the policy can key on.
    pub fn resolve(&self, ctx: &AttemptContext) -> Result<ClientIdentity, IdentityError> {
        let identity = match self {
            Self::Username => ClientIdentity {
                username: ctx.username.clone(),
                ip_address: if ctx.username.is_some() {
                    None
                } else {
                    ctx.ip_address
                },
                user_agent: None,
            },
            Self::SourceAddress => ClientIdentity {
                username: None,
                ip_address: ctx.ip_address,
                user_agent: None,
            },
            Self::UsernameAndSourceAddress => ClientIdentity {
                username: ctx.username.clone(),
                ip_address: ctx.ip_address,
                user_agent: None,
            },
            Self::UserAgentCombination => ClientIdentity {
                username: None,
                ip_address: ctx.ip_address,
                user_agent: ctx.user_agent.clone(),
            },
        };

        if identity.username.is_none()
            && identity.ip_address.is_none()
            && identity.user_agent.is_none()
        {
            return Err(IdentityError::MissingContext);
        }

        Ok(identity)
    }
}
