use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("attempt context carries no usable identification signal")]
    MissingContext,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    Handler(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failure limit must be greater than zero")]
    ZeroFailureLimit,

    #[error("cooldown period must be positive")]
    NonPositiveCooldown,
}

impl Error {
    /// Storage errors must propagate to the caller: an unrecorded failure
    /// silently allowed would defeat the defense.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_missing_context(&self) -> bool {
        matches!(self, Error::Identity(IdentityError::MissingContext))
    }
}
