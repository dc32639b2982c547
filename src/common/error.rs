//! Error types for nds

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Wire Errors ===
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === Startup Errors ===
    #[error("Cannot enumerate network interfaces: {0}")]
    InterfaceEnumeration(String),

    #[error("Cannot join multicast group {group}: {reason}")]
    MulticastJoin { group: String, reason: String },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Network Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Does this error abort peer startup?
    ///
    /// Everything else is absorbed by the loop that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InterfaceEnumeration(_) | Error::MulticastJoin { .. } | Error::InvalidConfig(_)
        )
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
