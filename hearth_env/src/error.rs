//! Error types for the Hearth environment abstraction.

use crate::types::ScheduleHandle;
use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    /// Attempted to move the clock backwards
    #[error("time travel is only possible to the future: cannot travel from {from} to {to}")]
    TimeTravel {
        /// Current instant at the time of the call
        from: NaiveDateTime,
        /// Requested (earlier) instant
        to: NaiveDateTime,
    },

    /// Handle does not refer to any registered timer
    #[error("Unknown schedule handle: {0}")]
    UnknownHandle(ScheduleHandle),

    /// Entity identifier is not of the form `<domain>.<object_id>`
    #[error("Malformed entity id: {0:?}")]
    MalformedEntityId(String),

    /// Argument rejected before any state was touched
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure raised by automation code inside a callback
    #[error("App error: {0}")]
    App(String),
}

impl EnvError {
    /// Creates an app error.
    pub fn app(msg: impl Into<String>) -> Self {
        Self::App(msg.into())
    }

    /// Creates an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a malformed entity id error.
    pub fn malformed(id: impl std::fmt::Display) -> Self {
        Self::MalformedEntityId(id.to_string())
    }
}

/// Result alias used across the capability interface.
pub type EnvResult<T> = Result<T, EnvError>;
