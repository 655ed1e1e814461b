// SPDX-License-Identifier: MIT

//! Typed error handling for typeless-rs
//!
//! Handler code returns [`HandlerError`] so that `?` works on any error type.
//! Failures raised by the engine itself are [`EpicError`]; everything that can
//! fail while building or configuring a runtime is a [`TypelessError`].

use thiserror::Error;

/// Error type returned by user handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Failures observed at a handler boundary
#[derive(Debug, Error)]
pub enum EpicError {
    /// The action payload could not be decoded into the handler's payload type
    #[error("Invalid payload for action '{kind}': {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// The handler panicked while running
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// Generic handler failure
    #[error("{0}")]
    Failed(String),
}

/// Top-level error type for typeless-rs
#[derive(Debug, Error)]
pub enum TypelessError {
    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The dispatch loop has stopped and no longer accepts actions
    #[error("Dispatch pipeline is closed")]
    Closed,

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

impl EpicError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl TypelessError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
