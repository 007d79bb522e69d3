use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::MessageId;

/// Configuration-specific errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),
}

/// Errors reported by a status messenger implementation.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum MessengerError {
    /// The edit would leave the notice unchanged. Transports report this as
    /// an error; the queue treats it as success.
    #[error("notice content not modified")]
    #[diagnostic(code(scribe_core::messenger::not_modified))]
    NotModified,

    #[error("notice not found")]
    #[diagnostic(
        code(scribe_core::messenger::not_found),
        help("The notice was probably deleted by the user or by a previous cancel")
    )]
    NotFound,

    #[error("transport error: {0}")]
    #[diagnostic(code(scribe_core::messenger::transport))]
    Transport(String),
}

impl MessengerError {
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified)
    }
}

/// Failure of the external media processor for one item.
#[derive(Error, Diagnostic, Debug, Clone)]
pub enum ProcessError {
    #[error("processing {message_id} failed: {reason}")]
    #[diagnostic(code(scribe_core::process::failed))]
    Failed {
        message_id: MessageId,
        reason: String,
    },

    #[error("processor panicked on {message_id}: {reason}")]
    #[diagnostic(
        code(scribe_core::process::panicked),
        help("The drain continued with the next item; check the processor for the panic source")
    )]
    Panicked {
        message_id: MessageId,
        reason: String,
    },

    #[error("{0}")]
    #[diagnostic(code(scribe_core::process::other))]
    Other(String),
}

#[derive(Error, Diagnostic, Debug)]
pub enum QueueError {
    #[error("Configuration error for field '{field}'")]
    #[diagnostic(
        code(scribe_core::configuration_error),
        help("Check configuration file at {config_path}\nExpected: {expected}")
    )]
    Configuration {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Invalid queue configuration: {field}")]
    #[diagnostic(code(scribe_core::invalid_config), help("{reason}"))]
    InvalidConfig { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
