//! Error types surfaced by the bridge.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::transport::TransportError;

/// Payload the host sent back when it declined a command.
///
/// The value is kept exactly as the host produced it; use [`HostRejection::message`]
/// for the common `"text"` / `{ "message": "text" }` shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRejection(Value);

impl HostRejection {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    pub fn payload(&self) -> &Value {
        &self.0
    }

    pub fn into_payload(self) -> Value {
        self.0
    }

    pub fn message(&self) -> Option<&str> {
        match &self.0 {
            Value::String(message) => Some(message.as_str()),
            Value::Object(fields) => fields.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for HostRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => f.write_str(message),
            None => write!(f, "{}", self.0),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Host rejected command: {0}")]
    Rejected(HostRejection),

    #[error("Command name must be non-empty")]
    InvalidCommand,

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Request canceled before the host answered")]
    Canceled,

    #[error("Host internal unavailable: {0}")]
    Unavailable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// The host payload, when this error is a rejection.
    pub fn rejection(&self) -> Option<&HostRejection> {
        match self {
            BridgeError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}
