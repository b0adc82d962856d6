//! Identifiers and message shapes shared by the client and transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::BridgeError;

/// Identifier of an entry in the callback registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackId(pub u32);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a host-owned object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated command name, either `plugin:<namespace>|<action>` or a bare action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandName(String);

impl CommandName {
    /// Validate `name`. Blank names are refused.
    pub fn new(name: impl Into<String>) -> Result<Self, BridgeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BridgeError::InvalidCommand);
        }
        Ok(Self(name))
    }

    /// Build `plugin:<namespace>|<action>`.
    pub fn plugin(namespace: &str, action: &str) -> Result<Self, BridgeError> {
        if namespace.is_empty() || action.is_empty() {
            return Err(BridgeError::InvalidCommand);
        }
        Ok(Self(format!("plugin:{}|{}", namespace, action)))
    }

    /// Full command string as sent to the host.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Plugin namespace, `None` for bare commands.
    pub fn namespace(&self) -> Option<&str> {
        self.0
            .strip_prefix("plugin:")
            .and_then(|rest| rest.split_once('|'))
            .map(|(namespace, _)| namespace)
    }

    /// Action part, or the whole name for bare commands.
    pub fn action(&self) -> &str {
        self.0
            .strip_prefix("plugin:")
            .and_then(|rest| rest.split_once('|'))
            .map(|(_, action)| action)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-call metadata forwarded to the host untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeOptions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl InvokeOptions {
    /// Options with no headers and no target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, replacing any earlier value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Scope the call to a window label.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// One outbound request as the transport sees it.
///
/// The host answers by running `callback` with the result or `error` with the
/// rejection payload on the [`Callbacks`](crate::callbacks::Callbacks) it was handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcMessage {
    pub cmd: String,
    pub callback: CallbackId,
    pub error: CallbackId,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<InvokeOptions>,
}
