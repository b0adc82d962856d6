//! The boundary the bridge consumes.

use thiserror::Error;

use crate::callbacks::Callbacks;
use crate::types::IpcMessage;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Transport failed: {0}")]
    Failed(String),
}

/// Carries requests to the host.
///
/// `post` must not block waiting for the answer. The host replies later by running
/// `message.callback` or `message.error` on `callbacks`, and fires channels through
/// the same handle. Unregistering both reply ids without running either cancels the call.
pub trait IpcTransport: Send + Sync {
    fn post(&self, message: IpcMessage, callbacks: Callbacks) -> Result<(), TransportError>;
}
