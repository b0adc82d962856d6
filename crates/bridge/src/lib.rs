//! Hostlink Bridge
//!
//! Client side of a desktop host IPC bridge: named commands with one correlated
//! answer each, plus callback channels the host can fire at any time.

pub mod callbacks;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod internals;
pub mod listener;
pub mod metrics;
pub mod resource;
pub mod transport;
pub mod types;

pub use callbacks::{CallbackFn, CallbackRegistry, Callbacks, IdSource};
pub use channel::{Channel, ChannelRef, CHANNEL_PREFIX};
pub use client::{BridgeClient, WeakBridgeClient};
pub use config::{load_bridge_config, BridgeConfig, IdStrategy};
pub use error::{BridgeError, HostRejection};
pub use event::{BuiltinEvent, Event, EventListener};
pub use internals::{AssetScheme, HostMetadata, WindowMetadata};
pub use listener::PluginListener;
pub use resource::{HasResource, Resource, ResourceChannel};
pub use transport::{IpcTransport, TransportError};
pub use types::{CallbackId, CommandName, InvokeOptions, IpcMessage, ResourceId};
