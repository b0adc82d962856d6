//! Host events: listen, listen once, emit.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::{debug, trace};

use crate::client::{typed_handler, BridgeClient};
use crate::error::BridgeError;
use crate::types::CallbackId;

pub const LISTEN_COMMAND: &str = "plugin:event|listen";
pub const UNLISTEN_COMMAND: &str = "plugin:event|unlisten";
pub const EMIT_COMMAND: &str = "plugin:event|emit";

/// An event as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<T> {
    pub event: String,
    /// Host-side listener id.
    pub id: u32,
    pub payload: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_label: Option<String>,
}

/// Event names reserved by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinEvent {
    WindowResized,
    WindowMoved,
    WindowCloseRequested,
    WindowCreated,
    WindowDestroyed,
    WindowFocus,
    WindowBlur,
    WindowScaleFactorChanged,
    WindowThemeChanged,
    WindowFileDrop,
    WindowFileDropHover,
    WindowFileDropCancelled,
}

impl BuiltinEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinEvent::WindowResized => "tauri://resize",
            BuiltinEvent::WindowMoved => "tauri://move",
            BuiltinEvent::WindowCloseRequested => "tauri://close-requested",
            BuiltinEvent::WindowCreated => "tauri://window-created",
            BuiltinEvent::WindowDestroyed => "tauri://destroyed",
            BuiltinEvent::WindowFocus => "tauri://focus",
            BuiltinEvent::WindowBlur => "tauri://blur",
            BuiltinEvent::WindowScaleFactorChanged => "tauri://scale-change",
            BuiltinEvent::WindowThemeChanged => "tauri://theme-changed",
            BuiltinEvent::WindowFileDrop => "tauri://file-drop",
            BuiltinEvent::WindowFileDropHover => "tauri://file-drop-hover",
            BuiltinEvent::WindowFileDropCancelled => "tauri://file-drop-cancelled",
        }
    }
}

impl fmt::Display for BuiltinEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration returned by [`BridgeClient::listen`] and [`BridgeClient::once`].
pub struct EventListener {
    event: String,
    event_id: u32,
    callback: CallbackId,
    client: BridgeClient,
}

impl EventListener {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn event_id(&self) -> u32 {
        self.event_id
    }

    pub fn callback_id(&self) -> CallbackId {
        self.callback
    }

    pub async fn unlisten(self) -> Result<(), BridgeError> {
        self.client.unregister_callback(self.callback);
        unlisten(&self.client, &self.event, self.event_id).await
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("event", &self.event)
            .field("event_id", &self.event_id)
            .field("callback", &self.callback)
            .finish()
    }
}

async fn unlisten(client: &BridgeClient, event: &str, event_id: u32) -> Result<(), BridgeError> {
    client
        .invoke_raw(
            UNLISTEN_COMMAND,
            json!({ "event": event, "eventId": event_id }),
            None,
        )
        .await?;
    trace!(event, event_id, "Unlistened");
    Ok(())
}

fn check_event_name(event: &str) -> Result<(), BridgeError> {
    if event.is_empty() {
        return Err(BridgeError::InvalidArgs(
            "event name must be non-empty".to_string(),
        ));
    }
    Ok(())
}

impl BridgeClient {
    /// Listen to `event` until [`EventListener::unlisten`] is called.
    pub async fn listen<T, F>(
        &self,
        event: &str,
        target: Option<&str>,
        handler: F,
    ) -> Result<EventListener, BridgeError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(Event<T>) + Send + Sync + 'static,
    {
        check_event_name(event)?;
        let callback = self.callbacks().register(typed_handler(handler), false);
        self.register_event(event, target, callback).await
    }

    /// Listen to the first delivery of `event` that decodes as `T`.
    ///
    /// The local registration is gone before `handler` runs; the host-side
    /// unlisten is sent in the background and its failure is ignored.
    pub async fn once<T, F>(
        &self,
        event: &str,
        target: Option<&str>,
        handler: F,
    ) -> Result<EventListener, BridgeError>
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(Event<T>) + Send + 'static,
    {
        check_event_name(event)?;
        let weak = self.downgrade();
        let callback = self.register_once(move |delivered: Event<T>| {
            let (name, event_id) = (delivered.event.clone(), delivered.id);
            handler(delivered);

            let Some(client) = weak.upgrade() else {
                return;
            };
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        let _ = unlisten(&client, &name, event_id).await;
                    });
                }
                Err(_) => debug!(event = %name, "No runtime available for background unlisten"),
            }
        });
        self.register_event(event, target, callback).await
    }

    async fn register_event(
        &self,
        event: &str,
        target: Option<&str>,
        callback: CallbackId,
    ) -> Result<EventListener, BridgeError> {
        let registered = self
            .invoke::<u32, _>(
                LISTEN_COMMAND,
                json!({ "event": event, "windowLabel": target, "handler": callback }),
                None,
            )
            .await;

        match registered {
            Ok(event_id) => {
                debug!(event, event_id, callback = %callback, "Listening");
                Ok(EventListener {
                    event: event.to_string(),
                    event_id,
                    callback,
                    client: self.clone(),
                })
            }
            Err(e) => {
                self.unregister_callback(callback);
                Err(e)
            }
        }
    }

    /// Emit `event` with `payload` to every listener, or only to `target`.
    pub async fn emit<P>(
        &self,
        event: &str,
        payload: P,
        target: Option<&str>,
    ) -> Result<(), BridgeError>
    where
        P: Serialize,
    {
        check_event_name(event)?;
        let payload = serde_json::to_value(payload)?;
        self.invoke_raw(
            EMIT_COMMAND,
            json!({ "event": event, "windowLabel": target, "payload": payload }),
            None,
        )
        .await?;
        Ok(())
    }
}
