//! Plugin listeners: channels registered with a plugin under an event name.

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::client::BridgeClient;
use crate::error::BridgeError;
use crate::types::{CallbackId, CommandName};

pub struct PluginListener {
    plugin: String,
    event: String,
    channel_id: CallbackId,
    client: BridgeClient,
}

impl PluginListener {
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn channel_id(&self) -> CallbackId {
        self.channel_id
    }

    /// Drop the local registration and ask the plugin to forget the channel.
    pub async fn unregister(self) -> Result<(), BridgeError> {
        self.client.unregister_callback(self.channel_id);
        let cmd = CommandName::plugin(&self.plugin, "remove_listener")?;
        self.client
            .invoke_raw(
                cmd.as_str(),
                json!({ "event": self.event, "channelId": self.channel_id }),
                None,
            )
            .await?;
        debug!(plugin = %self.plugin, event = %self.event, channel = %self.channel_id, "Plugin listener removed");
        Ok(())
    }
}

impl std::fmt::Debug for PluginListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginListener")
            .field("plugin", &self.plugin)
            .field("event", &self.event)
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

impl BridgeClient {
    /// Register `handler` for `event` on `plugin` via `plugin:<plugin>|register_listener`.
    pub async fn add_plugin_listener<T, F>(
        &self,
        plugin: &str,
        event: &str,
        handler: F,
    ) -> Result<PluginListener, BridgeError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let cmd = CommandName::plugin(plugin, "register_listener")?;
        let channel = self.channel(handler);

        if let Err(e) = self
            .invoke_raw(
                cmd.as_str(),
                json!({ "event": event, "handler": &channel }),
                None,
            )
            .await
        {
            channel.unregister();
            return Err(e);
        }

        Ok(PluginListener {
            plugin: plugin.to_string(),
            event: event.to_string(),
            channel_id: channel.id(),
            client: self.clone(),
        })
    }
}
