//! Host-owned resources addressed by an opaque id.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::channel::Channel;
use crate::client::BridgeClient;
use crate::error::BridgeError;
use crate::types::ResourceId;

pub const CLOSE_COMMAND: &str = "plugin:resources|close";

/// A handle to an object living on the host.
///
/// `close` consumes the handle. The host owns the object's lifetime; nothing is
/// released until `close` succeeds.
pub struct Resource {
    rid: ResourceId,
    client: BridgeClient,
}

impl Resource {
    pub fn new(client: BridgeClient, rid: ResourceId) -> Self {
        Self { rid, client }
    }

    pub fn rid(&self) -> ResourceId {
        self.rid
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    pub async fn close(self) -> Result<(), BridgeError> {
        self.client
            .invoke_raw(CLOSE_COMMAND, json!({ "rid": self.rid }), None)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("rid", &self.rid).finish()
    }
}

/// Implemented by wrappers that own a [`Resource`] alongside other capabilities.
#[async_trait]
pub trait HasResource: Send + Sized {
    fn resource(&self) -> &Resource;

    /// Give up the wrapper, releasing anything it holds besides the resource.
    fn into_resource(self) -> Resource;

    fn rid(&self) -> ResourceId {
        self.resource().rid()
    }

    async fn close(self) -> Result<(), BridgeError> {
        self.into_resource().close().await
    }
}

#[async_trait]
impl HasResource for Resource {
    fn resource(&self) -> &Resource {
        self
    }

    fn into_resource(self) -> Resource {
        self
    }
}

/// A host resource paired with the channel it reports on
/// (download progress, socket messages and the like).
#[derive(Debug)]
pub struct ResourceChannel<T> {
    resource: Resource,
    channel: Channel<T>,
}

impl<T> ResourceChannel<T>
where
    T: DeserializeOwned + 'static,
{
    /// Invoke `command` with a fresh channel stored under `channel_field` in `args`.
    /// The host must answer with the new resource id.
    pub async fn open<F>(
        client: &BridgeClient,
        command: &str,
        channel_field: &str,
        args: Value,
        handler: F,
    ) -> Result<Self, BridgeError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let mut fields = match args {
            Value::Object(fields) => fields,
            Value::Null => serde_json::Map::new(),
            _ => {
                return Err(BridgeError::InvalidArgs(
                    "resource arguments must be a JSON object".to_string(),
                ))
            }
        };

        let channel = client.channel(handler);
        fields.insert(
            channel_field.to_string(),
            Value::String(channel.to_ref().to_string()),
        );

        match client
            .invoke::<ResourceId, _>(command, Value::Object(fields), None)
            .await
        {
            Ok(rid) => Ok(Self {
                resource: Resource::new(client.clone(), rid),
                channel,
            }),
            Err(e) => {
                channel.unregister();
                Err(e)
            }
        }
    }
}

impl<T> ResourceChannel<T> {
    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }
}

#[async_trait]
impl<T> HasResource for ResourceChannel<T> {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn into_resource(self) -> Resource {
        self.channel.unregister();
        self.resource
    }
}
