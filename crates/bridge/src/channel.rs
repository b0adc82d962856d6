//! Channels: registered callbacks the host may fire any number of times.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

use crate::callbacks::Callbacks;
use crate::types::CallbackId;

/// Prefix marking a channel reference inside a request payload.
pub const CHANNEL_PREFIX: &str = "__CHANNEL__:";

/// Serialized pointer to a channel, `__CHANNEL__:<id>` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRef(pub CallbackId);

impl ChannelRef {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.strip_prefix(CHANNEL_PREFIX)
            .and_then(|id| id.parse::<u32>().ok())
            .map(|id| ChannelRef(CallbackId(id)))
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }

    pub fn id(&self) -> CallbackId {
        self.0
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CHANNEL_PREFIX, self.0)
    }
}

impl Serialize for ChannelRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ChannelRef::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("not a channel reference: {}", raw)))
    }
}

/// A live registration delivering decoded `T` payloads to its handler.
///
/// Embed it in invoke arguments to hand it to the host. The registration stays
/// until [`Channel::unregister`] is called; dropping the value does not remove it.
pub struct Channel<T> {
    id: CallbackId,
    callbacks: Callbacks,
    _payload: PhantomData<fn(T)>,
}

impl<T> Channel<T> {
    pub(crate) fn new(id: CallbackId, callbacks: Callbacks) -> Self {
        Self {
            id,
            callbacks,
            _payload: PhantomData,
        }
    }

    pub fn id(&self) -> CallbackId {
        self.id
    }

    pub fn to_ref(&self) -> ChannelRef {
        ChannelRef(self.id)
    }

    pub fn is_registered(&self) -> bool {
        self.callbacks.contains(self.id)
    }

    pub fn unregister(&self) -> bool {
        self.callbacks.unregister(self.id)
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("id", &self.id).finish()
    }
}

impl<T> Serialize for Channel<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_ref().serialize(serializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::callbacks::CallbackRegistry;
    use crate::config::IdStrategy;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_channel_serializes_as_sentinel() {
        let callbacks = Arc::new(CallbackRegistry::new(IdStrategy::Sequential, 0));
        let id = callbacks.register(Arc::new(|_| {}), false);
        let channel: Channel<Value> = Channel::new(id, callbacks);

        let args = json!({"onEvent": &channel});
        assert_eq!(args, json!({"onEvent": "__CHANNEL__:1"}));
    }

    #[test]
    fn test_parse_round_trip() {
        let parsed = ChannelRef::parse("__CHANNEL__:4242").unwrap();
        assert_eq!(parsed.id(), CallbackId(4242));
        assert_eq!(parsed.to_string(), "__CHANNEL__:4242");
    }

    #[test]
    fn test_parse_rejects_other_strings() {
        assert!(ChannelRef::parse("4242").is_none());
        assert!(ChannelRef::parse("__CHANNEL__:").is_none());
        assert!(ChannelRef::parse("__CHANNEL__:-1").is_none());
        assert!(ChannelRef::from_value(&json!(12)).is_none());
    }

    #[test]
    fn test_unregister() {
        let callbacks = Arc::new(CallbackRegistry::new(IdStrategy::Random, 16));
        let id = callbacks.register(Arc::new(|_| {}), false);
        let channel: Channel<Value> = Channel::new(id, callbacks.clone());

        assert!(channel.is_registered());
        assert!(channel.unregister());
        assert!(!channel.is_registered());
        assert!(!callbacks.run(id, json!(null)));
    }
}
