use async_trait::async_trait;
use hostlink_bridge::{Callbacks, ChannelRef, InvokeOptions};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::events::EventHub;

/// What a command answers: the result, or the rejection payload.
pub type HostReply = Result<Value, Value>;

/// Host-side view handed to every handler invocation.
#[derive(Clone)]
pub struct HostContext {
    pub(crate) cmd: String,
    pub(crate) options: Option<InvokeOptions>,
    pub(crate) callbacks: Callbacks,
    pub(crate) events: Arc<EventHub>,
}

impl HostContext {
    pub fn command(&self) -> &str {
        &self.cmd
    }

    pub fn options(&self) -> Option<&InvokeOptions> {
        self.options.as_ref()
    }

    /// Fire the channel referenced by `channel` (a `__CHANNEL__:<id>` value).
    /// Returns `false` when the value is not a channel or the channel is gone.
    pub fn emit_to_channel(&self, channel: &Value, payload: Value) -> bool {
        match ChannelRef::from_value(channel) {
            Some(channel) => self.callbacks.run(channel.id(), payload),
            None => false,
        }
    }

    /// Emit `event` to the client's listeners, or only to those bound to `target`.
    pub fn emit_event(&self, event: &str, target: Option<&str>, payload: Value) -> usize {
        self.events.emit(&self.callbacks, event, target, payload)
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, ctx: HostContext, payload: Value) -> HostReply;
}

/// Adapts an async closure into a [`CommandHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(HostContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HostReply> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(HostContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HostReply> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: HostContext, payload: Value) -> HostReply {
        (self.f)(ctx, payload).await
    }
}

/// Always answers with the same reply.
pub struct StaticHandler {
    name: String,
    reply: HostReply,
}

impl StaticHandler {
    pub fn resolve(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            reply: Ok(value),
        }
    }

    pub fn reject(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            reply: Err(payload),
        }
    }
}

#[async_trait]
impl CommandHandler for StaticHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: HostContext, _payload: Value) -> HostReply {
        self.reply.clone()
    }
}
