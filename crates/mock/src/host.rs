//! In-process host that answers bridge commands from registered handlers.

use hostlink_bridge::{
    BridgeClient, BridgeConfig, CallbackId, Callbacks, CommandName, InvokeOptions, IpcMessage,
    IpcTransport, TransportError,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::MockError;
use crate::events::EventHub;
use crate::handler::{CommandHandler, FnHandler, HostContext, HostReply, StaticHandler};
use crate::registry::HandlerRegistry;

const EVENT_PREFIX: &str = "plugin:event|";

pub(crate) type FallbackFuture = Pin<Box<dyn Future<Output = HostReply> + Send>>;
pub(crate) type Fallback = Arc<dyn Fn(String, Value) -> FallbackFuture + Send + Sync>;

/// One command as the host received it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub cmd: String,
    pub payload: Value,
    pub options: Option<InvokeOptions>,
    pub timestamp: String,
}

struct HostState {
    registry: RwLock<HandlerRegistry>,
    fallback: RwLock<Option<Fallback>>,
    events: Arc<EventHub>,
    emulate_events: bool,
    calls: Mutex<Vec<CallRecord>>,
    callbacks: RwLock<Option<Callbacks>>,
}

/// Cheap to clone; clones share handlers, the event hub and the call log.
#[derive(Clone)]
pub struct MockHost {
    state: Arc<HostState>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// A host that does not answer `plugin:event|*` itself; those commands go
    /// through handlers and the fallback like any other.
    pub fn without_events() -> Self {
        Self::build(false)
    }

    fn build(emulate_events: bool) -> Self {
        Self {
            state: Arc::new(HostState {
                registry: RwLock::new(HandlerRegistry::new()),
                fallback: RwLock::new(None),
                events: Arc::new(EventHub::new()),
                emulate_events,
                calls: Mutex::new(Vec::new()),
                callbacks: RwLock::new(None),
            }),
        }
    }

    /// Create a client wired to this host.
    pub fn connect(&self) -> BridgeClient {
        self.connect_with_config(BridgeConfig::default())
    }

    pub fn connect_with_config(&self, config: BridgeConfig) -> BridgeClient {
        let client = BridgeClient::with_config(Arc::new(self.clone()), config);
        *self.state.callbacks.write() = Some(client.callbacks());
        client
    }

    pub fn register(&self, handler: Arc<dyn CommandHandler>) -> Result<(), MockError> {
        if CommandName::new(handler.name()).is_err() {
            return Err(MockError::InvalidHandler(format!(
                "command name '{}' is empty",
                handler.name()
            )));
        }
        info!("Registering handler: {}", handler.name());
        self.state.registry.write().register(handler);
        Ok(())
    }

    /// Register an async closure for `command`.
    pub fn handle<F, Fut>(&self, command: &str, f: F) -> Result<(), MockError>
    where
        F: Fn(HostContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HostReply> + Send + 'static,
    {
        self.register(Arc::new(FnHandler::new(command, f)))
    }

    pub fn respond(&self, command: &str, value: Value) -> Result<(), MockError> {
        self.register(Arc::new(StaticHandler::resolve(command, value)))
    }

    pub fn reject(&self, command: &str, payload: Value) -> Result<(), MockError> {
        self.register(Arc::new(StaticHandler::reject(command, payload)))
    }

    pub fn unregister(&self, command: &str) -> bool {
        self.state.registry.write().unregister(command)
    }

    pub fn handlers(&self) -> Vec<String> {
        self.state.registry.read().list()
    }

    pub(crate) fn set_fallback(&self, fallback: Option<Fallback>) {
        *self.state.fallback.write() = fallback;
    }

    pub fn events(&self) -> Arc<EventHub> {
        self.state.events.clone()
    }

    /// Every command received so far, in arrival order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.calls.lock().clone()
    }

    pub fn calls_for(&self, cmd: &str) -> Vec<CallRecord> {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.cmd == cmd)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.calls.lock().clear();
    }

    /// Fire a callback of the connected client from outside any handler.
    pub fn fire(&self, id: CallbackId, payload: Value) -> Result<bool, MockError> {
        let callbacks = self.connected()?;
        Ok(callbacks.run(id, payload))
    }

    /// Emit `event` to the connected client's listeners.
    pub fn emit_event(&self, event: &str, target: Option<&str>, payload: Value) -> Result<usize, MockError> {
        let callbacks = self.connected()?;
        Ok(self.state.events.emit(&callbacks, event, target, payload))
    }

    fn connected(&self) -> Result<Callbacks, MockError> {
        self.state
            .callbacks
            .read()
            .clone()
            .ok_or(MockError::NotConnected)
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcTransport for MockHost {
    fn post(&self, message: IpcMessage, callbacks: Callbacks) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| TransportError::Failed("mock host needs a tokio runtime".to_string()))?;

        self.state.calls.lock().push(CallRecord {
            cmd: message.cmd.clone(),
            payload: message.payload.clone(),
            options: message.options.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        info!("Dispatching command: {}", message.cmd);

        let state = self.state.clone();
        runtime.spawn(async move {
            let IpcMessage {
                cmd,
                callback,
                error,
                payload,
                options,
            } = message;
            let ctx = HostContext {
                cmd: cmd.clone(),
                options,
                callbacks: callbacks.clone(),
                events: state.events.clone(),
            };

            let answered = match state.dispatch(ctx, payload).await {
                Ok(value) => callbacks.run(callback, value),
                Err(payload) => {
                    debug!("Command {} rejected: {}", cmd, payload);
                    callbacks.run(error, payload)
                }
            };
            if !answered {
                debug!("Caller of {} is gone, reply dropped", cmd);
            }
        });
        Ok(())
    }
}

impl HostState {
    async fn dispatch(&self, ctx: HostContext, payload: Value) -> HostReply {
        if self.emulate_events {
            if let Some(action) = event_action(&ctx.cmd) {
                return self.events.handle(&ctx.callbacks, action, payload);
            }
        }

        let handler = self.registry.read().get(&ctx.cmd);
        if let Some(handler) = handler {
            return execute_with_protection(handler, ctx, payload).await;
        }

        let fallback = self.fallback.read().clone();
        if let Some(fallback) = fallback {
            return fallback(ctx.cmd, payload).await;
        }

        warn!("No handler for command: {}", ctx.cmd);
        Err(json!({ "message": format!("unknown command: {}", ctx.cmd) }))
    }
}

fn event_action(cmd: &str) -> Option<&str> {
    cmd.strip_prefix(EVENT_PREFIX)
}

async fn execute_with_protection(
    handler: Arc<dyn CommandHandler>,
    ctx: HostContext,
    payload: Value,
) -> HostReply {
    let cmd = ctx.cmd.clone();
    let task = tokio::spawn(async move { handler.handle(ctx, payload).await });

    match task.await {
        Ok(reply) => reply,
        Err(join_err) => {
            if join_err.is_panic() {
                error!("Handler for {} panicked", cmd);
                Err(json!({ "message": format!("handler panicked: {}", cmd) }))
            } else {
                error!("Handler for {} cancelled", cmd);
                Err(json!({ "message": format!("handler cancelled: {}", cmd) }))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use hostlink_bridge::BridgeError;

    #[tokio::test]
    async fn test_registered_handler_answers() {
        let host = MockHost::new();
        host.respond("plugin:app|name", json!("hostlink")).unwrap();
        let client = host.connect();

        let name: String = client.invoke("plugin:app|name", (), None).await.unwrap();
        assert_eq!(name, "hostlink");
        assert_eq!(host.calls_for("plugin:app|name").len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_command_rejected() {
        let host = MockHost::new();
        let client = host.connect();

        let err = client
            .invoke::<Value, _>("plugin:nope|nothing", (), None)
            .await
            .unwrap_err();
        let rejection = err.rejection().unwrap();
        assert_eq!(
            rejection.message(),
            Some("unknown command: plugin:nope|nothing")
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_rejection() {
        let host = MockHost::new();
        host.handle("boom", |_ctx, payload: Value| async move {
            if payload.is_object() {
                panic!("handler blew up");
            }
            Ok(payload)
        })
        .unwrap();
        let client = host.connect();

        let err = client.invoke::<Value, _>("boom", (), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Rejected(_)));
        assert_eq!(err.rejection().unwrap().message(), Some("handler panicked: boom"));
    }

    #[tokio::test]
    async fn test_empty_handler_name_refused() {
        let host = MockHost::new();
        let err = host.respond("  ", json!(null)).unwrap_err();
        assert!(matches!(err, MockError::InvalidHandler(_)));
    }

    #[tokio::test]
    async fn test_call_log_keeps_options() {
        let host = MockHost::new();
        host.respond("cmd", json!(true)).unwrap();
        let client = host.connect();

        let options = InvokeOptions::new().with_header("x-trace", "42");
        let _: bool = client
            .invoke("cmd", json!({"a": 1}), Some(options.clone()))
            .await
            .unwrap();

        let calls = host.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].payload, json!({"a": 1}));
        assert_eq!(calls[0].options, Some(options));
        assert!(!calls[0].timestamp.is_empty());

        host.clear_calls();
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_fire_requires_connection() {
        let host = MockHost::new();
        assert_eq!(
            host.fire(CallbackId(1), json!(null)).unwrap_err(),
            MockError::NotConnected
        );
    }

    #[test]
    fn test_post_without_runtime_fails() {
        let host = MockHost::new();
        let client = host.connect();
        let message = IpcMessage {
            cmd: "cmd".to_string(),
            callback: CallbackId(1),
            error: CallbackId(2),
            payload: json!({}),
            options: None,
        };
        assert!(host.post(message, client.callbacks()).is_err());
        assert!(host.calls().is_empty());
    }
}
