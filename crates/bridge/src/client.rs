//! The command bridge client.

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::callbacks::{CallbackFn, CallbackRegistry, Callbacks};
use crate::channel::Channel;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, HostRejection};
use crate::internals::{self, AssetScheme, HostInternals, HostMetadata};
use crate::metrics::{self, InvokeTimer};
use crate::transport::IpcTransport;
use crate::types::{CallbackId, CommandName, InvokeOptions, IpcMessage};

struct ClientInner {
    transport: Arc<dyn IpcTransport>,
    callbacks: Callbacks,
    config: BridgeConfig,
    internals: RwLock<HostInternals>,
}

/// Handle to one bridge instance. Clones share the same registry and transport.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<ClientInner>,
}

/// Non-owning handle, used by callbacks that must talk back to the host
/// without keeping the client alive.
#[derive(Clone)]
pub struct WeakBridgeClient {
    inner: Weak<ClientInner>,
}

impl WeakBridgeClient {
    pub fn upgrade(&self) -> Option<BridgeClient> {
        self.inner.upgrade().map(|inner| BridgeClient { inner })
    }
}

type Reply = Result<Value, Value>;

/// Unregisters both reply callbacks once the request is settled or abandoned.
struct PendingGuard {
    callbacks: Callbacks,
    resolve: CallbackId,
    reject: CallbackId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.callbacks.unregister(self.resolve);
        self.callbacks.unregister(self.reject);
    }
}

impl BridgeClient {
    pub fn new(transport: Arc<dyn IpcTransport>) -> Self {
        Self::with_config(transport, BridgeConfig::default())
    }

    pub fn with_config(transport: Arc<dyn IpcTransport>, config: BridgeConfig) -> Self {
        let callbacks = Arc::new(CallbackRegistry::new(
            config.id_strategy,
            config.max_id_retries,
        ));
        let internals = HostInternals {
            metadata: None,
            asset_scheme: config.asset_scheme,
        };

        Self {
            inner: Arc::new(ClientInner {
                transport,
                callbacks,
                config,
                internals: RwLock::new(internals),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakBridgeClient {
        WeakBridgeClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// The registry shared with the transport.
    pub fn callbacks(&self) -> Callbacks {
        self.inner.callbacks.clone()
    }

    /// Invoke `command` and deserialize the host's answer into `T`.
    pub async fn invoke<T, A>(
        &self,
        command: &str,
        args: A,
        options: Option<InvokeOptions>,
    ) -> Result<T, BridgeError>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        let value = self.invoke_raw(command, args, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Invoke `command` and return the host's answer untouched.
    ///
    /// Arguments must serialize to a JSON object; `()` and `None` are sent as `{}`.
    /// Argument problems fail here, before anything is posted to the host.
    pub async fn invoke_raw<A>(
        &self,
        command: &str,
        args: A,
        options: Option<InvokeOptions>,
    ) -> Result<Value, BridgeError>
    where
        A: Serialize,
    {
        let cmd = CommandName::new(command)?;
        let payload = normalize_args(args)?;

        let (tx, rx) = oneshot::channel::<Reply>();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let resolve = self
            .inner
            .callbacks
            .register(reply_handler(slot.clone(), Ok), true);
        let reject = self
            .inner
            .callbacks
            .register(reply_handler(slot, Err), true);
        let _guard = PendingGuard {
            callbacks: self.inner.callbacks.clone(),
            resolve,
            reject,
        };

        if self.inner.config.log_payloads {
            debug!(command = %cmd, callback = %resolve, error = %reject, payload = %payload, "Sending invoke");
        } else {
            debug!(command = %cmd, callback = %resolve, error = %reject, "Sending invoke");
        }

        let message = IpcMessage {
            cmd: cmd.to_string(),
            callback: resolve,
            error: reject,
            payload,
            options,
        };

        metrics::record_invoke();
        let _timer = InvokeTimer::start();
        self.inner
            .transport
            .post(message, self.inner.callbacks.clone())?;

        match rx.await {
            Ok(Ok(value)) => {
                if self.inner.config.log_payloads {
                    debug!(command = %cmd, result = %value, "Invoke resolved");
                } else {
                    debug!(command = %cmd, "Invoke resolved");
                }
                Ok(value)
            }
            Ok(Err(payload)) => {
                let rejection = HostRejection::new(payload);
                warn!(command = %cmd, rejection = %rejection, "Host rejected invoke");
                metrics::record_rejection();
                Err(BridgeError::Rejected(rejection))
            }
            Err(_) => {
                warn!(command = %cmd, "Invoke abandoned by transport");
                Err(BridgeError::Canceled)
            }
        }
    }

    /// Register a raw callback and return the id the host should call.
    pub fn transform_callback<F>(&self, handler: F, once: bool) -> CallbackId
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.inner.callbacks.register(Arc::new(handler), once)
    }

    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        self.inner.callbacks.unregister(id)
    }

    /// Create a persistent channel. Every host delivery is decoded into `T`.
    pub fn channel<T, F>(&self, handler: F) -> Channel<T>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = self
            .inner
            .callbacks
            .register(typed_handler(handler), false);
        Channel::new(id, self.inner.callbacks.clone())
    }

    /// Create a channel that observes only its first delivery that decodes as `T`.
    pub fn channel_once<T, F>(&self, handler: F) -> Channel<T>
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let id = self.register_once(handler);
        Channel::new(id, self.inner.callbacks.clone())
    }

    /// Register `handler` for the first payload that decodes as `T`.
    ///
    /// Undecodable deliveries leave the entry live. On the first decoded one the
    /// entry is unregistered before `handler` runs.
    pub(crate) fn register_once<T, F>(&self, handler: F) -> CallbackId
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let own_id: Arc<Mutex<Option<CallbackId>>> = Arc::new(Mutex::new(None));
        let registry = Arc::downgrade(&self.inner.callbacks);
        let handler = Mutex::new(Some(handler));

        let slot = own_id.clone();
        let id = self.inner.callbacks.register(
            typed_handler(move |value: T| {
                let Some(handler) = handler.lock().take() else {
                    return;
                };
                if let (Some(registry), Some(id)) = (registry.upgrade(), *slot.lock()) {
                    registry.unregister(id);
                }
                handler(value);
            }),
            false,
        );
        *own_id.lock() = Some(id);
        id
    }

    pub fn metadata(&self) -> Option<HostMetadata> {
        self.inner.internals.read().metadata.clone()
    }

    pub fn set_metadata(&self, metadata: Option<HostMetadata>) {
        self.inner.internals.write().metadata = metadata;
    }

    pub fn asset_scheme(&self) -> Option<AssetScheme> {
        self.inner.internals.read().asset_scheme
    }

    pub fn set_asset_scheme(&self, scheme: Option<AssetScheme>) {
        self.inner.internals.write().asset_scheme = scheme;
    }

    /// Build the URL under which the host serves `file_path`.
    pub fn convert_file_src(
        &self,
        file_path: &str,
        protocol: Option<&str>,
    ) -> Result<String, BridgeError> {
        let scheme = self.asset_scheme().ok_or_else(|| {
            BridgeError::Unavailable("no asset scheme configured".to_string())
        })?;
        Ok(internals::convert_file_src(
            scheme,
            file_path,
            protocol.unwrap_or(internals::DEFAULT_ASSET_PROTOCOL),
        ))
    }
}

fn normalize_args<A: Serialize>(args: A) -> Result<Value, BridgeError> {
    match serde_json::to_value(args) {
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(BridgeError::InvalidArgs(format!(
            "arguments must serialize to a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(BridgeError::InvalidArgs(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn reply_handler(
    slot: Arc<Mutex<Option<oneshot::Sender<Reply>>>>,
    wrap: fn(Value) -> Reply,
) -> CallbackFn {
    Arc::new(move |value| {
        if let Some(tx) = slot.lock().take() {
            let _ = tx.send(wrap(value));
        }
    })
}

pub(crate) fn typed_handler<T, F>(handler: F) -> CallbackFn
where
    T: DeserializeOwned + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(move |payload: Value| match serde_json::from_value::<T>(payload) {
        Ok(value) => {
            metrics::record_channel_delivery();
            handler(value);
        }
        Err(e) => warn!(error = %e, "Dropping undecodable channel payload"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::IdStrategy;
    use crate::transport::TransportError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every message synchronously from a fixed closure.
    struct EchoTransport {
        posted: Arc<AtomicUsize>,
    }

    impl IpcTransport for EchoTransport {
        fn post(&self, message: IpcMessage, callbacks: Callbacks) -> Result<(), TransportError> {
            self.posted.fetch_add(1, Ordering::SeqCst);
            match message.cmd.as_str() {
                "fail" => callbacks.run(message.error, json!({"message": "boom"})),
                "drop" => {
                    callbacks.unregister(message.callback);
                    callbacks.unregister(message.error)
                }
                _ => callbacks.run(message.callback, message.payload),
            };
            Ok(())
        }
    }

    struct ClosedTransport;

    impl IpcTransport for ClosedTransport {
        fn post(&self, _message: IpcMessage, _callbacks: Callbacks) -> Result<(), TransportError> {
            Err(TransportError::Closed)
        }
    }

    fn echo_client() -> (BridgeClient, Arc<AtomicUsize>) {
        let posted = Arc::new(AtomicUsize::new(0));
        let client = BridgeClient::new(Arc::new(EchoTransport {
            posted: posted.clone(),
        }));
        (client, posted)
    }

    #[tokio::test]
    async fn test_invoke_resolves_with_host_value() {
        let (client, _) = echo_client();
        let value: Value = client
            .invoke("echo", json!({"a": 1}), None)
            .await
            .unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_unit_args_become_empty_object() {
        let (client, _) = echo_client();
        let value = client.invoke_raw("echo", (), None).await.unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_rejection_forwarded() {
        let (client, _) = echo_client();
        let err = client.invoke_raw("fail", (), None).await.unwrap_err();
        let rejection = err.rejection().unwrap();
        assert_eq!(rejection.payload(), &json!({"message": "boom"}));
    }

    #[tokio::test]
    async fn test_non_object_args_never_reach_host() {
        let (client, posted) = echo_client();
        let err = client.invoke_raw("echo", json!([1, 2]), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgs(_)));
        assert_eq!(posted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_command_never_reaches_host() {
        let (client, posted) = echo_client();
        let err = client.invoke_raw("", (), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidCommand));
        assert_eq!(posted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reply_callbacks_released_after_settle() {
        let (client, _) = echo_client();
        client.invoke_raw("echo", (), None).await.unwrap();
        client.invoke_raw("fail", (), None).await.unwrap_err();
        assert!(client.callbacks().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_replies_cancel() {
        let (client, _) = echo_client();
        let err = client.invoke_raw("drop", (), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Canceled));
    }

    #[tokio::test]
    async fn test_closed_transport_surfaces_error() {
        let client = BridgeClient::new(Arc::new(ClosedTransport));
        let err = client.invoke_raw("anything", (), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(TransportError::Closed)));
        assert!(client.callbacks().is_empty());
    }

    #[tokio::test]
    async fn test_result_shape_mismatch() {
        let (client, _) = echo_client();
        let err = client
            .invoke::<u32, _>("echo", json!({"not": "a number"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Serde(_)));
    }

    #[test]
    fn test_channel_decodes_payloads() {
        let (client, _) = echo_client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let channel = {
            let seen = seen.clone();
            client.channel(move |n: u32| seen.lock().push(n))
        };

        let callbacks = client.callbacks();
        assert!(callbacks.run(channel.id(), json!(1)));
        assert!(callbacks.run(channel.id(), json!("not a number")));
        assert!(callbacks.run(channel.id(), json!(3)));
        assert_eq!(*seen.lock(), vec![1, 3]);
    }

    #[test]
    fn test_channel_once_fires_once() {
        let (client, _) = echo_client();
        let hits = Arc::new(AtomicUsize::new(0));
        let channel = {
            let hits = hits.clone();
            client.channel_once(move |_: Value| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        let callbacks = client.callbacks();
        assert!(callbacks.run(channel.id(), json!(1)));
        assert!(!callbacks.run(channel.id(), json!(2)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_once_skips_undecodable_delivery() {
        let (client, _) = echo_client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let channel = {
            let seen = seen.clone();
            client.channel_once(move |n: u32| seen.lock().push(n))
        };

        let callbacks = client.callbacks();
        assert!(callbacks.run(channel.id(), json!("not a number")));
        assert!(channel.is_registered());
        assert!(callbacks.run(channel.id(), json!(5)));
        assert!(!channel.is_registered());
        assert!(!callbacks.run(channel.id(), json!(6)));
        assert_eq!(*seen.lock(), vec![5]);
    }

    #[test]
    fn test_sequential_config_applies_to_registry() {
        let config = BridgeConfig {
            id_strategy: IdStrategy::Sequential,
            ..BridgeConfig::default()
        };
        let client = BridgeClient::with_config(
            Arc::new(EchoTransport {
                posted: Arc::new(AtomicUsize::new(0)),
            }),
            config,
        );
        assert_eq!(client.transform_callback(|_| {}, false), CallbackId(1));
    }

    #[test]
    fn test_convert_file_src_requires_scheme() {
        let (client, _) = echo_client();
        assert!(matches!(
            client.convert_file_src("/a", None),
            Err(BridgeError::Unavailable(_))
        ));

        client.set_asset_scheme(Some(AssetScheme::Custom));
        assert_eq!(
            client.convert_file_src("/a", None).unwrap(),
            "asset://localhost/%2Fa"
        );
    }

    #[test]
    fn test_weak_handle_does_not_keep_client_alive() {
        let (client, _) = echo_client();
        let weak = client.downgrade();
        assert!(weak.upgrade().is_some());
        drop(client);
        assert!(weak.upgrade().is_none());
    }
}
