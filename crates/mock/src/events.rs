//! In-memory stand-in for the host's event plugin.

use hostlink_bridge::{CallbackId, Callbacks};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::handler::HostReply;

struct Registration {
    event_id: u32,
    callback: CallbackId,
    target: Option<String>,
}

#[derive(Default)]
struct HubState {
    next_id: u32,
    listeners: HashMap<String, Vec<Registration>>,
}

#[derive(Default)]
pub struct EventHub {
    state: Mutex<HubState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenArgs {
    event: String,
    #[serde(default)]
    window_label: Option<String>,
    handler: CallbackId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlistenArgs {
    event: String,
    event_id: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmitArgs {
    event: String,
    #[serde(default)]
    window_label: Option<String>,
    #[serde(default)]
    payload: Value,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, event: &str, target: Option<String>, callback: CallbackId) -> u32 {
        let mut state = self.state.lock();
        state.next_id += 1;
        let event_id = state.next_id;
        state
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(Registration {
                event_id,
                callback,
                target,
            });
        event_id
    }

    pub fn unlisten(&self, event: &str, event_id: u32) -> bool {
        let mut state = self.state.lock();
        let Some(registrations) = state.listeners.get_mut(event) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.event_id != event_id);
        before != registrations.len()
    }

    /// Deliver `payload` to the listeners of `event`. With a `target`, only
    /// listeners bound to that label or to no label receive it.
    /// Returns how many callbacks were still live.
    pub fn emit(
        &self,
        callbacks: &Callbacks,
        event: &str,
        target: Option<&str>,
        payload: Value,
    ) -> usize {
        let deliveries: Vec<(CallbackId, Value)> = {
            let state = self.state.lock();
            state
                .listeners
                .get(event)
                .map(|registrations| {
                    registrations
                        .iter()
                        .filter(|r| match (target, r.target.as_deref()) {
                            (Some(wanted), Some(bound)) => wanted == bound,
                            _ => true,
                        })
                        .map(|r| {
                            let mut delivered = json!({
                                "event": event,
                                "id": r.event_id,
                                "payload": payload.clone(),
                            });
                            if let Some(label) = &r.target {
                                delivered["windowLabel"] = json!(label);
                            }
                            (r.callback, delivered)
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let delivered = deliveries
            .into_iter()
            .filter(|(callback, body)| callbacks.run(*callback, body.clone()))
            .count();
        debug!(event, delivered, "Emitted event");
        delivered
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .listeners
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Serve one `plugin:event|<action>` command.
    pub(crate) fn handle(&self, callbacks: &Callbacks, action: &str, payload: Value) -> HostReply {
        match action {
            "listen" => {
                let args: ListenArgs = parse(payload)?;
                Ok(json!(self.listen(&args.event, args.window_label, args.handler)))
            }
            "unlisten" => {
                let args: UnlistenArgs = parse(payload)?;
                self.unlisten(&args.event, args.event_id);
                Ok(Value::Null)
            }
            "emit" => {
                let args: EmitArgs = parse(payload)?;
                self.emit(callbacks, &args.event, args.window_label.as_deref(), args.payload);
                Ok(Value::Null)
            }
            other => Err(json!({ "message": format!("unknown event action: {}", other) })),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, Value> {
    serde_json::from_value(payload).map_err(|e| json!({ "message": e.to_string() }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use hostlink_bridge::{CallbackRegistry, IdStrategy};
    use std::sync::Arc;

    fn recording(callbacks: &Callbacks, sink: Arc<Mutex<Vec<Value>>>) -> CallbackId {
        callbacks.register(Arc::new(move |v| sink.lock().push(v)), false)
    }

    #[test]
    fn test_emit_reaches_listeners() {
        let callbacks: Callbacks = Arc::new(CallbackRegistry::new(IdStrategy::Sequential, 0));
        let hub = EventHub::new();
        let sink = Arc::new(Mutex::new(Vec::new()));
        let callback = recording(&callbacks, sink.clone());

        let event_id = hub.listen("ready", None, callback);
        assert_eq!(hub.emit(&callbacks, "ready", None, json!(1)), 1);
        assert_eq!(
            sink.lock()[0],
            json!({"event": "ready", "id": event_id, "payload": 1})
        );
    }

    #[test]
    fn test_target_filtering() {
        let callbacks: Callbacks = Arc::new(CallbackRegistry::new(IdStrategy::Sequential, 0));
        let hub = EventHub::new();
        let main = Arc::new(Mutex::new(Vec::new()));
        let other = Arc::new(Mutex::new(Vec::new()));
        let main_cb = recording(&callbacks, main.clone());
        let other_cb = recording(&callbacks, other.clone());

        hub.listen("resize", Some("main".to_string()), main_cb);
        hub.listen("resize", Some("other".to_string()), other_cb);

        assert_eq!(hub.emit(&callbacks, "resize", Some("main"), json!({})), 1);
        assert_eq!(main.lock().len(), 1);
        assert!(other.lock().is_empty());
        assert_eq!(main.lock()[0]["windowLabel"], "main");
    }

    #[test]
    fn test_unlisten() {
        let callbacks: Callbacks = Arc::new(CallbackRegistry::new(IdStrategy::Sequential, 0));
        let hub = EventHub::new();
        let sink = Arc::new(Mutex::new(Vec::new()));
        let event_id = hub.listen("x", None, recording(&callbacks, sink.clone()));

        assert!(hub.unlisten("x", event_id));
        assert!(!hub.unlisten("x", event_id));
        assert_eq!(hub.listener_count("x"), 0);
        assert_eq!(hub.emit(&callbacks, "x", None, json!(null)), 0);
    }

    #[test]
    fn test_window_label_scopes_commands() {
        let callbacks: Callbacks = Arc::new(CallbackRegistry::new(IdStrategy::Sequential, 0));
        let hub = EventHub::new();
        let sink = Arc::new(Mutex::new(Vec::new()));
        let callback = recording(&callbacks, sink.clone());

        hub.handle(
            &callbacks,
            "listen",
            json!({"event": "resize", "windowLabel": "main", "handler": callback}),
        )
        .unwrap();
        hub.handle(
            &callbacks,
            "emit",
            json!({"event": "resize", "windowLabel": "other", "payload": 1}),
        )
        .unwrap();
        assert!(sink.lock().is_empty());

        hub.handle(
            &callbacks,
            "emit",
            json!({"event": "resize", "windowLabel": "main", "payload": 2}),
        )
        .unwrap();
        assert_eq!(sink.lock()[0]["payload"], 2);
        assert_eq!(sink.lock()[0]["windowLabel"], "main");
    }

    #[test]
    fn test_bad_listen_args_rejected() {
        let callbacks: Callbacks = Arc::new(CallbackRegistry::new(IdStrategy::Sequential, 0));
        let hub = EventHub::new();
        let reply = hub.handle(&callbacks, "listen", json!({"event": "x"}));
        assert!(reply.is_err());
    }
}
