//! Callback registry: integer ids the host uses to call back into the client.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::IdStrategy;
use crate::types::CallbackId;

pub type CallbackFn = Arc<dyn Fn(Value) + Send + Sync>;

/// Shared handle to a registry. Cloned into every transport call.
pub type Callbacks = Arc<CallbackRegistry>;

struct Entry {
    handler: CallbackFn,
    once: bool,
}

/// Source of random id draws.
pub type IdSource = Box<dyn RngCore + Send>;

struct RegistryState {
    entries: HashMap<CallbackId, Entry>,
    counter: u32,
    rng: IdSource,
}

pub struct CallbackRegistry {
    state: Mutex<RegistryState>,
    strategy: IdStrategy,
    max_retries: u32,
}

impl CallbackRegistry {
    /// Registry seeded from OS entropy.
    pub fn new(strategy: IdStrategy, max_retries: u32) -> Self {
        Self::with_rng(strategy, max_retries, Box::new(StdRng::from_entropy()))
    }

    /// Registry drawing random ids from `rng` instead of an entropy-seeded generator.
    pub fn with_rng(strategy: IdStrategy, max_retries: u32, rng: IdSource) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                counter: 0,
                rng,
            }),
            strategy,
            max_retries,
        }
    }

    /// Insert `handler` under a fresh id that is not live at this instant.
    pub fn register(&self, handler: CallbackFn, once: bool) -> CallbackId {
        let mut state = self.state.lock();
        let id = self.allocate(&mut state);
        state.entries.insert(id, Entry { handler, once });
        trace!(callback = %id, once, live = state.entries.len(), "Registered callback");
        id
    }

    fn allocate(&self, state: &mut RegistryState) -> CallbackId {
        if self.strategy == IdStrategy::Random {
            for _ in 0..=self.max_retries {
                let candidate = CallbackId(state.rng.next_u32());
                if !state.entries.contains_key(&candidate) {
                    return candidate;
                }
            }
            debug!(
                retries = self.max_retries,
                "Random callback ids exhausted, falling back to counter"
            );
        }

        loop {
            state.counter = state.counter.wrapping_add(1);
            let candidate = CallbackId(state.counter);
            if !state.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn unregister(&self, id: CallbackId) -> bool {
        let removed = self.state.lock().entries.remove(&id).is_some();
        if removed {
            trace!(callback = %id, "Unregistered callback");
        }
        removed
    }

    /// Deliver `payload` to `id`. Returns `false` when the id is not live.
    ///
    /// One-shot entries leave the registry before their handler runs. The lock is
    /// released before the handler is called, so handlers may register or
    /// unregister callbacks themselves.
    pub fn run(&self, id: CallbackId, payload: Value) -> bool {
        let handler = {
            let mut state = self.state.lock();
            let once = match state.entries.get(&id) {
                Some(entry) => entry.once,
                None => {
                    trace!(callback = %id, "Dropping delivery to unknown callback");
                    return false;
                }
            };
            if once {
                state.entries.remove(&id).map(|entry| entry.handler)
            } else {
                state.entries.get(&id).map(|entry| entry.handler.clone())
            }
        };

        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: CallbackId) -> bool {
        self.state.lock().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<CallbackId> {
        self.state.lock().entries.keys().copied().collect()
    }
}
