use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::CommandHandler;

pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Later registrations for the same command replace earlier ones.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> &mut Self {
        self.handlers.insert(handler.name().to_string(), handler);
        self
    }

    /// Remove the handler for `name`. Returns `false` if none was set.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    /// Get the handler for a command.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    /// List registered command names.
    pub fn list(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Number of registered handlers.
    pub fn count(&self) -> usize {
        self.handlers.len()
    }

    /// Remove all handlers.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::StaticHandler;
    use serde_json::json;

    #[test]
    fn test_register_and_get() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(StaticHandler::resolve("plugin:app|version", json!("1.2.3"))));

        assert!(registry.get("plugin:app|version").is_some());
        assert!(registry.get("plugin:app|name").is_none());
    }

    #[test]
    fn test_chainable_and_count() {
        let mut registry = HandlerRegistry::new();
        assert_eq!(registry.count(), 0);
        registry
            .register(Arc::new(StaticHandler::resolve("a", json!(1))))
            .register(Arc::new(StaticHandler::resolve("b", json!(2))));
        assert_eq!(registry.count(), 2);

        let names = registry.list();
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
    }

    #[test]
    fn test_replace_and_unregister() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(StaticHandler::resolve("a", json!(1))));
        registry.register(Arc::new(StaticHandler::reject("a", json!("no"))));
        assert_eq!(registry.count(), 1);

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.count(), 0);
    }
}
