//! Method name to handler mapping.

use std::collections::HashMap;
use std::sync::Arc;

use super::Handler;

/// Registry of named methods.
///
/// Built once with [`register`](MethodRegistry::register) calls, then
/// handed to the server; lookups after that are read-only, so no interior
/// locking is needed.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn Handler>>,
}

impl MethodRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method, consuming and returning the registry so calls chain.
    /// Re-registering a name replaces the previous handler.
    pub fn register(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        let name = name.into();
        if self.methods.insert(name.clone(), Arc::new(handler)).is_some() {
            tracing::warn!("method '{}' re-registered, replacing handler", name);
        }
        self
    }

    /// Look up a handler by method name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.methods.get(name).cloned()
    }

    /// Registered method names, in no particular order.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no methods are registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_register_and_lookup() {
        let registry = MethodRegistry::new()
            .register("echo", |params: Vec<Value>| async move {
                Ok(Value::Array(params))
            })
            .register("ping", |_: Vec<Value>| async { Ok(json!("pong")) });

        assert_eq!(registry.len(), 2);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_reregister_replaces() {
        let registry = MethodRegistry::new()
            .register("m", |_: Vec<Value>| async { Ok(json!(1)) })
            .register("m", |_: Vec<Value>| async { Ok(json!(2)) });

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_looked_up_handler_is_callable() {
        let registry = MethodRegistry::new()
            .register("sum", |params: Vec<Value>| async move {
                let total: i64 = params.iter().filter_map(Value::as_i64).sum();
                Ok(json!(total))
            });

        let handler = registry.get("sum").unwrap();
        let result = handler.call(vec![json!(1), json!(2), json!(3)]).await;
        assert_eq!(result.unwrap(), json!(6));
    }
}
