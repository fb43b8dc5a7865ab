// SPDX-License-Identifier: MIT

use crate::error::ExecuteError;
use crate::function::{Arguments, FunctionDef};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Catalog of registered functions, looked up by slug.
///
/// Clones share the same table, so one registry can be handed to the wiring
/// layer, the builders and the engine.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: Arc<RwLock<HashMap<String, Arc<FunctionDef>>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a definition; a later registration under the same slug wins
    pub fn register(&self, def: FunctionDef) {
        let mut functions = self
            .functions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let slug = def.slug.clone();
        if functions.insert(slug.clone(), Arc::new(def)).is_some() {
            log::debug!("Replaced function: {}", slug);
        } else {
            log::debug!("Registered function: {}", slug);
        }
    }

    pub fn get(&self, slug: &str) -> Option<Arc<FunctionDef>> {
        let functions = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        functions.get(slug).cloned()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.get(slug).is_some()
    }

    /// Invoke a function by slug; failures of the function pass through unchanged
    pub fn execute(&self, slug: &str, args: &Arguments) -> Result<Value, ExecuteError> {
        let def = self
            .get(slug)
            .ok_or_else(|| ExecuteError::UnknownFunction {
                slug: slug.to_string(),
            })?;
        def.execute(args).map_err(ExecuteError::Function)
    }

    /// Registered slugs, sorted
    pub fn slugs(&self) -> Vec<String> {
        let functions = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut slugs: Vec<String> = functions.keys().cloned().collect();
        slugs.sort();
        slugs
    }

    pub fn len(&self) -> usize {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registration
    pub fn clear(&self) {
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("slugs", &self.slugs())
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FunctionError;
    use serde_json::json;

    fn constant(slug: &str, value: Value) -> FunctionDef {
        FunctionDef::new(slug).with_executable(move |_: &Arguments| Ok(value.clone()))
    }

    #[test]
    fn test_register_and_get_function() {
        let registry = FunctionRegistry::new();
        registry.register(constant("test_fn", json!(1)));

        let retrieved = registry.get("test_fn");
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().slug, "test_fn");
    }

    #[test]
    fn test_get_nonexistent_function() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_register_overwrites_existing() {
        let registry = FunctionRegistry::new();
        registry.register(constant("same_name", json!("first")));
        registry.register(constant("same_name", json!("second")));

        assert_eq!(registry.len(), 1);
        let result = registry.execute("same_name", &Arguments::new()).unwrap();
        assert_eq!(result, json!("second"));
    }

    #[test]
    fn test_execute_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.execute("missing", &Arguments::new()).unwrap_err();
        assert!(matches!(err, ExecuteError::UnknownFunction { ref slug } if slug == "missing"));
    }

    #[test]
    fn test_execute_propagates_failure_unchanged() {
        let registry = FunctionRegistry::new();
        registry.register(FunctionDef::new("fails").with_executable(
            |_: &Arguments| -> Result<Value, FunctionError> { Err("bad input".into()) },
        ));

        match registry.execute("fails", &Arguments::new()) {
            Err(ExecuteError::Function(cause)) => assert_eq!(cause.to_string(), "bad input"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_execute_passes_keyword_arguments() {
        let registry = FunctionRegistry::new();
        registry.register(FunctionDef::new("echo").with_executable(|args: &Arguments| {
            Ok(args.value("x").cloned().unwrap_or(Value::Null))
        }));

        let args: Arguments = [("x", json!([1, 2]))].into_iter().collect();
        assert_eq!(registry.execute("echo", &args).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_clear_removes_everything() {
        let registry = FunctionRegistry::new();
        registry.register(constant("a", json!(1)));
        registry.register(constant("b", json!(2)));
        assert_eq!(registry.slugs(), vec!["a".to_string(), "b".to_string()]);

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_registry_is_clone() {
        let registry = FunctionRegistry::new();
        registry.register(constant("fn1", json!(1)));

        let cloned = registry.clone();
        assert!(cloned.contains("fn1"));

        // Registering on clone should be visible to original
        cloned.register(constant("fn2", json!(2)));
        assert!(registry.contains("fn2"));
    }
}
