use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::common::TypedValue;
use crate::errors::{ErrorKind, GeoFilterError, GeoFilterResult};

/// Implementation of a filter function.
///
/// Arguments arrive as the value sets of the parameter expressions, in
/// order. The result must hold at least one value.
pub trait FunctionProvider: Send + Sync {
    /// Name the function is called by in filters.
    fn name(&self) -> &str;

    fn evaluate(&self, args: &[Vec<TypedValue>]) -> GeoFilterResult<Vec<TypedValue>>;
}

/// Functions known to an evaluator, keyed by name.
///
/// Clones share the same table, so a registry handed to several evaluators
/// sees functions registered later.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: Arc<RwLock<HashMap<String, Arc<dyn FunctionProvider>>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function`, replacing any function with the same name.
    pub fn register<F: FunctionProvider + 'static>(&self, function: F) {
        let name = function.name().to_string();
        log::debug!("Registering filter function '{}'", name);
        self.functions.write().insert(name, Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Calls the function `name`.
    ///
    /// Unknown names fail with [`ErrorKind::NotImplemented`]; an empty result
    /// fails with [`ErrorKind::EvaluationError`].
    pub fn call(&self, name: &str, args: &[Vec<TypedValue>]) -> GeoFilterResult<Vec<TypedValue>> {
        let function = self.functions.read().get(name).cloned();
        match function {
            Some(function) => {
                let result = function.evaluate(args)?;
                if result.is_empty() {
                    log::error!("Function '{}' returned no value", name);
                    return Err(GeoFilterError::new(
                        &format!("Function '{}' returned no value", name),
                        ErrorKind::EvaluationError,
                    ));
                }
                Ok(result)
            }
            None => {
                log::error!("Function '{}' is not implemented", name);
                Err(GeoFilterError::new(
                    &format!("Function '{}' is not implemented", name),
                    ErrorKind::NotImplemented,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl FunctionProvider for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn evaluate(&self, args: &[Vec<TypedValue>]) -> GeoFilterResult<Vec<TypedValue>> {
            Ok(args
                .iter()
                .flatten()
                .map(|v| match v {
                    TypedValue::String(s) => TypedValue::String(s.to_uppercase()),
                    other => other.clone(),
                })
                .collect())
        }
    }

    #[test]
    fn test_unknown_function_is_not_implemented() {
        let registry = FunctionRegistry::new();
        let err = registry.call("area", &[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotImplemented);
    }

    #[test]
    fn test_registered_function_is_called() {
        let registry = FunctionRegistry::new();
        registry.register(Upper);
        assert!(registry.contains("upper"));
        let result = registry.call("upper", &[vec![TypedValue::from("abc")]]).unwrap();
        assert_eq!(result, vec![TypedValue::from("ABC")]);
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let registry = FunctionRegistry::new();
        registry.register(Upper);
        let err = registry.call("upper", &[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EvaluationError);
    }

    #[test]
    fn test_clones_share_table() {
        let registry = FunctionRegistry::new();
        let clone = registry.clone();
        registry.register(Upper);
        assert!(clone.contains("upper"));
    }
}
