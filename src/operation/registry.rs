//! Operation kind registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::delete_checkpoint::DeleteCheckpointOperation;
use super::error::{OperationError, Result};
use super::protect::ProtectOperation;
use super::Operation;

/// Maps kind tags to operation implementations.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operation kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ProtectOperation));
        registry.register(Arc::new(DeleteCheckpointOperation));
        registry
    }

    /// Register `operation` under its kind, returning the one it replaced.
    pub fn register(&mut self, operation: Arc<dyn Operation>) -> Option<Arc<dyn Operation>> {
        self.operations.insert(operation.kind(), operation)
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(kind).cloned()
    }

    /// Like [`get`](Self::get) but errors with `UnknownKind`.
    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn Operation>> {
        self.get(kind)
            .ok_or_else(|| OperationError::UnknownKind(kind.to_string()))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.operations.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_builtin_kinds() {
        let registry = OperationRegistry::with_defaults();
        assert_eq!(registry.kinds(), vec!["delete_checkpoint", "protect"]);
        assert_eq!(registry.resolve("protect").unwrap().kind(), "protect");
    }

    #[test]
    fn resolve_unknown_kind() {
        let registry = OperationRegistry::new();
        let err = registry.resolve("restore").err().unwrap();
        assert!(matches!(err, OperationError::UnknownKind(kind) if kind == "restore"));
    }

    #[test]
    fn register_replaces_existing_kind() {
        let mut registry = OperationRegistry::with_defaults();
        let replaced = registry.register(Arc::new(ProtectOperation));
        assert!(replaced.is_some());
        assert_eq!(registry.kinds().len(), 2);
    }
}
