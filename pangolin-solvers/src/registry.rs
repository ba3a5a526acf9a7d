//! Name-based linear solver selection.
//!
//! Solvers are plain objects created through explicitly registered
//! factories; nothing is registered globally or at load time.

use std::collections::HashMap;

use crate::adapter::LinearSolver;
use crate::dense_lu::DenseLu;
use crate::sparse_lu::SparseLu;

type SolverFactory = Box<dyn Fn() -> Box<dyn LinearSolver> + Send + Sync>;

/// Maps solver names to factories producing fresh [`LinearSolver`] instances.
pub struct SolverRegistry {
    factories: HashMap<String, SolverFactory>,
}

impl SolverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        SolverRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in solvers
    /// (`"dense-lu"`, `"sparse-lu"`).
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register("dense-lu", || Box::new(DenseLu::new()));
        r.register("sparse-lu", || Box::new(SparseLu::new()));
        r
    }

    /// Register a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn LinearSolver> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Create a fresh solver, or `None` if the name is unknown.
    pub fn create(&self, name: &str) -> Option<Box<dyn LinearSolver>> {
        self.factories.get(name).map(|f| f())
    }

    /// Registered solver names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let r = SolverRegistry::with_builtins();
        assert_eq!(r.names(), vec!["dense-lu", "sparse-lu"]);
        assert!(r.create("dense-lu").is_some());
        assert!(r.create("qr").is_none());
    }
}
