//! Query execution backends.
//!
//! Modules:
//! - `memory`: In-memory entity store evaluating queries locally
//!
//! A backend answers select queries for one or more shapes. The
//! [`BackendRegistry`] resolves the backend for a target shape, falling back
//! to a process-wide default. An empty registry means "no data backend":
//! bound views then skip binding and pass caller input straight through.

mod memory;

use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tether_types::{QueryDescriptor, QueryResponse, ShapeId};

pub use memory::{Fixture, FixtureError, InMemoryBackend, StoredEntity};

/// Executes select queries.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Runs `query` and answers with one record for single-entity subjects and
    /// a list otherwise. Failures are returned to the caller untouched.
    async fn select_query(&self, query: QueryDescriptor) -> Result<QueryResponse>;
}

/// Per-shape backend lookup with a default fallback.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    default: Option<Arc<dyn QueryBackend>>,
    by_shape: HashMap<ShapeId, Arc<dyn QueryBackend>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shapes: Vec<_> = self.by_shape.keys().map(ShapeId::as_str).collect();
        shapes.sort_unstable();
        f.debug_struct("BackendRegistry")
            .field("has_default", &self.default.is_some())
            .field("shapes", &shapes)
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `backend` as the default for every shape.
    pub fn with_default(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            default: Some(backend),
            by_shape: HashMap::new(),
        }
    }

    pub fn set_default(&mut self, backend: Arc<dyn QueryBackend>) {
        self.default = Some(backend);
    }

    pub fn clear_default(&mut self) {
        self.default = None;
    }

    /// Registers a backend used for `shape` instead of the default.
    pub fn register(&mut self, shape: impl Into<ShapeId>, backend: Arc<dyn QueryBackend>) {
        self.by_shape.insert(shape.into(), backend);
    }

    /// True when at least one backend is available to any shape.
    pub fn is_configured(&self) -> bool {
        self.default.is_some() || !self.by_shape.is_empty()
    }

    /// Backend for `shape`, falling back to the default.
    pub fn resolve(&self, shape: &ShapeId) -> Option<Arc<dyn QueryBackend>> {
        self.by_shape.get(shape).or(self.default.as_ref()).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyBackend;

    #[async_trait]
    impl QueryBackend for EmptyBackend {
        async fn select_query(&self, _query: QueryDescriptor) -> Result<QueryResponse> {
            Ok(QueryResponse::Many(Vec::new()))
        }
    }

    #[test]
    fn empty_registry_is_not_configured() {
        let registry = BackendRegistry::new();
        assert!(!registry.is_configured());
        assert!(registry.resolve(&"Person".into()).is_none());
    }

    #[test]
    fn shape_backend_wins_over_default() {
        let default: Arc<dyn QueryBackend> = Arc::new(EmptyBackend);
        let cats: Arc<dyn QueryBackend> = Arc::new(EmptyBackend);
        let mut registry = BackendRegistry::with_default(Arc::clone(&default));
        registry.register("Cat", Arc::clone(&cats));

        let resolved = registry.resolve(&"Cat".into()).expect("cat backend");
        assert!(Arc::ptr_eq(&resolved, &cats));
        let resolved = registry.resolve(&"Person".into()).expect("default backend");
        assert!(Arc::ptr_eq(&resolved, &default));
    }

    #[test]
    fn shape_only_registry_is_configured_but_cannot_serve_other_shapes() {
        let mut registry = BackendRegistry::new();
        registry.register("Cat", Arc::new(EmptyBackend));
        assert!(registry.is_configured());
        assert!(registry.resolve(&"Person".into()).is_none());
    }
}
