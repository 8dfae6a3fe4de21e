//! Registry of declared views, indexed by shape and by exported name.

use std::sync::Arc;

use indexmap::IndexMap;
use tether_types::ShapeId;
use tracing::{debug, warn};

use crate::{binding::Binding, declaration::{BoundView, ViewMetadata}};

/// Lookup table for registration tooling.
#[derive(Debug, Default, Clone)]
pub struct ViewRegistry {
    by_shape: IndexMap<ShapeId, Vec<Arc<ViewMetadata>>>,
    exports: IndexMap<String, Arc<ViewMetadata>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: Binding, R>(&mut self, view: &BoundView<B, R>) {
        self.register_metadata(Arc::clone(view.metadata()));
    }

    /// Indexes `metadata` by shape; named views are exported as well.
    /// Re-exporting a name replaces the earlier view.
    pub fn register_metadata(&mut self, metadata: Arc<ViewMetadata>) {
        let name = metadata.name().to_string();
        if !name.is_empty() {
            if let Some(previous) = self.exports.insert(name.clone(), Arc::clone(&metadata)) {
                warn!(view = %name, previous_shape = %previous.shape(), "view export replaced");
                if let Some(views) = self.by_shape.get_mut(previous.shape()) {
                    views.retain(|view| !Arc::ptr_eq(view, &previous));
                }
            }
        }
        debug!(view = %name, shape = %metadata.shape(), "view registered");
        self.by_shape.entry(metadata.shape().clone()).or_default().push(metadata);
    }

    /// Records that `type_name` serves `shape`. Returns false, with a
    /// warning, when the type is not linked to any shape.
    pub fn register_linked_type(&mut self, type_name: &str, shape: Option<&ShapeId>) -> bool {
        let Some(shape) = shape else {
            warn!(type_name, "Component {type_name} is not linked to a shape.");
            return false;
        };
        debug!(type_name, shape = %shape, "linked type registered");
        self.by_shape.entry(shape.clone()).or_default();
        true
    }

    pub fn views_for(&self, shape: &ShapeId) -> &[Arc<ViewMetadata>] {
        self.by_shape.get(shape).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ViewMetadata>> {
        self.exports.get(name)
    }

    pub fn exports(&self) -> impl Iterator<Item = &Arc<ViewMetadata>> {
        self.exports.values()
    }

    pub fn shapes(&self) -> impl Iterator<Item = &ShapeId> {
        self.by_shape.keys()
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tether_types::QueryDescriptor;

    use super::*;
    use crate::declaration::{QuerySpec, ViewKind};

    fn metadata(name: &str, shape: &str) -> Arc<ViewMetadata> {
        let spec = QuerySpec::from(QueryDescriptor::new(shape).select("name"));
        Arc::new(ViewMetadata::resolve(name, ViewKind::Entity, spec, 0).expect("metadata"))
    }

    #[test]
    fn views_are_indexed_by_shape_and_name() {
        let mut registry = ViewRegistry::new();
        registry.register_metadata(metadata("PersonCard", "Person"));
        registry.register_metadata(metadata("PersonRow", "Person"));
        registry.register_metadata(metadata("DogCard", "Dog"));

        assert_eq!(registry.views_for(&"Person".into()).len(), 2);
        assert_eq!(registry.get("DogCard").map(|view| view.shape().as_str()), Some("Dog"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn anonymous_views_are_not_exported() {
        let mut registry = ViewRegistry::new();
        registry.register_metadata(metadata("", "Person"));
        assert!(registry.is_empty());
        assert_eq!(registry.views_for(&"Person".into()).len(), 1);
    }

    #[test]
    fn re_export_replaces_previous_view() {
        let mut registry = ViewRegistry::new();
        registry.register_metadata(metadata("Card", "Person"));
        registry.register_metadata(metadata("Card", "Dog"));
        assert!(registry.views_for(&"Person".into()).is_empty());
        assert_eq!(registry.get("Card").map(|view| view.shape().as_str()), Some("Dog"));
    }

    #[test]
    fn unlinked_type_is_reported() {
        let mut registry = ViewRegistry::new();
        assert!(!registry.register_linked_type("Orphan", None));
        assert!(registry.register_linked_type("PersonPanel", Some(&"Person".into())));
        assert!(registry.shapes().any(|shape| shape.as_str() == "Person"));
    }
}
