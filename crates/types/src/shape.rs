//! Shape identifiers and the inheritance catalog.
//!
//! A shape is the typed "class" of an entity (for example `Person`). Shapes
//! form a single-inheritance tree; a `Dog` declared with parent `Person`
//! conforms to `Person` but not the other way around.

use std::{collections::HashSet, fmt, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Interned identifier of a shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(Arc<str>);

impl ShapeId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ShapeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Declaration of a single shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDefinition {
    pub id: ShapeId,
    /// Direct parent shape, if any.
    #[serde(default)]
    pub parent: Option<ShapeId>,
    /// Fields the shape declares (informational; validity is decided by queries).
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ShapeDefinition {
    pub fn new(id: impl Into<ShapeId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<ShapeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Answers shape compatibility questions.
pub trait ShapeHierarchy {
    /// Returns true when `candidate` is `target` or inherits from it.
    fn conforms_to(&self, candidate: &ShapeId, target: &ShapeId) -> bool;
}

/// Registry of known shapes keyed by identifier, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ShapeCatalog {
    shapes: IndexMap<ShapeId, ShapeDefinition>,
}

impl ShapeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, definition: ShapeDefinition) -> Self {
        self.insert(definition);
        self
    }

    /// Inserts or replaces a shape definition.
    pub fn insert(&mut self, definition: ShapeDefinition) {
        self.shapes.insert(definition.id.clone(), definition);
    }

    pub fn get(&self, id: &ShapeId) -> Option<&ShapeDefinition> {
        self.shapes.get(id)
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.shapes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShapeDefinition> {
        self.shapes.values()
    }

    /// Walks the parent chain of `id`, nearest ancestor first.
    ///
    /// Unknown parents terminate the walk; a cyclic declaration is cut at the
    /// first repeated shape.
    pub fn ancestors(&self, id: &ShapeId) -> Vec<ShapeId> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut cursor = self.shapes.get(id).and_then(|definition| definition.parent.clone());
        while let Some(parent) = cursor {
            if !seen.insert(parent.clone()) {
                break;
            }
            cursor = self.shapes.get(&parent).and_then(|definition| definition.parent.clone());
            chain.push(parent);
        }
        chain
    }
}

impl ShapeHierarchy for ShapeCatalog {
    fn conforms_to(&self, candidate: &ShapeId, target: &ShapeId) -> bool {
        candidate == target || self.ancestors(candidate).iter().any(|ancestor| ancestor == target)
    }
}

impl FromIterator<ShapeDefinition> for ShapeCatalog {
    fn from_iter<T: IntoIterator<Item = ShapeDefinition>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for definition in iter {
            catalog.insert(definition);
        }
        catalog
    }
}
