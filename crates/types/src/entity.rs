//! Entity handles and the caller inputs that coerce to them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ID_FIELD, Record, ShapeId, record_id};

/// Identifier-only reference to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeReference {
    pub id: String,
}

impl NodeReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Shape-typed identity of an entity, optionally carrying already-known fields.
///
/// Handles are shared behind `Arc`; the binding layer never mutates a handle
/// it did not create.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityHandle {
    shape: ShapeId,
    id: String,
    fields: Record,
}

impl EntityHandle {
    pub fn new(shape: impl Into<ShapeId>, id: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            id: id.into(),
            fields: Record::new(),
        }
    }

    pub fn with_fields(mut self, fields: Record) -> Self {
        self.fields = fields;
        self.fields.remove(ID_FIELD);
        self
    }

    pub fn shape(&self) -> &ShapeId {
        &self.shape
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Record {
        &self.fields
    }

    pub fn as_reference(&self) -> NodeReference {
        NodeReference::new(self.id.clone())
    }

    /// Base identity fields: the identifier plus any known fields.
    pub fn identity_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            record.insert(key.clone(), value.clone());
        }
        record
    }
}

/// Heterogeneous input a caller may hand to a single-entity view.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceInput {
    /// A bare identifier.
    Reference(NodeReference),
    /// An existing entity handle, possibly of another shape.
    Entity(Arc<EntityHandle>),
    /// A raw result record, possibly already satisfying the view's query.
    Record(Record),
}

impl SourceInput {
    /// Identifier carried by the input, when it has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Reference(reference) => Some(reference.id.as_str()),
            Self::Entity(entity) => Some(entity.id()),
            Self::Record(record) => record_id(record),
        }
    }

    /// The raw record, if this input is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Interprets an untyped JSON value: strings are references, objects are records.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(id) => Some(Self::Reference(NodeReference::new(id))),
            Value::Object(record) => Some(Self::Record(record)),
            _ => None,
        }
    }
}

impl From<NodeReference> for SourceInput {
    fn from(value: NodeReference) -> Self {
        Self::Reference(value)
    }
}

impl From<Arc<EntityHandle>> for SourceInput {
    fn from(value: Arc<EntityHandle>) -> Self {
        Self::Entity(value)
    }
}

impl From<EntityHandle> for SourceInput {
    fn from(value: EntityHandle) -> Self {
        Self::Entity(Arc::new(value))
    }
}

impl From<Record> for SourceInput {
    fn from(value: Record) -> Self {
        Self::Record(value)
    }
}
