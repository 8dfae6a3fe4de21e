//! In-memory query backend.
//!
//! Entities are stored as flat field maps; a field whose value is an object
//! carrying an `id` (or an array of such objects) is treated as a reference
//! and followed when the query selects it through a nested sub-query.

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_types::{
    FieldSelection, ID_FIELD, QueryDescriptor, QueryResponse, QuerySubject, Record, ShapeCatalog, ShapeDefinition, ShapeHierarchy,
    ShapeId, record_id,
};
use thiserror::Error;
use tracing::debug;

use super::QueryBackend;

/// Errors raised while loading fixture data.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("entity '{id}' uses unknown shape '{shape}'")]
    UnknownShape { id: String, shape: ShapeId },
    #[error("duplicate entity id '{id}'")]
    DuplicateEntity { id: String },
}

/// One stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub id: String,
    pub shape: ShapeId,
    #[serde(default)]
    pub fields: Record,
}

impl StoredEntity {
    pub fn new(id: impl Into<String>, shape: impl Into<ShapeId>, fields: Record) -> Self {
        Self {
            id: id.into(),
            shape: shape.into(),
            fields,
        }
    }

    /// Stored fields plus the `id`, as a caller would hold them.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        record.extend(self.fields.iter().map(|(key, value)| (key.clone(), value.clone())));
        record
    }
}

/// Serializable seed data: shapes first, then entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub shapes: Vec<ShapeDefinition>,
    #[serde(default)]
    pub entities: Vec<StoredEntity>,
}

/// Query backend answering from entities held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    catalog: ShapeCatalog,
    entities: IndexMap<String, StoredEntity>,
}

impl InMemoryBackend {
    pub fn new(catalog: ShapeCatalog) -> Self {
        Self {
            catalog,
            entities: IndexMap::new(),
        }
    }

    pub fn from_fixture(fixture: Fixture) -> Result<Self, FixtureError> {
        let mut backend = Self::new(fixture.shapes.into_iter().collect());
        for entity in fixture.entities {
            backend.insert(entity)?;
        }
        Ok(backend)
    }

    /// Parses a YAML (or JSON) fixture document.
    pub fn from_fixture_str(document: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_yaml::from_str(document)?;
        Self::from_fixture(fixture)
    }

    pub fn insert(&mut self, entity: StoredEntity) -> Result<(), FixtureError> {
        if !self.catalog.contains(&entity.shape) {
            return Err(FixtureError::UnknownShape {
                id: entity.id,
                shape: entity.shape,
            });
        }
        if self.entities.contains_key(&entity.id) {
            return Err(FixtureError::DuplicateEntity { id: entity.id });
        }
        self.entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    pub fn catalog(&self) -> &ShapeCatalog {
        &self.catalog
    }

    pub fn get(&self, id: &str) -> Option<&StoredEntity> {
        self.entities.get(id)
    }

    /// Stored entities conforming to `shape`, in insertion order.
    pub fn entities_of<'a>(&'a self, shape: &'a ShapeId) -> impl Iterator<Item = &'a StoredEntity> + 'a {
        self.entities.values().filter(move |entity| self.catalog.conforms_to(&entity.shape, shape))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn evaluate(&self, entity: &StoredEntity, query: &QueryDescriptor) -> Record {
        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), Value::String(entity.id.clone()));
        for selection in query.fields() {
            let stored = entity.fields.get(selection.name());
            let value = match selection {
                FieldSelection::Field(_) => stored.cloned().unwrap_or(Value::Null),
                FieldSelection::Nested { query: nested, .. } => {
                    stored.map(|value| self.follow(value, nested)).unwrap_or(Value::Null)
                }
            };
            record.insert(selection.name().to_string(), value);
        }
        record
    }

    fn follow(&self, value: &Value, query: &QueryDescriptor) -> Value {
        match value {
            Value::Object(reference) => match record_id(reference).and_then(|id| self.entities.get(id)) {
                Some(target) => Value::Object(self.evaluate(target, query)),
                None => Value::Object(query.project(reference)),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter(|item| self.passes_filter(item, query))
                    .map(|item| self.follow(item, query))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn passes_filter(&self, item: &Value, query: &QueryDescriptor) -> bool {
        let Some(filter) = query.filter() else {
            return true;
        };
        let Some(reference) = item.as_object() else {
            return false;
        };
        match record_id(reference).and_then(|id| self.entities.get(id)) {
            Some(target) => filter.matches(&target.fields),
            None => filter.matches(reference),
        }
    }

    fn candidates<'a>(&'a self, query: &QueryDescriptor) -> Vec<&'a StoredEntity> {
        match query.subject() {
            Some(QuerySubject::Set(members)) => members.iter().filter_map(|member| self.entities.get(member.id())).collect(),
            _ => self
                .entities
                .values()
                .filter(|entity| self.catalog.conforms_to(&entity.shape, query.shape()))
                .collect(),
        }
    }
}

#[async_trait]
impl QueryBackend for InMemoryBackend {
    async fn select_query(&self, query: QueryDescriptor) -> Result<QueryResponse> {
        if let Some(QuerySubject::Entity(subject)) = query.subject() {
            let record = self.entities.get(subject.id()).map(|entity| self.evaluate(entity, &query));
            debug!(shape = %query.shape(), subject = %subject.id(), found = record.is_some(), "in-memory single select");
            return Ok(QueryResponse::Single(record));
        }

        let offset = query.offset().unwrap_or(0);
        let limit = query.limit().filter(|limit| *limit > 0).unwrap_or(usize::MAX);
        let records: Vec<Record> = self
            .candidates(&query)
            .into_iter()
            .filter(|entity| query.filter().is_none_or(|filter| filter.matches(&entity.fields)))
            .skip(offset)
            .take(limit)
            .map(|entity| self.evaluate(entity, &query))
            .collect();
        debug!(
            shape = %query.shape(),
            offset,
            limit = ?query.limit(),
            returned = records.len(),
            "in-memory set select"
        );
        Ok(QueryResponse::Many(records))
    }
}
