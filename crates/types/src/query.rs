//! Query descriptors.
//!
//! A [`QueryDescriptor`] is the immutable template a view declares: target
//! shape, requested fields (possibly nested sub-queries), optional pre-bound
//! subject and optional paging window. The binding engine clones it per fetch
//! and binds the subject/window on the clone, so the declared template is
//! never mutated after declaration.
//!
//! Descriptors also decide whether caller-supplied data already satisfies them
//! ([`QueryDescriptor::is_valid_result`]) and project backend records down to
//! exactly the requested fields ([`QueryDescriptor::project`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{EntityHandle, ID_FIELD, Record, ShapeId, record_id};

/// A single requested field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSelection {
    /// A plain value field.
    Field(String),
    /// A reference field whose target is described by a sub-query.
    Nested { name: String, query: Box<QueryDescriptor> },
}

impl FieldSelection {
    pub fn name(&self) -> &str {
        match self {
            Self::Field(name) | Self::Nested { name, .. } => name,
        }
    }
}

/// Equality filter applied to collection results and nested arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

impl FieldFilter {
    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(&self.equals)
    }
}

/// Who a query is about.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySubject {
    /// A single entity; the backend answers with one record.
    Entity(Arc<EntityHandle>),
    /// An explicit member set; the backend answers with one record per member.
    Set(Vec<Arc<EntityHandle>>),
}

impl QuerySubject {
    /// Identifier of a single-entity subject.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::Entity(entity) => Some(entity.id()),
            Self::Set(_) => None,
        }
    }
}

/// Backend answer to a select query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Single(Option<Record>),
    Many(Vec<Record>),
}

impl QueryResponse {
    /// Collapses the response to one record, taking the first of a list.
    pub fn into_single(self) -> Option<Record> {
        match self {
            Self::Single(record) => record,
            Self::Many(records) => records.into_iter().next(),
        }
    }

    /// Expands the response to a list.
    pub fn into_many(self) -> Vec<Record> {
        match self {
            Self::Single(record) => record.into_iter().collect(),
            Self::Many(records) => records,
        }
    }
}

/// Declarative description of the data a view needs.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    shape: ShapeId,
    fields: Vec<FieldSelection>,
    filter: Option<FieldFilter>,
    subject: Option<QuerySubject>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl QueryDescriptor {
    pub fn new(shape: impl Into<ShapeId>) -> Self {
        Self {
            shape: shape.into(),
            fields: Vec::new(),
            filter: None,
            subject: None,
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.fields.push(FieldSelection::Field(field.into()));
        self
    }

    pub fn select_nested(mut self, field: impl Into<String>, query: QueryDescriptor) -> Self {
        self.fields.push(FieldSelection::Nested {
            name: field.into(),
            query: Box::new(query),
        });
        self
    }

    /// Embeds another view's query under `field`, so records fetched for this
    /// query already satisfy the other view and it can skip its own fetch.
    pub fn preload_for(self, field: impl Into<String>, child_query: &QueryDescriptor) -> Self {
        let mut nested = child_query.clone();
        nested.subject = None;
        nested.limit = None;
        nested.offset = None;
        self.select_nested(field, nested)
    }

    pub fn where_equals(mut self, field: impl Into<String>, equals: impl Into<Value>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn with_subject(mut self, subject: QuerySubject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn shape(&self) -> &ShapeId {
        &self.shape
    }

    pub fn fields(&self) -> &[FieldSelection] {
        &self.fields
    }

    pub fn filter(&self) -> Option<&FieldFilter> {
        self.filter.as_ref()
    }

    pub fn subject(&self) -> Option<&QuerySubject> {
        self.subject.as_ref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn set_subject(&mut self, subject: QuerySubject) {
        self.subject = Some(subject);
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = Some(limit);
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = Some(offset);
    }

    /// True when the query targets exactly one entity.
    pub fn expects_single(&self) -> bool {
        matches!(self.subject, Some(QuerySubject::Entity(_)))
    }

    /// Checks whether `candidate` already carries everything this query requests.
    ///
    /// The candidate needs a string identifier and every selected field; nested
    /// selections are checked recursively against their sub-query.
    pub fn is_valid_result(&self, candidate: &Record) -> bool {
        record_id(candidate).is_some()
            && self.fields.iter().all(|selection| match selection {
                FieldSelection::Field(name) => candidate.contains_key(name),
                FieldSelection::Nested { name, query } => candidate.get(name).is_some_and(|value| query.is_valid_value(value)),
            })
    }

    /// Checks every element of `candidates` with [`Self::is_valid_result`].
    pub fn is_valid_set_result(&self, candidates: &[Record]) -> bool {
        candidates.iter().all(|candidate| self.is_valid_result(candidate))
    }

    fn is_valid_value(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Object(record) => self.is_valid_result(record),
            Value::Array(items) => items
                .iter()
                .all(|item| item.as_object().is_some_and(|record| self.is_valid_result(record))),
            _ => false,
        }
    }

    /// Copies the identifier and exactly the requested fields out of `record`.
    ///
    /// Missing fields are left out rather than invented; nested values are
    /// projected through their sub-query.
    pub fn project(&self, record: &Record) -> Record {
        let mut projected = Record::new();
        if let Some(id) = record.get(ID_FIELD) {
            projected.insert(ID_FIELD.to_string(), id.clone());
        }
        for selection in &self.fields {
            let Some(value) = record.get(selection.name()) else {
                continue;
            };
            let value = match selection {
                FieldSelection::Field(_) => value.clone(),
                FieldSelection::Nested { query, .. } => query.project_value(value),
            };
            projected.insert(selection.name().to_string(), value);
        }
        projected
    }

    fn project_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(record) => Value::Object(self.project(record)),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.project_value(item)).collect()),
            other => other.clone(),
        }
    }
}

/// Errors raised while converting a [`QueryDocument`] into a descriptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryDocumentError {
    #[error("query shape must not be empty")]
    EmptyShape,
    #[error("field names must not be empty (query on shape '{shape}')")]
    EmptyField { shape: String },
    #[error("malformed query document: {0}")]
    Malformed(String),
}

/// Serializable form of a query as written in manifests.
///
/// ```yaml
/// shape: Person
/// fields:
///   - name
///   - name: friends
///     query: { shape: Person, fields: [name], where: { field: name, equals: Jinx } }
/// limit: 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDocument {
    pub shape: String,
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
    #[serde(default, rename = "where")]
    pub filter: Option<FieldFilter>,
    /// Identifier of a pre-bound subject.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDocument {
    Name(String),
    Nested { name: String, query: Box<QueryDocument> },
}

impl TryFrom<QueryDocument> for QueryDescriptor {
    type Error = QueryDocumentError;

    fn try_from(document: QueryDocument) -> Result<Self, Self::Error> {
        let shape = document.shape.trim();
        if shape.is_empty() {
            return Err(QueryDocumentError::EmptyShape);
        }
        let mut descriptor = QueryDescriptor::new(shape);
        for field in document.fields {
            let name = match &field {
                FieldDocument::Name(name) | FieldDocument::Nested { name, .. } => name.trim().to_string(),
            };
            if name.is_empty() {
                return Err(QueryDocumentError::EmptyField { shape: shape.to_string() });
            }
            descriptor = match field {
                FieldDocument::Name(_) => descriptor.select(name),
                FieldDocument::Nested { query, .. } => descriptor.select_nested(name, QueryDescriptor::try_from(*query)?),
            };
        }
        descriptor.filter = document.filter;
        descriptor.limit = document.limit;
        descriptor.offset = document.offset;
        if let Some(subject) = document.subject {
            descriptor.subject = Some(QuerySubject::Entity(Arc::new(EntityHandle::new(shape, subject))));
        }
        Ok(descriptor)
    }
}
