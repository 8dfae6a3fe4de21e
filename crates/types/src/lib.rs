//! Shared data model for the Tether binding engine.
//!
//! The types in this crate describe *what* a view asks for and *who* it asks
//! about, without knowing anything about fetching or rendering:
//!
//! - [`shape`]: shape identifiers and the inheritance catalog used for
//!   compatibility checks
//! - [`entity`]: canonical entity handles and the raw inputs that coerce to them
//! - [`query`]: query descriptors, field selections, validity checks and
//!   projection, plus the serde-facing [`QueryDocument`]

pub mod entity;
pub mod query;
pub mod shape;

use serde_json::Value;

pub use entity::{EntityHandle, NodeReference, SourceInput};
pub use query::{FieldDocument, FieldFilter, FieldSelection, QueryDescriptor, QueryDocument, QueryDocumentError, QueryResponse, QuerySubject};
pub use shape::{ShapeCatalog, ShapeDefinition, ShapeHierarchy, ShapeId};

/// A flat result record as produced by a query backend.
pub type Record = serde_json::Map<String, Value>;

/// Name of the identifier field every entity record carries.
pub const ID_FIELD: &str = "id";

/// Returns the identifier carried by a record, if it is a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Shallow-merges `patch` into `target`; keys in `patch` win.
pub fn merge_records(target: &mut Record, patch: &Record) {
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
}
