//! Source resolution.
//!
//! Callers hand views heterogeneous inputs: bare references, entity handles of
//! arbitrary shapes, raw result records, or collections of those. This module
//! coerces them into canonical [`EntityHandle`]s of the view's target shape.

use std::sync::Arc;

use serde_json::Value;
use tether_types::{EntityHandle, QueryDescriptor, Record, ShapeHierarchy, ShapeId, SourceInput, record_id};

use crate::error::BindingError;

/// Coerces a single input into a handle of `target`.
///
/// Handles whose shape conforms to `target` are returned as-is (same `Arc`).
/// Handles of unrelated shapes, references and records produce a new handle
/// built from the identifier only. A record without an identifier resolves
/// to `None`.
pub fn resolve_source<H>(input: Option<&SourceInput>, target: &ShapeId, hierarchy: &H) -> Option<Arc<EntityHandle>>
where
    H: ShapeHierarchy + ?Sized,
{
    match input? {
        SourceInput::Entity(entity) if hierarchy.conforms_to(entity.shape(), target) => Some(Arc::clone(entity)),
        SourceInput::Entity(entity) => Some(Arc::new(EntityHandle::new(target.clone(), entity.id()))),
        SourceInput::Reference(reference) => Some(Arc::new(EntityHandle::new(target.clone(), reference.id.clone()))),
        SourceInput::Record(record) => record_id(record).map(|id| Arc::new(EntityHandle::new(target.clone(), id))),
    }
}

/// Input accepted by collection views.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionSource {
    /// An explicit, typed member set.
    Entities(Vec<Arc<EntityHandle>>),
    /// Result records, possibly already satisfying the view's query.
    Records(Vec<Record>),
    /// Untyped input from a host; must be an array of records or identifiers.
    Value(Value),
}

impl From<Vec<Arc<EntityHandle>>> for CollectionSource {
    fn from(value: Vec<Arc<EntityHandle>>) -> Self {
        Self::Entities(value)
    }
}

impl From<Vec<Record>> for CollectionSource {
    fn from(value: Vec<Record>) -> Self {
        Self::Records(value)
    }
}

/// Member set of a collection view after resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMembers {
    /// Explicit members; `None` means the full extension of the shape.
    pub members: Option<Vec<Arc<EntityHandle>>>,
    /// Supplied records that already satisfy the query, projected to it.
    pub prefetched: Option<Vec<Record>>,
}

impl ResolvedMembers {
    /// Stable key describing the member set, used to detect input changes.
    /// Identifiers are length-prefixed, so separators inside ids cannot collide.
    pub fn fingerprint(&self) -> String {
        let members = match &self.members {
            Some(members) => members
                .iter()
                .map(|member| format!("{}:{}", member.id().len(), member.id()))
                .collect::<Vec<_>>()
                .join(","),
            None => "*".to_string(),
        };
        if self.prefetched.is_some() {
            format!("prefetched[{members}]")
        } else {
            format!("[{members}]")
        }
    }
}

/// Resolves the member set of a collection view.
///
/// Record arrays short-circuit fetching only when they are non-empty and every
/// element validates against `query`.
pub fn resolve_members<H>(
    view: &str,
    input: Option<&CollectionSource>,
    query: &QueryDescriptor,
    hierarchy: &H,
) -> Result<ResolvedMembers, BindingError>
where
    H: ShapeHierarchy + ?Sized,
{
    let target = query.shape();
    match input {
        None => Ok(ResolvedMembers::default()),
        Some(CollectionSource::Entities(entities)) => {
            let members = entities
                .iter()
                .filter_map(|entity| resolve_source(Some(&SourceInput::Entity(Arc::clone(entity))), target, hierarchy))
                .collect();
            Ok(ResolvedMembers {
                members: Some(members),
                prefetched: None,
            })
        }
        Some(CollectionSource::Records(records)) => resolve_records(view, records, query),
        Some(CollectionSource::Value(value)) => resolve_value(view, value, query),
    }
}

fn resolve_records(view: &str, records: &[Record], query: &QueryDescriptor) -> Result<ResolvedMembers, BindingError> {
    let mut members = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let id = record_id(record)
            .ok_or_else(|| BindingError::invalid_argument(view, format!("element {index} of the supplied array has no identifier")))?;
        members.push(Arc::new(EntityHandle::new(query.shape().clone(), id)));
    }

    let prefetched = (!records.is_empty() && query.is_valid_set_result(records))
        .then(|| records.iter().map(|record| query.project(record)).collect());

    Ok(ResolvedMembers {
        members: Some(members),
        prefetched,
    })
}

fn resolve_value(view: &str, value: &Value, query: &QueryDescriptor) -> Result<ResolvedMembers, BindingError> {
    let rejected = || {
        BindingError::invalid_argument(
            view,
            format!("{value}. Make sure to provide an entity set, an array of results, or no argument at all to load all instances"),
        )
    };

    let Value::Array(items) = value else {
        return Err(rejected());
    };

    if items.iter().all(Value::is_string) {
        let members = items
            .iter()
            .filter_map(Value::as_str)
            .map(|id| Arc::new(EntityHandle::new(query.shape().clone(), id)))
            .collect();
        return Ok(ResolvedMembers {
            members: Some(members),
            prefetched: None,
        });
    }

    let records = items
        .iter()
        .map(|item| item.as_object().cloned().ok_or_else(rejected))
        .collect::<Result<Vec<_>, _>>()?;
    resolve_records(view, &records, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_types::{NodeReference, ShapeCatalog, ShapeDefinition};

    fn catalog() -> ShapeCatalog {
        ShapeCatalog::new()
            .with_shape(ShapeDefinition::new("Person"))
            .with_shape(ShapeDefinition::new("Dog").with_parent("Person"))
            .with_shape(ShapeDefinition::new("Cat"))
    }

    fn person() -> ShapeId {
        ShapeId::from("Person")
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn absent_input_resolves_to_none() {
        assert!(resolve_source(None, &person(), &catalog()).is_none());
    }

    #[test]
    fn reference_becomes_handle_of_target_shape() {
        let input = SourceInput::Reference(NodeReference::new("p100"));
        let handle = resolve_source(Some(&input), &person(), &catalog()).expect("handle");
        assert_eq!(handle.shape(), &person());
        assert_eq!(handle.id(), "p100");
    }

    #[test]
    fn subshape_instance_is_returned_unchanged() {
        let dog = Arc::new(EntityHandle::new("Dog", "dog1"));
        let input = SourceInput::Entity(Arc::clone(&dog));
        let handle = resolve_source(Some(&input), &person(), &catalog()).expect("handle");
        assert!(Arc::ptr_eq(&handle, &dog));
    }

    #[test]
    fn unrelated_instance_is_rebuilt_from_identifier_only() {
        let fields = record(json!({"lives": 9}));
        let cat = Arc::new(EntityHandle::new("Cat", "cat1").with_fields(fields));
        let input = SourceInput::Entity(Arc::clone(&cat));
        let handle = resolve_source(Some(&input), &person(), &catalog()).expect("handle");
        assert!(!Arc::ptr_eq(&handle, &cat));
        assert_eq!(handle.shape(), &person());
        assert_eq!(handle.id(), "cat1");
        assert!(handle.fields().is_empty());
        assert_eq!(cat.shape().as_str(), "Cat");
    }

    #[test]
    fn record_without_identifier_has_no_source() {
        let input = SourceInput::Record(record(json!({"name": "Semmy"})));
        assert!(resolve_source(Some(&input), &person(), &catalog()).is_none());
    }

    #[test]
    fn valid_record_array_is_prefetched() {
        let query = QueryDescriptor::new("Person").select("name");
        let records = vec![record(json!({"id": "p1", "name": "Semmy"})), record(json!({"id": "p2", "name": "Moa"}))];
        let resolved = resolve_members("NameList", Some(&CollectionSource::Records(records)), &query, &catalog()).expect("members");
        assert_eq!(resolved.members.as_ref().map(Vec::len), Some(2));
        assert_eq!(resolved.prefetched.as_ref().map(Vec::len), Some(2));
        assert_eq!(resolved.fingerprint(), "prefetched[2:p1,2:p2]");
    }

    #[test]
    fn incomplete_records_are_members_but_not_prefetched() {
        let query = QueryDescriptor::new("Person").select("name").select("hobby");
        let records = vec![record(json!({"id": "p1", "name": "Semmy"}))];
        let resolved = resolve_members("NameList", Some(&CollectionSource::Records(records)), &query, &catalog()).expect("members");
        assert!(resolved.prefetched.is_none());
        assert_eq!(resolved.fingerprint(), "[2:p1]");
    }

    #[test]
    fn empty_array_is_not_prefetched() {
        let query = QueryDescriptor::new("Person").select("name");
        let resolved = resolve_members("NameList", Some(&CollectionSource::Records(Vec::new())), &query, &catalog()).expect("members");
        assert!(resolved.prefetched.is_none());
        assert_eq!(resolved.members, Some(Vec::new()));
    }

    #[test]
    fn records_without_identifiers_are_rejected_naming_the_view() {
        let query = QueryDescriptor::new("Person").select("name");
        let input = CollectionSource::Value(json!([{"name": "Semmy"}]));
        let error = resolve_members("NameList", Some(&input), &query, &catalog()).expect_err("missing identifiers");
        assert!(matches!(&error, BindingError::InvalidArgument { view, .. } if view == "NameList"));
    }

    #[test]
    fn non_array_value_is_rejected() {
        let query = QueryDescriptor::new("Person").select("name");
        let input = CollectionSource::Value(json!({"id": "p1"}));
        let error = resolve_members("NameList", Some(&input), &query, &catalog()).expect_err("object input");
        assert!(error.to_string().contains("Invalid argument 'of' provided to NameList"));
    }

    #[test]
    fn identifier_array_becomes_member_set() {
        let query = QueryDescriptor::new("Person").select("name");
        let input = CollectionSource::Value(json!(["p1", "p2"]));
        let resolved = resolve_members("NameList", Some(&input), &query, &catalog()).expect("members");
        assert_eq!(resolved.fingerprint(), "[2:p1,2:p2]");
    }

    #[test]
    fn identifiers_containing_separators_keep_distinct_fingerprints() {
        let query = QueryDescriptor::new("Person").select("name");
        let fingerprint = |value| {
            resolve_members("NameList", Some(&CollectionSource::Value(value)), &query, &catalog())
                .expect("members")
                .fingerprint()
        };
        assert_ne!(fingerprint(json!(["a,b"])), fingerprint(json!(["a", "b"])));
        assert_ne!(fingerprint(json!(["1:a,1:b"])), fingerprint(json!(["a", "b"])));
    }

    #[test]
    fn entity_set_members_are_coerced() {
        let query = QueryDescriptor::new("Person").select("name");
        let input = CollectionSource::Entities(vec![Arc::new(EntityHandle::new("Cat", "cat1")), Arc::new(EntityHandle::new("Dog", "dog1"))]);
        let resolved = resolve_members("NameList", Some(&input), &query, &catalog()).expect("members");
        let shapes: Vec<_> = resolved.members.unwrap().iter().map(|member| member.shape().to_string()).collect();
        assert_eq!(shapes, vec!["Person", "Dog"]);
    }
}
