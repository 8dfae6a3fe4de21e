//! Controller for views bound to a single entity.

use std::sync::Arc;

use serde_json::Value;
use tether_types::{EntityHandle, ID_FIELD, QueryResponse, QuerySubject, Record, SourceInput, merge_records};
use tracing::debug;

use super::{
    Binding, BindingContext, CommandSink, Effect, FetchKey, FetchRequest, Rendered, ViewCommand, fetch::FetchState, resolve_backend,
    warn_effect,
};
use crate::{
    declaration::{ViewKind, ViewMetadata},
    error::{BindingError, BindingWarning},
    source::resolve_source,
};

/// Handle a single-entity view uses to re-fetch or patch its data.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    sink: CommandSink,
}

impl RefreshHandle {
    /// Re-fetches the current entity, even when the caller's input was complete.
    pub fn refresh(&self) {
        self.sink.send(ViewCommand::Refresh(None));
    }

    /// Shallow-merges `patch` into the held result without contacting the backend.
    pub fn patch(&self, patch: Record) {
        self.sink.send(ViewCommand::Refresh(Some(patch)));
    }
}

/// Props handed to a single-entity view.
#[derive(Debug, Clone)]
pub struct EntityProps {
    /// The resolved source, absent when the query carries its own subject.
    pub source: Option<Arc<EntityHandle>>,
    /// Base identity fields merged with the result fields.
    pub fields: Record,
    /// Caller props passed alongside the source, unchanged.
    pub extras: Record,
    refresh: RefreshHandle,
}

impl EntityProps {
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    /// A bound field, else a caller prop of that name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).or_else(|| self.extras.get(field))
    }

    pub fn refresh(&self) -> &RefreshHandle {
        &self.refresh
    }

    /// Caller props overlaid with the bound fields.
    pub fn to_value(&self) -> Value {
        let mut props = self.extras.clone();
        merge_records(&mut props, &self.fields);
        Value::Object(props)
    }
}

impl PartialEq for EntityProps {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.fields == other.fields && self.extras == other.extras
    }
}

/// Single-entity binding state.
///
/// The fetch path is entered when the subject's identity changes (including
/// the first input) and on explicit refresh. Caller input that already
/// satisfies the query is used as the result and never fetched for.
#[derive(Debug)]
pub struct EntityBinding {
    metadata: Arc<ViewMetadata>,
    context: BindingContext,
    sink: CommandSink,
    input: Option<SourceInput>,
    source: Option<Arc<EntityHandle>>,
    subject: Option<Arc<EntityHandle>>,
    prefetched: Option<Record>,
    extras: Record,
    fetch: FetchState<Record>,
}

impl EntityBinding {
    pub fn source(&self) -> Option<&Arc<EntityHandle>> {
        self.source.as_ref()
    }

    /// Result from the last fetch or patch.
    pub fn result(&self) -> Option<&Record> {
        self.fetch.result()
    }

    fn identity(&self) -> Option<&str> {
        self.subject.as_deref().map(EntityHandle::id)
    }

    fn missing_source(&self) -> Effect {
        warn_effect(BindingWarning::MissingSource {
            view: self.metadata.name().to_string(),
        })
    }

    fn begin_fetch(&mut self) -> Result<Vec<Effect>, BindingError> {
        let Some(subject) = self.subject.clone() else {
            return Ok(vec![self.missing_source()]);
        };
        let backend = resolve_backend(&self.context, self.metadata.query())?;
        let key = FetchKey::new(subject.id());
        if !self.fetch.try_begin(&key) {
            return Ok(vec![warn_effect(BindingWarning::DuplicateFetch {
                view: self.metadata.name().to_string(),
                identity: key.to_string(),
            })]);
        }

        let mut query = self.metadata.query().clone();
        query.set_subject(QuerySubject::Entity(subject));
        debug!(view = %self.metadata.name(), key = %key, "fetch dispatched");
        Ok(vec![Effect::Fetch(FetchRequest::new(key, query, backend))])
    }

    fn patch(&mut self, patch: &Record) {
        if let Some(result) = self.fetch.result_mut() {
            merge_records(result, patch);
        } else if let Some(prefetched) = &self.prefetched {
            let mut result = prefetched.clone();
            merge_records(&mut result, patch);
            self.fetch.set_result(result);
        } else {
            debug!(view = %self.metadata.name(), "patch ignored: no result held");
            return;
        }
        debug!(view = %self.metadata.name(), fields = patch.len(), "patch applied");
    }

    fn base_fields(&self, subject: &EntityHandle) -> Record {
        let mut fields = subject.identity_record();
        if !self.context.is_configured()
            && let Some(record) = self.input.as_ref().and_then(SourceInput::as_record)
        {
            merge_records(&mut fields, record);
        }
        fields
    }
}

impl Binding for EntityBinding {
    type Input = SourceInput;
    type Props = EntityProps;

    const KIND: ViewKind = ViewKind::Entity;

    fn new(metadata: Arc<ViewMetadata>, context: BindingContext, sink: CommandSink) -> Self {
        Self {
            metadata,
            context,
            sink,
            input: None,
            source: None,
            subject: None,
            prefetched: None,
            extras: Record::new(),
            fetch: FetchState::default(),
        }
    }

    fn metadata(&self) -> &ViewMetadata {
        &self.metadata
    }

    fn update(&mut self, input: Option<SourceInput>) -> Result<Vec<Effect>, BindingError> {
        let query = self.metadata.query();
        let previous = self.identity().map(str::to_string);

        self.source = resolve_source(input.as_ref(), query.shape(), self.context.catalog.as_ref());
        self.subject = self.source.clone().or_else(|| match query.subject() {
            Some(QuerySubject::Entity(subject)) => Some(Arc::clone(subject)),
            _ => None,
        });
        self.prefetched = input
            .as_ref()
            .and_then(SourceInput::as_record)
            .filter(|record| query.is_valid_result(record))
            .map(|record| query.project(record));
        self.input = input;

        if self.subject.is_none() {
            self.fetch.clear_result();
            return Ok(vec![self.missing_source()]);
        }
        if previous.as_deref() == self.identity() {
            let starved =
                self.context.is_configured() && self.prefetched.is_none() && self.fetch.result().is_none() && !self.fetch.is_loading();
            if !starved {
                return Ok(Vec::new());
            }
            debug!(view = %self.metadata.name(), "input no longer satisfies the query");
            return self.begin_fetch();
        }

        self.fetch.clear_result();
        if !self.context.is_configured() || self.prefetched.is_some() {
            debug!(view = %self.metadata.name(), short_circuit = self.prefetched.is_some(), "no fetch needed");
            return Ok(Vec::new());
        }
        self.begin_fetch()
    }

    fn apply(&mut self, command: ViewCommand) -> Result<Vec<Effect>, BindingError> {
        match command {
            ViewCommand::Refresh(None) => self.begin_fetch(),
            ViewCommand::Refresh(Some(patch)) => {
                self.patch(&patch);
                Ok(Vec::new())
            }
            ViewCommand::Page(command) => {
                debug!(view = %self.metadata.name(), ?command, "paging ignored by single-entity view");
                Ok(Vec::new())
            }
        }
    }

    fn complete(&mut self, key: &FetchKey, response: QueryResponse) {
        let record = match response.into_single() {
            Some(record) => self.metadata.query().project(&record),
            None => {
                let mut identity = Record::new();
                identity.insert(ID_FIELD.to_string(), Value::String(key.to_string()));
                identity
            }
        };
        let current = self.fetch.finish(key, record);
        debug!(view = %self.metadata.name(), key = %key, current, "fetch completed");
    }

    fn abandon(&mut self, key: &FetchKey) {
        self.fetch.abandon(key);
    }

    fn set_extras(&mut self, extras: Record) {
        self.extras = extras;
    }

    fn props(&self) -> Rendered<EntityProps> {
        let Some(subject) = &self.subject else {
            return Rendered::Empty;
        };
        let mut fields = self.base_fields(subject);
        if self.context.is_configured() {
            let Some(data) = self.fetch.result().or(self.prefetched.as_ref()) else {
                return Rendered::loading();
            };
            merge_records(&mut fields, data);
        }
        Rendered::View(EntityProps {
            source: self.source.clone(),
            fields,
            extras: self.extras.clone(),
            refresh: RefreshHandle { sink: self.sink.clone() },
        })
    }

    fn is_loading(&self) -> bool {
        self.fetch.is_loading()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tether_types::{NodeReference, QueryDescriptor, ShapeCatalog, ShapeDefinition};

    use super::*;
    use crate::{
        backend::{BackendRegistry, InMemoryBackend},
        declaration::{QuerySpec, ViewKind},
    };

    fn catalog() -> ShapeCatalog {
        ShapeCatalog::new().with_shape(ShapeDefinition::new("Person"))
    }

    fn binding(query: QueryDescriptor, configured: bool) -> EntityBinding {
        let metadata = ViewMetadata::resolve("PersonCard", ViewKind::Entity, QuerySpec::from(query), 0).expect("metadata");
        let mut backends = BackendRegistry::new();
        if configured {
            backends.set_default(Arc::new(InMemoryBackend::new(catalog())));
        }
        EntityBinding::new(Arc::new(metadata), BindingContext::new(catalog(), backends), CommandSink::detached())
    }

    fn reference(id: &str) -> Option<SourceInput> {
        Some(SourceInput::Reference(NodeReference::new(id)))
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn missing_source_warns_and_renders_nothing() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        let effects = binding.update(None).expect("update");
        assert!(matches!(effects.as_slice(), [Effect::Warn(BindingWarning::MissingSource { .. })]));
        assert!(binding.props().is_empty());
    }

    #[test]
    fn new_identity_fetches_once_and_shows_placeholder() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        let effects = binding.update(reference("p1")).expect("update");
        let request = effects[0].as_fetch().expect("fetch");
        assert_eq!(request.query.subject().and_then(|subject| subject.entity_id()), Some("p1"));
        assert!(binding.props().is_loading());

        assert!(binding.update(reference("p1")).expect("same identity").is_empty());
    }

    #[test]
    fn refresh_while_in_flight_is_dropped_with_warning() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        binding.update(reference("p1")).expect("update");
        let effects = binding.apply(ViewCommand::Refresh(None)).expect("refresh");
        assert!(matches!(effects.as_slice(), [Effect::Warn(BindingWarning::DuplicateFetch { identity, .. })] if identity == "p1"));
    }

    #[test]
    fn completion_projects_result_and_clears_slot() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        binding.update(reference("p1")).expect("update");
        let key = FetchKey::new("p1");
        binding.complete(&key, QueryResponse::Single(Some(record(json!({"id": "p1", "name": "Semmy", "secret": 1})))));
        let props = binding.props().into_view().expect("view");
        assert_eq!(props.get("name"), Some(&json!("Semmy")));
        assert!(props.get("secret").is_none());
        assert!(!binding.is_loading());
    }

    #[test]
    fn valid_record_input_short_circuits() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        let input = SourceInput::Record(record(json!({"id": "p1", "name": "Semmy"})));
        assert!(binding.update(Some(input)).expect("update").is_empty());
        let props = binding.props().into_view().expect("view");
        assert_eq!(props.id(), Some("p1"));
        assert_eq!(props.get("name"), Some(&json!("Semmy")));
    }

    #[test]
    fn patch_merges_into_prefetched_input() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        binding
            .update(Some(SourceInput::Record(record(json!({"id": "p1", "name": "Semmy"})))))
            .expect("update");
        let effects = binding.apply(ViewCommand::Refresh(Some(record(json!({"name": "Sam"}))))).expect("patch");
        assert!(effects.is_empty());
        assert_eq!(binding.props().into_view().expect("view").get("name"), Some(&json!("Sam")));
    }

    #[test]
    fn identity_change_clears_previous_result() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        binding.update(reference("p1")).expect("update");
        binding.complete(&FetchKey::new("p1"), QueryResponse::Single(Some(record(json!({"id": "p1", "name": "Semmy"})))));
        let effects = binding.update(reference("p2")).expect("update");
        assert!(effects[0].as_fetch().is_some());
        assert!(binding.result().is_none());
        assert!(binding.props().is_loading());
    }

    #[test]
    fn missing_record_stores_identity_only() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), true);
        binding.update(reference("p9")).expect("update");
        binding.complete(&FetchKey::new("p9"), QueryResponse::Single(None));
        let props = binding.props().into_view().expect("view");
        assert_eq!(props.fields, record(json!({"id": "p9"})));
    }

    #[test]
    fn unconfigured_context_passes_input_through() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name").select("hobby"), false);
        let input = SourceInput::Record(record(json!({"id": "p1", "name": "Semmy"})));
        assert!(binding.update(Some(input)).expect("update").is_empty());
        let props = binding.props().into_view().expect("pass-through");
        assert_eq!(props.get("name"), Some(&json!("Semmy")));
    }

    #[test]
    fn refresh_without_backend_is_a_configuration_error() {
        let mut binding = binding(QueryDescriptor::new("Person").select("name"), false);
        binding.update(reference("p1")).expect("update");
        let error = binding.apply(ViewCommand::Refresh(None)).expect_err("no backend");
        assert!(matches!(error.as_configuration(), Some(crate::error::ConfigurationError::MissingBackend { .. })));
    }

    #[test]
    fn pre_bound_subject_needs_no_source() {
        let subject = Arc::new(EntityHandle::new("Person", "p1"));
        let query = QueryDescriptor::new("Person").select("name").with_subject(QuerySubject::Entity(subject));
        let mut binding = binding(query, true);
        let effects = binding.update(None).expect("update");
        assert!(effects[0].as_fetch().is_some());
        assert!(binding.source().is_none());
    }
}
