//! Controller for views bound to a member set.

use std::sync::Arc;

use serde_json::Value;
use tether_types::{EntityHandle, QueryResponse, QuerySubject, Record, record_id};
use tracing::debug;

use super::{
    Binding, BindingContext, CommandSink, Effect, FetchKey, FetchRequest, PageController, PageState, Rendered, ViewCommand,
    fetch::FetchState, resolve_backend, warn_effect,
};
use crate::{
    declaration::{ViewKind, ViewMetadata},
    error::{BindingError, BindingWarning},
    source::{CollectionSource, ResolvedMembers, resolve_members},
};

/// Props handed to a collection view.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionProps {
    /// Property name the records are exposed under.
    pub data_key: String,
    /// Current window of result records. Empty when binding is skipped and
    /// the input did not already satisfy the query.
    pub records: Vec<Record>,
    /// Resolved member set; `None` means the full extension of the shape.
    pub sources: Option<Vec<Arc<EntityHandle>>>,
    /// Present only while a page limit is active.
    pub pages: Option<PageController>,
    /// Caller props passed alongside the member set, unchanged.
    pub extras: Record,
}

impl CollectionProps {
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().filter_map(record_id).collect()
    }

    /// Caller props plus the records keyed by [`Self::data_key`].
    pub fn to_value(&self) -> Value {
        let records = self.records.iter().cloned().map(Value::Object).collect();
        let mut props = self.extras.clone();
        props.insert(self.data_key.clone(), Value::Array(records));
        Value::Object(props)
    }
}

/// Collection binding state.
///
/// Supplied records that already satisfy the query are sliced locally by the
/// paging window. Everything else is server-paged: each change of member set
/// or window issues one fetch bound to `{subject, limit, offset}`.
#[derive(Debug)]
pub struct CollectionBinding {
    metadata: Arc<ViewMetadata>,
    context: BindingContext,
    sink: CommandSink,
    members: ResolvedMembers,
    fingerprint: Option<String>,
    pages: PageState,
    extras: Record,
    fetch: FetchState<Vec<Record>>,
}

impl CollectionBinding {
    pub fn page_state(&self) -> PageState {
        self.pages
    }

    pub fn members(&self) -> &ResolvedMembers {
        &self.members
    }

    fn evaluate(&mut self) -> Result<Vec<Effect>, BindingError> {
        if self.members.prefetched.is_some() || !self.context.is_configured() {
            debug!(view = %self.metadata.name(), offset = self.pages.offset, limit = self.pages.limit, "window served locally");
            return Ok(Vec::new());
        }

        let backend = resolve_backend(&self.context, self.metadata.query())?;
        let mut query = self.metadata.query().clone();
        if let Some(members) = &self.members.members {
            query.set_subject(QuerySubject::Set(members.clone()));
        }
        // A zero limit turns windowing off, offset included.
        let offset = if self.pages.is_active() { self.pages.offset } else { 0 };
        if self.pages.is_active() {
            query.set_limit(self.pages.limit);
        }
        if offset > 0 {
            query.set_offset(offset);
        }

        let fingerprint = self.fingerprint.as_deref().unwrap_or_default();
        let key = FetchKey::new(format!("{fingerprint}|{}|{offset}", self.pages.limit));
        if !self.fetch.try_begin(&key) {
            return Ok(vec![warn_effect(BindingWarning::DuplicateFetch {
                view: self.metadata.name().to_string(),
                identity: key.to_string(),
            })]);
        }
        debug!(view = %self.metadata.name(), key = %key, "fetch dispatched");
        Ok(vec![Effect::Fetch(FetchRequest::new(key, query, backend))])
    }
}

impl Binding for CollectionBinding {
    type Input = CollectionSource;
    type Props = CollectionProps;

    const KIND: ViewKind = ViewKind::Collection;

    fn new(metadata: Arc<ViewMetadata>, context: BindingContext, sink: CommandSink) -> Self {
        let pages = PageState::new(metadata.initial_limit());
        Self {
            metadata,
            context,
            sink,
            members: ResolvedMembers::default(),
            fingerprint: None,
            pages,
            extras: Record::new(),
            fetch: FetchState::default(),
        }
    }

    fn metadata(&self) -> &ViewMetadata {
        &self.metadata
    }

    fn update(&mut self, input: Option<CollectionSource>) -> Result<Vec<Effect>, BindingError> {
        let members = resolve_members(self.metadata.name(), input.as_ref(), self.metadata.query(), self.context.catalog.as_ref())?;
        let fingerprint = members.fingerprint();
        if self.fingerprint.as_deref() == Some(fingerprint.as_str()) {
            self.members = members;
            return Ok(Vec::new());
        }

        debug!(view = %self.metadata.name(), members = %fingerprint, "member set changed");
        self.members = members;
        self.fingerprint = Some(fingerprint);
        self.fetch.clear_result();
        self.evaluate()
    }

    fn apply(&mut self, command: ViewCommand) -> Result<Vec<Effect>, BindingError> {
        match command {
            ViewCommand::Page(command) => {
                if !self.pages.apply(command) {
                    return Ok(Vec::new());
                }
                debug!(view = %self.metadata.name(), ?command, offset = self.pages.offset, limit = self.pages.limit, "page changed");
                self.evaluate()
            }
            ViewCommand::Refresh(None) => self.evaluate(),
            ViewCommand::Refresh(Some(_)) => {
                debug!(view = %self.metadata.name(), "patch ignored by collection view");
                Ok(Vec::new())
            }
        }
    }

    fn complete(&mut self, key: &FetchKey, response: QueryResponse) {
        let query = self.metadata.query();
        let records: Vec<Record> = response.into_many().iter().map(|record| query.project(record)).collect();
        let returned = records.len();
        let current = self.fetch.finish(key, records);
        debug!(view = %self.metadata.name(), key = %key, returned, current, "fetch completed");
    }

    fn abandon(&mut self, key: &FetchKey) {
        self.fetch.abandon(key);
    }

    fn set_extras(&mut self, extras: Record) {
        self.extras = extras;
    }

    fn props(&self) -> Rendered<CollectionProps> {
        let records = if let Some(prefetched) = &self.members.prefetched {
            self.pages.slice(prefetched)
        } else if !self.context.is_configured() {
            Vec::new()
        } else if let Some(fetched) = self.fetch.result() {
            fetched.clone()
        } else {
            return Rendered::loading();
        };

        Rendered::View(CollectionProps {
            data_key: self.metadata.data_key().to_string(),
            records,
            sources: self.members.members.clone(),
            pages: self.pages.is_active().then(|| PageController::new(self.pages, self.sink.clone())),
            extras: self.extras.clone(),
        })
    }

    fn is_loading(&self) -> bool {
        self.fetch.is_loading()
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_json::json;
    use tether_types::{QueryDescriptor, ShapeCatalog, ShapeDefinition};

    use super::*;
    use crate::{
        backend::{BackendRegistry, InMemoryBackend},
        binding::PageCommand,
        declaration::QuerySpec,
    };

    fn catalog() -> ShapeCatalog {
        ShapeCatalog::new().with_shape(ShapeDefinition::new("Person"))
    }

    fn binding(spec: QuerySpec, page_size: usize, configured: bool) -> CollectionBinding {
        let metadata = ViewMetadata::resolve("NameList", ViewKind::Collection, spec, page_size).expect("metadata");
        let mut backends = BackendRegistry::new();
        if configured {
            backends.set_default(Arc::new(InMemoryBackend::new(catalog())));
        }
        CollectionBinding::new(Arc::new(metadata), BindingContext::new(catalog(), backends), CommandSink::detached())
    }

    fn people(count: usize) -> Vec<Record> {
        (0..count)
            .map(|index| json!({"id": format!("p{index}"), "name": format!("Person {index}")}))
            .filter_map(|value| value.as_object().cloned())
            .collect()
    }

    fn names() -> QuerySpec {
        QuerySpec::from(QueryDescriptor::new("Person").select("name"))
    }

    #[test]
    fn absent_input_fetches_first_page_of_extension() {
        let mut binding = binding(names(), 2, true);
        let effects = binding.update(None).expect("update");
        let request = effects[0].as_fetch().expect("fetch");
        assert!(request.query.subject().is_none());
        assert_eq!(request.query.limit(), Some(2));
        assert_eq!(request.query.offset(), None);
        assert!(binding.props().is_loading());
    }

    #[test]
    fn page_change_refetches_with_new_window() {
        let mut binding = binding(names(), 2, true);
        binding.update(None).expect("update");
        let effects = binding.apply(ViewCommand::Page(PageCommand::NextPage)).expect("next page");
        assert_eq!(effects[0].as_fetch().and_then(|request| request.query.offset()), Some(2));
    }

    #[test]
    fn unchanged_window_triggers_nothing() {
        let mut binding = binding(names(), 2, true);
        binding.update(None).expect("update");
        assert!(binding.apply(ViewCommand::Page(PageCommand::PreviousPage)).expect("noop").is_empty());
        assert!(binding.update(None).expect("same members").is_empty());
    }

    #[test]
    fn valid_records_are_sliced_locally() {
        let mut binding = binding(names(), 2, true);
        let effects = binding.update(Some(CollectionSource::Records(people(5)))).expect("update");
        assert!(effects.is_empty());
        assert_eq!(binding.props().into_view().expect("view").ids(), vec!["p0", "p1"]);

        assert!(binding.apply(ViewCommand::Page(PageCommand::SetPage(2))).expect("page").is_empty());
        assert_eq!(binding.props().into_view().expect("view").ids(), vec!["p4"]);
    }

    #[test]
    fn completion_keeps_previous_page_until_next_arrives() {
        let mut binding = binding(names(), 2, true);
        binding.update(None).expect("update");
        binding.complete(&FetchKey::new("[*]|2|0"), QueryResponse::Many(people(2)));
        binding.apply(ViewCommand::Page(PageCommand::NextPage)).expect("next");
        assert!(binding.is_loading());
        assert_eq!(binding.props().into_view().expect("view").ids(), vec!["p0", "p1"]);
    }

    #[test]
    fn named_query_exposes_records_under_its_key() {
        let spec = QuerySpec::Named(IndexMap::from([("people".to_string(), names())]));
        let mut binding = binding(spec, 0, true);
        binding.update(Some(CollectionSource::Records(people(3)))).expect("update");
        let props = binding.props().into_view().expect("view");
        assert_eq!(props.data_key, "people");
        assert!(props.pages.is_none());
        assert_eq!(props.to_value()["people"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn unconfigured_context_renders_without_fetching() {
        let mut binding = binding(names(), 2, false);
        assert!(binding.update(Some(CollectionSource::Value(json!(["p1", "p2"])))).expect("update").is_empty());
        let props = binding.props().into_view().expect("pass-through");
        assert!(props.records.is_empty());
        assert_eq!(props.sources.map(|sources| sources.len()), Some(2));
    }
}
