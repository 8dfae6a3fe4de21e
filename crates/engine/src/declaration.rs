//! View declarations.
//!
//! A declaration pairs a query with a render function. The query is resolved
//! once, here, into [`ViewMetadata`]; every instance of the resulting
//! [`BoundView`] shares that metadata read-only.

use std::{fmt, marker::PhantomData, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_types::{QueryDescriptor, QueryDocument, QueryDocumentError, ShapeId};
use tracing::debug;

use crate::{
    binding::{Binding, BindingContext, CollectionBinding, CommandSink, EntityBinding, Rendered},
    config::BindingConfig,
    error::{BindingError, ConfigurationError},
};

/// Property name collection records are exposed under unless a named query says otherwise.
pub const DEFAULT_DATA_KEY: &str = "linked_data";

/// Whether a view binds one entity or a member set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Entity,
    Collection,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::Collection => f.write_str("collection"),
        }
    }
}

/// The query argument of a declaration, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpec {
    Query(QueryDescriptor),
    /// `{prop_name: query}`; collection views only, exactly one entry.
    Named(IndexMap<String, QuerySpec>),
    /// Anything else, described by its type name.
    Unsupported(String),
}

impl From<QueryDescriptor> for QuerySpec {
    fn from(value: QueryDescriptor) -> Self {
        Self::Query(value)
    }
}

impl QuerySpec {
    pub fn named(key: impl Into<String>, query: QueryDescriptor) -> Self {
        Self::Named(IndexMap::from([(key.into(), Self::Query(query))]))
    }

    /// Interprets an untyped declaration: an object with a `shape` is a
    /// query, any other object is a named map, everything else is unsupported.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        match value {
            Value::Object(map) if map.contains_key("shape") => {
                let document: QueryDocument =
                    serde_json::from_value(value.clone()).map_err(|error| QueryDocumentError::Malformed(error.to_string()))?;
                Ok(Self::Query(QueryDescriptor::try_from(document)?))
            }
            Value::Object(map) => {
                let mut named = IndexMap::new();
                for (key, entry) in map {
                    let spec = match entry {
                        Value::Object(inner) if inner.contains_key("shape") => Self::from_value(entry)?,
                        other => Self::Unsupported(type_name(other).to_string()),
                    };
                    named.insert(key.clone(), spec);
                }
                Ok(Self::Named(named))
            }
            other => Ok(Self::Unsupported(type_name(other).to_string())),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolves a declaration's query into its descriptor and optional output key.
pub fn resolve_query(spec: QuerySpec, kind: ViewKind) -> Result<(QueryDescriptor, Option<String>), ConfigurationError> {
    match spec {
        QuerySpec::Query(query) => Ok((query, None)),
        QuerySpec::Named(map) if kind == ViewKind::Collection => {
            if map.len() != 1 {
                return Err(ConfigurationError::QueryKeyCount { count: map.len() });
            }
            let Some((key, value)) = map.into_iter().next() else {
                return Err(ConfigurationError::QueryKeyCount { count: 0 });
            };
            match value {
                QuerySpec::Query(query) => Ok((query, Some(key))),
                _ => Err(ConfigurationError::UnknownValueType { key }),
            }
        }
        QuerySpec::Named(_) => Err(ConfigurationError::UnknownQueryType {
            found: "named query map".to_string(),
        }),
        QuerySpec::Unsupported(found) => Err(ConfigurationError::UnknownQueryType { found }),
    }
}

/// Static description of a bound view, exposed for registration tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewMetadata {
    name: String,
    kind: ViewKind,
    query: QueryDescriptor,
    data_key: Option<String>,
    default_page_size: usize,
}

impl ViewMetadata {
    pub fn resolve(name: impl Into<String>, kind: ViewKind, spec: QuerySpec, default_page_size: usize) -> Result<Self, ConfigurationError> {
        let (query, data_key) = resolve_query(spec, kind)?;
        Ok(Self {
            name: name.into(),
            kind,
            query,
            data_key,
            default_page_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn shape(&self) -> &ShapeId {
        self.query.shape()
    }

    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Output property for collection records.
    pub fn data_key(&self) -> &str {
        self.data_key.as_deref().unwrap_or(DEFAULT_DATA_KEY)
    }

    pub fn is_named(&self) -> bool {
        self.data_key.is_some()
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Starting page size: the query's own limit, else the configured default.
    pub fn initial_limit(&self) -> usize {
        self.query.limit().filter(|limit| *limit > 0).unwrap_or(self.default_page_size)
    }
}

type RenderFn<P, R> = dyn Fn(&P) -> R + Send + Sync;

/// A render function paired with resolved view metadata.
pub struct BoundView<B: Binding, R> {
    metadata: Arc<ViewMetadata>,
    render: Arc<RenderFn<B::Props, R>>,
    _binding: PhantomData<fn() -> B>,
}

impl<B: Binding, R> Clone for BoundView<B, R> {
    fn clone(&self) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
            render: Arc::clone(&self.render),
            _binding: PhantomData,
        }
    }
}

impl<B: Binding, R> fmt::Debug for BoundView<B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundView").field("metadata", &self.metadata).finish_non_exhaustive()
    }
}

impl<B: Binding, R> BoundView<B, R> {
    fn new<F>(metadata: ViewMetadata, render: F) -> Self
    where
        F: Fn(&B::Props) -> R + Send + Sync + 'static,
    {
        debug!(view = %metadata.name(), kind = %metadata.kind(), shape = %metadata.shape(), "view declared");
        Self {
            metadata: Arc::new(metadata),
            render: Arc::new(render),
            _binding: PhantomData,
        }
    }

    pub fn metadata(&self) -> &Arc<ViewMetadata> {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn shape(&self) -> &ShapeId {
        self.metadata.shape()
    }

    pub fn query(&self) -> &QueryDescriptor {
        self.metadata.query()
    }

    /// Creates a fresh controller for one instance of this view.
    pub fn instantiate(&self, context: BindingContext, sink: CommandSink) -> B {
        B::new(Arc::clone(&self.metadata), context, sink)
    }

    /// Invokes the render function, or passes the placeholder/empty state through.
    pub fn render(&self, binding: &B) -> Rendered<R> {
        binding.props().map(|props| (self.render)(&props))
    }

    pub fn render_props(&self, props: &B::Props) -> R {
        (self.render)(props)
    }
}

pub type SingleView<R> = BoundView<EntityBinding, R>;
pub type CollectionView<R> = BoundView<CollectionBinding, R>;

/// Declares a view bound to one entity. Named query maps are rejected.
pub fn bind_single<R, F>(name: &str, query: impl Into<QuerySpec>, render: F) -> Result<SingleView<R>, BindingError>
where
    F: Fn(&<EntityBinding as Binding>::Props) -> R + Send + Sync + 'static,
{
    let metadata = ViewMetadata::resolve(name, ViewKind::Entity, query.into(), 0)?;
    Ok(BoundView::new(metadata, render))
}

/// Declares a collection view using the process-wide default page size.
pub fn bind_collection<R, F>(name: &str, query: impl Into<QuerySpec>, render: F) -> Result<CollectionView<R>, BindingError>
where
    F: Fn(&<CollectionBinding as Binding>::Props) -> R + Send + Sync + 'static,
{
    bind_collection_with(name, query, BindingConfig::default(), render)
}

/// Declares a collection view with explicit configuration.
pub fn bind_collection_with<R, F>(
    name: &str,
    query: impl Into<QuerySpec>,
    config: BindingConfig,
    render: F,
) -> Result<CollectionView<R>, BindingError>
where
    F: Fn(&<CollectionBinding as Binding>::Props) -> R + Send + Sync + 'static,
{
    let metadata = ViewMetadata::resolve(name, ViewKind::Collection, query.into(), config.default_page_size)?;
    Ok(BoundView::new(metadata, render))
}
