//! View manifests.
//!
//! A manifest is a fixture document (shapes and entities) with a `views`
//! list on top. Each view names its kind and carries an untyped query that is
//! validated when the view is declared.

use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tether_engine::{
    BackendRegistry, BindingConfig, BindingContext, CollectionView, Fixture, InMemoryBackend, QuerySpec, SingleView, ViewKind,
    ViewRegistry, bind_collection_with, bind_single,
};
use tracing::debug;

use crate::render::{collection_frame, entity_frame};

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub fixture: Fixture,
    #[serde(default)]
    pub views: Vec<ViewDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewDocument {
    pub name: String,
    pub kind: ViewKind,
    pub query: Value,
}

/// A declared view whose render function produces a text frame.
#[derive(Debug, Clone)]
pub enum DeclaredView {
    Entity(SingleView<String>),
    Collection(CollectionView<String>),
}

/// Views declared from a manifest, with the data they run against.
#[derive(Debug)]
pub struct Workspace {
    pub backend: Arc<InMemoryBackend>,
    pub views: IndexMap<String, DeclaredView>,
    pub registry: ViewRegistry,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads the fixture and declares every view.
    pub fn declare(self, config: BindingConfig) -> Result<Workspace> {
        let backend = InMemoryBackend::from_fixture(self.fixture)?;
        let mut views = IndexMap::new();
        let mut registry = ViewRegistry::new();

        for document in self.views {
            let spec = QuerySpec::from_value(&document.query).with_context(|| format!("view '{}'", document.name))?;
            let view = match document.kind {
                ViewKind::Entity => {
                    let view = bind_single(&document.name, spec, entity_frame).with_context(|| format!("view '{}'", document.name))?;
                    registry.register(&view);
                    DeclaredView::Entity(view)
                }
                ViewKind::Collection => {
                    let view = bind_collection_with(&document.name, spec, config, collection_frame)
                        .with_context(|| format!("view '{}'", document.name))?;
                    registry.register(&view);
                    DeclaredView::Collection(view)
                }
            };
            debug!(view = %document.name, kind = %document.kind, "declared manifest view");
            views.insert(document.name, view);
        }

        Ok(Workspace {
            backend: Arc::new(backend),
            views,
            registry,
        })
    }
}

impl Workspace {
    /// Context with the manifest's entities as the default backend, or with
    /// no backend at all when `offline`.
    pub fn context(&self, offline: bool) -> BindingContext {
        let catalog = self.backend.catalog().clone();
        if offline {
            BindingContext::offline(catalog)
        } else {
            BindingContext::new(catalog, BackendRegistry::with_default(self.backend.clone()))
        }
    }

    pub fn view(&self, name: &str) -> Result<&DeclaredView> {
        self.views.get(name).with_context(|| {
            let known: Vec<&str> = self.views.keys().map(String::as_str).collect();
            format!("unknown view '{name}' (known: {})", known.join(", "))
        })
    }
}
