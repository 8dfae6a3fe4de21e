//! # Tether Engine
//!
//! Binds declarative data queries to renderable views. A view declares the
//! shaped data it needs; the engine resolves the caller's input, decides
//! whether that input already satisfies the query, fetches what is missing
//! (at most once per identity at a time), paginates collections, and applies
//! refreshes and local patches over the instance's lifetime.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tether_engine::{BackendRegistry, BindingContext, InMemoryBackend, ViewHost, bind_single};
//! use tether_types::{NodeReference, QueryDescriptor, SourceInput};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build()?.block_on(async {
//! let backend = InMemoryBackend::from_fixture_str(r#"
//! shapes: [{ id: Person, fields: [name] }]
//! entities: [{ id: p1, shape: Person, fields: { name: Semmy } }]
//! "#)?;
//! let context = BindingContext::new(backend.catalog().clone(), BackendRegistry::with_default(Arc::new(backend)));
//!
//! let card = bind_single("PersonCard", QueryDescriptor::new("Person").select("name"), |props| {
//!     format!("name={}", props.get("name").and_then(|name| name.as_str()).unwrap_or_default())
//! })?;
//!
//! let mut host = ViewHost::mount(&card, context, Some(SourceInput::Reference(NodeReference::new("p1"))))?;
//! assert!(host.render().is_loading());
//! host.settle().await?;
//! assert_eq!(host.render().into_view().as_deref(), Some("name=Semmy"));
//! # Ok::<(), anyhow::Error>(())
//! # })?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - **`declaration`**: Query resolution and view declaration (`bind_single`, `bind_collection`)
//! - **`source`**: Coercion of caller input into entity handles and member sets
//! - **`binding`**: Per-instance controllers, paging and the loading placeholder
//! - **`host`**: Async shell running controller effects on tokio
//! - **`backend`**: Query backend trait, per-shape registry, in-memory backend
//! - **`adapter`**: Memoized shape handles for stateful consumers
//! - **`registry`**: Views indexed by shape and exported name
//! - **`config`**: Page size configuration

use std::{fs, path::Path};

use anyhow::{Context, Result};

pub mod adapter;
pub mod backend;
pub mod binding;
pub mod config;
pub mod declaration;
pub mod error;
pub mod host;
pub mod registry;
pub mod source;

pub use adapter::{InstanceId, ShapeAdapterCache};
pub use backend::{BackendRegistry, Fixture, FixtureError, InMemoryBackend, QueryBackend, StoredEntity};
pub use binding::{
    Binding, BindingContext, CollectionBinding, CollectionProps, CommandSink, Effect, EntityBinding, EntityProps, FetchKey, FetchRequest,
    LoadingPlaceholder, PageCommand, PageController, PageState, RefreshHandle, Rendered, ViewCommand,
};
pub use config::{BindingConfig, DEFAULT_PAGE_SIZE, default_page_size, reset_default_page_size, set_default_page_size};
pub use declaration::{
    BoundView, CollectionView, DEFAULT_DATA_KEY, QuerySpec, SingleView, ViewKind, ViewMetadata, bind_collection, bind_collection_with,
    bind_single, resolve_query,
};
pub use error::{BindingError, BindingWarning, ConfigurationError};
pub use host::{ViewHost, WARNING_CAPACITY};
pub use registry::ViewRegistry;
pub use source::{CollectionSource, ResolvedMembers, resolve_members, resolve_source};

/// Loads an in-memory backend from a YAML or JSON fixture file.
///
/// # Errors
///
/// Fails when the file cannot be read, is not a valid fixture document, or
/// references unknown shapes.
pub fn load_fixture_file(file_path: impl AsRef<Path>) -> Result<InMemoryBackend> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read fixture file: {}", file_path.display()))?;
    InMemoryBackend::from_fixture_str(&content).with_context(|| format!("Invalid fixture file: {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_file_reads_yaml() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let fixture_path = temp_dir.path().join("people.yaml");
        fs::write(
            &fixture_path,
            r#"
shapes:
  - id: Person
entities:
  - id: p1
    shape: Person
    fields: { name: Semmy }
"#,
        )
        .expect("write fixture");

        let backend = load_fixture_file(&fixture_path).expect("load fixture");
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get("p1").map(|entity| entity.shape.as_str()), Some("Person"));
    }

    #[test]
    fn load_fixture_file_reports_path_on_error() {
        let error = load_fixture_file("/definitely/not/here.yaml").expect_err("missing file");
        assert!(error.to_string().contains("/definitely/not/here.yaml"));
    }
}
