//! Per-instance binding controllers.
//!
//! Modules:
//! - `entity`: Controller for views bound to one entity
//! - `collection`: Controller for views bound to a member set, with paging
//! - `paging`: Pagination window and the controller handle views receive
//! - `placeholder`: Loading placeholder and render outcome
//! - `fetch`: Single-flight fetch slot
//!
//! Controllers are explicit state machines. Caller input, commands posted by
//! prop handles, and fetch completions go in; [`Effect`]s come out. Running
//! effects (spawning fetches, logging warnings) is left to a host such as
//! [`crate::ViewHost`], which keeps the controllers free of I/O and lets tests
//! drive them directly.

mod collection;
mod entity;
mod fetch;
mod paging;
mod placeholder;

use std::{fmt, sync::Arc};

use anyhow::Result;
use tether_types::{QueryDescriptor, QueryResponse, Record, ShapeCatalog};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

pub use collection::{CollectionBinding, CollectionProps};
pub use entity::{EntityBinding, EntityProps, RefreshHandle};
pub use fetch::FetchKey;
pub use paging::{PageCommand, PageController, PageState};
pub use placeholder::{LoadingPlaceholder, Rendered};

use crate::{
    backend::{BackendRegistry, QueryBackend},
    declaration::{ViewKind, ViewMetadata},
    error::{BindingError, BindingWarning},
};

/// Execution environment shared by the instances a host mounts.
#[derive(Debug, Clone, Default)]
pub struct BindingContext {
    pub catalog: Arc<ShapeCatalog>,
    pub backends: Arc<BackendRegistry>,
}

impl BindingContext {
    pub fn new(catalog: ShapeCatalog, backends: BackendRegistry) -> Self {
        Self {
            catalog: Arc::new(catalog),
            backends: Arc::new(backends),
        }
    }

    /// Context without any backend: bound views pass their input through.
    pub fn offline(catalog: ShapeCatalog) -> Self {
        Self::new(catalog, BackendRegistry::new())
    }

    pub fn is_configured(&self) -> bool {
        self.backends.is_configured()
    }
}

/// A backend call a controller wants executed.
pub struct FetchRequest {
    pub key: FetchKey,
    pub query: QueryDescriptor,
    backend: Arc<dyn QueryBackend>,
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("key", &self.key)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl FetchRequest {
    pub(crate) fn new(key: FetchKey, query: QueryDescriptor, backend: Arc<dyn QueryBackend>) -> Self {
        Self { key, query, backend }
    }

    /// Executes the query, handing back the key with the backend's outcome.
    pub async fn run(self) -> (FetchKey, Result<QueryResponse>) {
        let outcome = self.backend.select_query(self.query).await;
        (self.key, outcome)
    }
}

/// Side effects requested by a controller transition.
#[derive(Debug)]
pub enum Effect {
    Fetch(FetchRequest),
    Warn(BindingWarning),
}

impl Effect {
    pub fn as_fetch(&self) -> Option<&FetchRequest> {
        match self {
            Self::Fetch(request) => Some(request),
            Self::Warn(_) => None,
        }
    }

    pub fn as_warning(&self) -> Option<&BindingWarning> {
        match self {
            Self::Warn(warning) => Some(warning),
            Self::Fetch(_) => None,
        }
    }
}

/// Mutations a view requests through its prop handles.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Re-fetch (`None`) or merge a local patch into the held result.
    Refresh(Option<Record>),
    Page(PageCommand),
}

/// Sending half of an instance's command channel.
///
/// A detached sink drops everything; controllers built outside a host use one.
#[derive(Debug, Clone)]
pub struct CommandSink {
    sender: Option<UnboundedSender<ViewCommand>>,
}

impl CommandSink {
    pub(crate) fn channel() -> (Self, UnboundedReceiver<ViewCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender: Some(sender) }, receiver)
    }

    pub fn detached() -> Self {
        Self { sender: None }
    }

    /// Posts a command. Returns false when the instance is gone.
    pub fn send(&self, command: ViewCommand) -> bool {
        let Some(sender) = &self.sender else {
            debug!(?command, "command dropped: sink is detached");
            return false;
        };
        sender.send(command).is_ok()
    }
}

/// Controller contract shared by entity and collection views.
pub trait Binding: Send + Sized + 'static {
    /// Caller input (the `of` argument).
    type Input: Send;
    /// Props handed to the render function.
    type Props: Clone + Send;

    const KIND: ViewKind;

    fn new(metadata: Arc<ViewMetadata>, context: BindingContext, sink: CommandSink) -> Self;

    fn metadata(&self) -> &ViewMetadata;

    /// Applies new caller input.
    fn update(&mut self, input: Option<Self::Input>) -> Result<Vec<Effect>, BindingError>;

    /// Applies a command posted by one of the instance's prop handles.
    fn apply(&mut self, command: ViewCommand) -> Result<Vec<Effect>, BindingError>;

    /// Stores the outcome of the fetch identified by `key`.
    fn complete(&mut self, key: &FetchKey, response: QueryResponse);

    /// Releases the fetch slot of a failed fetch.
    fn abandon(&mut self, key: &FetchKey);

    /// Replaces the caller props forwarded to the render function.
    fn set_extras(&mut self, extras: Record);

    fn props(&self) -> Rendered<Self::Props>;

    fn is_loading(&self) -> bool;
}

fn warn_effect(warning: BindingWarning) -> Effect {
    tracing::warn!(%warning, "binding warning");
    Effect::Warn(warning)
}

fn resolve_backend(context: &BindingContext, query: &QueryDescriptor) -> Result<Arc<dyn QueryBackend>, BindingError> {
    context
        .backends
        .resolve(query.shape())
        .ok_or_else(|| crate::error::ConfigurationError::missing_backend(query.shape()).into())
}
