//! Async shell around one bound view instance.
//!
//! The host owns the controller, its command channel and the set of fetches
//! it spawned. Fetches run on the tokio runtime; their outcomes and the
//! commands posted by prop handles are applied on the task that polls the
//! host, so every state transition happens in one place. Dropping the host
//! aborts its outstanding fetches.

use std::collections::HashMap;

use anyhow::Result;
use tether_types::{QueryResponse, Record};
use tokio::{
    sync::mpsc::{UnboundedReceiver, error::TryRecvError},
    task::{self, JoinError, JoinSet},
};
use tracing::{debug, warn};

use crate::{
    binding::{Binding, BindingContext, CommandSink, Effect, FetchKey, Rendered, ViewCommand},
    declaration::BoundView,
    error::{BindingError, BindingWarning},
};

/// Most recent warnings kept per host.
pub const WARNING_CAPACITY: usize = 64;

type FetchOutcome = (FetchKey, Result<QueryResponse>);

/// One mounted instance of a bound view.
pub struct ViewHost<B: Binding, R> {
    view: BoundView<B, R>,
    binding: B,
    sink: CommandSink,
    commands: UnboundedReceiver<ViewCommand>,
    fetches: JoinSet<FetchOutcome>,
    pending: HashMap<task::Id, FetchKey>,
    warnings: Vec<BindingWarning>,
}

impl<B: Binding, R> std::fmt::Debug for ViewHost<B, R>
where
    B: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHost")
            .field("view", &self.view.name())
            .field("binding", &self.binding)
            .field("outstanding", &self.fetches.len())
            .finish_non_exhaustive()
    }
}

impl<B: Binding, R> ViewHost<B, R> {
    /// Mounts an instance and applies its first input. Fetches are spawned
    /// immediately, so this must run inside a tokio runtime.
    pub fn mount(view: &BoundView<B, R>, context: BindingContext, input: Option<B::Input>) -> Result<Self, BindingError> {
        Self::mount_with(view, context, input, Record::new())
    }

    /// Like [`Self::mount`], also forwarding caller props to the render function.
    pub fn mount_with(
        view: &BoundView<B, R>,
        context: BindingContext,
        input: Option<B::Input>,
        extras: Record,
    ) -> Result<Self, BindingError> {
        let (sink, commands) = CommandSink::channel();
        let mut binding = view.instantiate(context, sink.clone());
        binding.set_extras(extras);
        let mut host = Self {
            view: view.clone(),
            binding,
            sink,
            commands,
            fetches: JoinSet::new(),
            pending: HashMap::new(),
            warnings: Vec::new(),
        };
        debug!(view = %host.view.name(), "view mounted");
        host.update(input)?;
        Ok(host)
    }

    /// Applies new caller input.
    pub fn update(&mut self, input: Option<B::Input>) -> Result<(), BindingError> {
        let effects = self.binding.update(input)?;
        self.run(effects);
        Ok(())
    }

    /// Replaces the caller props forwarded to the render function.
    pub fn set_extras(&mut self, extras: Record) {
        self.binding.set_extras(extras);
    }

    /// Applies a command directly, bypassing the channel.
    pub fn dispatch(&mut self, command: ViewCommand) -> Result<(), BindingError> {
        let effects = self.binding.apply(command)?;
        self.run(effects);
        Ok(())
    }

    pub fn render(&self) -> Rendered<R> {
        self.view.render(&self.binding)
    }

    pub fn props(&self) -> Rendered<B::Props> {
        self.binding.props()
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    /// Handle posting commands to this instance, as prop handles do.
    pub fn sink(&self) -> &CommandSink {
        &self.sink
    }

    /// Number of spawned fetches whose outcome has not been applied yet.
    pub fn outstanding(&self) -> usize {
        self.fetches.len()
    }

    /// Recent warnings, oldest first. At most [`WARNING_CAPACITY`] are kept.
    pub fn warnings(&self) -> &[BindingWarning] {
        &self.warnings
    }

    /// Drains the recorded warnings.
    pub fn take_warnings(&mut self) -> Vec<BindingWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Processes one queued command or fetch outcome, waiting for a fetch if
    /// nothing is queued. Returns `Ok(false)` when there is nothing left to
    /// wait for.
    ///
    /// A failed fetch frees the instance's fetch slot and its error is
    /// returned exactly as the backend produced it. A fetch task that panics
    /// frees the slot too and surfaces as a [`JoinError`].
    pub async fn next(&mut self) -> Result<bool> {
        match self.commands.try_recv() {
            Ok(command) => {
                self.dispatch(command)?;
                return Ok(true);
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }
        if self.fetches.is_empty() {
            return Ok(false);
        }

        tokio::select! {
            Some(command) = self.commands.recv() => {
                self.dispatch(command)?;
                Ok(true)
            }
            Some(joined) = self.fetches.join_next_with_id() => self.settled(joined),
            else => Ok(false),
        }
    }

    /// Drains queued commands and outstanding fetches.
    pub async fn settle(&mut self) -> Result<()> {
        while self.next().await? {}
        Ok(())
    }

    fn settled(&mut self, joined: Result<(task::Id, FetchOutcome), JoinError>) -> Result<bool> {
        match joined {
            Ok((id, (key, outcome))) => {
                self.pending.remove(&id);
                match outcome {
                    Ok(response) => {
                        self.binding.complete(&key, response);
                        Ok(true)
                    }
                    Err(error) => {
                        debug!(view = %self.view.name(), key = %key, "fetch failed");
                        self.binding.abandon(&key);
                        Err(error)
                    }
                }
            }
            Err(error) => {
                let key = self.pending.remove(&error.id());
                if let Some(key) = &key {
                    self.binding.abandon(key);
                }
                let key = key.as_ref().map_or("?", FetchKey::as_str).to_string();
                let reason = if error.is_panic() { "panicked" } else { "was cancelled" };
                warn!(view = %self.view.name(), key = %key, reason, "fetch task did not complete");
                Err(anyhow::Error::new(error).context(format!("fetch {key} {reason}")))
            }
        }
    }

    fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Fetch(request) => {
                    let key = request.key.clone();
                    let handle = self.fetches.spawn(request.run());
                    self.pending.insert(handle.id(), key);
                }
                Effect::Warn(warning) => {
                    if self.warnings.len() >= WARNING_CAPACITY {
                        let overflow = self.warnings.len() + 1 - WARNING_CAPACITY;
                        self.warnings.drain(..overflow);
                    }
                    self.warnings.push(warning);
                }
            }
        }
    }
}
