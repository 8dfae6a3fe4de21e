//! Shape-typed handles for stateful consumers.
//!
//! Long-lived consumers (types that keep their own state across updates)
//! register an instance here, hand in their current `source`, and ask for
//! the derived handle when they need it. Derivation is lazy and memoized per
//! `(instance, source id)`; a source with a different identifier invalidates
//! the memo.
//!
//! Instances live in a generational arena: a released slot is reused with a
//! bumped generation so stale [`InstanceId`]s never alias a newer instance.

use std::sync::Arc;

use tether_types::{EntityHandle, ShapeCatalog, ShapeId, SourceInput};
use tracing::debug;

use crate::{error::ConfigurationError, source::resolve_source};

/// Handle to a registered consumer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct AdapterEntry {
    type_name: String,
    shape: Option<ShapeId>,
    source: Option<SourceInput>,
    // Outer `None`: not derived yet. Inner `None`: derived, no source.
    derived: Option<Option<Arc<EntityHandle>>>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<AdapterEntry>,
}

/// Arena of consumer instances and their memoized handles.
#[derive(Debug, Default)]
pub struct ShapeAdapterCache {
    catalog: Arc<ShapeCatalog>,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ShapeAdapterCache {
    pub fn new(catalog: Arc<ShapeCatalog>) -> Self {
        Self {
            catalog,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Registers an instance of `type_name`, linked to `shape` when it has one.
    pub fn register(&mut self, type_name: impl Into<String>, shape: Option<ShapeId>, source: Option<SourceInput>) -> InstanceId {
        let entry = AdapterEntry {
            type_name: type_name.into(),
            shape,
            source,
            derived: None,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.entry = Some(entry);
            return InstanceId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        InstanceId { index, generation: 0 }
    }

    /// Replaces the instance's source. Returns true when the memo was invalidated.
    pub fn update_source(&mut self, id: InstanceId, source: Option<SourceInput>) -> bool {
        let Some(entry) = self.entry_mut(id) else {
            debug!(?id, "source update for released instance ignored");
            return false;
        };
        let changed = entry.source.as_ref().and_then(SourceInput::id) != source.as_ref().and_then(SourceInput::id)
            || entry.source.is_some() != source.is_some();
        entry.source = source;
        if changed {
            entry.derived = None;
        }
        changed
    }

    /// Derived handle for the instance's current source.
    ///
    /// Yields `Ok(None)` when there is no source (or the instance was
    /// released). Fails when a source is present but the instance's type was
    /// never linked to a shape.
    pub fn source_shape(&mut self, id: InstanceId) -> Result<Option<Arc<EntityHandle>>, ConfigurationError> {
        let catalog = Arc::clone(&self.catalog);
        let Some(entry) = self.entry_mut(id) else {
            return Ok(None);
        };
        if let Some(derived) = &entry.derived {
            return Ok(derived.clone());
        }
        let derived = match (&entry.source, &entry.shape) {
            (None, _) => None,
            (Some(_), None) => return Err(ConfigurationError::unlinked_type(&entry.type_name)),
            (Some(source), Some(shape)) => resolve_source(Some(source), shape, catalog.as_ref()),
        };
        debug!(type_name = %entry.type_name, derived = derived.is_some(), "source shape derived");
        entry.derived = Some(derived.clone());
        Ok(derived)
    }

    /// Drops the instance. Returns false for an already released id.
    pub fn release(&mut self, id: InstanceId) -> bool {
        if self.entry_mut(id).is_none() {
            return false;
        }
        self.slots[id.index as usize].entry = None;
        self.free.push(id.index);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_mut(&mut self, id: InstanceId) -> Option<&mut AdapterEntry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }
}
