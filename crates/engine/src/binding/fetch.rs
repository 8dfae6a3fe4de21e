//! Single-flight fetch slot.

use std::fmt;

/// Identifies one fetch of one view instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey(String);

impl FetchKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latest result plus the key of the outstanding fetch, if any.
#[derive(Debug, Clone)]
pub(crate) struct FetchState<T> {
    result: Option<T>,
    in_flight: Option<FetchKey>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            result: None,
            in_flight: None,
        }
    }
}

impl<T> FetchState<T> {
    /// Marks `key` as in flight. Returns false when that key is already outstanding.
    pub fn try_begin(&mut self, key: &FetchKey) -> bool {
        if self.in_flight.as_ref() == Some(key) {
            return false;
        }
        self.in_flight = Some(key.clone());
        true
    }

    /// Stores a completed result. Results of superseded fetches are applied
    /// too (last completion wins); only the matching key clears the slot.
    pub fn finish(&mut self, key: &FetchKey, result: T) -> bool {
        self.result = Some(result);
        let current = self.in_flight.as_ref() == Some(key);
        if current {
            self.in_flight = None;
        }
        current
    }

    /// Clears the slot for a failed fetch without touching the result.
    pub fn abandon(&mut self, key: &FetchKey) {
        if self.in_flight.as_ref() == Some(key) {
            self.in_flight = None;
        }
    }

    pub fn clear_result(&mut self) {
        self.result = None;
    }

    pub fn set_result(&mut self, result: T) {
        self.result = Some(result);
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn result_mut(&mut self) -> Option<&mut T> {
        self.result.as_mut()
    }

    pub fn in_flight(&self) -> Option<&FetchKey> {
        self.in_flight.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }
}
