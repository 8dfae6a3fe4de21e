//! Binding configuration.
//!
//! Page size is passed explicitly to collection declarations through
//! [`BindingConfig`]. The process-wide default only seeds
//! [`BindingConfig::default`] and only affects views whose query declares no
//! limit of its own.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Page size used when neither the query nor the configuration sets one.
pub const DEFAULT_PAGE_SIZE: usize = 12;

static PROCESS_PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Returns the current process-wide default page size.
pub fn default_page_size() -> usize {
    PROCESS_PAGE_SIZE.load(Ordering::Relaxed)
}

/// Overrides the process-wide default page size. Zero disables paging for
/// views that rely on the default.
pub fn set_default_page_size(page_size: usize) {
    PROCESS_PAGE_SIZE.store(page_size, Ordering::Relaxed);
}

/// Restores [`DEFAULT_PAGE_SIZE`] as the process-wide default.
pub fn reset_default_page_size() {
    set_default_page_size(DEFAULT_PAGE_SIZE);
}

/// Configuration applied when declaring a bound view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingConfig {
    /// Page size for collection views whose query declares no limit.
    pub default_page_size: usize,
}

impl BindingConfig {
    pub const fn with_page_size(default_page_size: usize) -> Self {
        Self { default_page_size }
    }
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}
