//! Pagination window for collection views.

use serde::Serialize;

use super::{CommandSink, ViewCommand};

/// Page navigation requested by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCommand {
    NextPage,
    PreviousPage,
    SetLimit(usize),
    SetPage(usize),
}

/// Current paging window. A zero limit disables windowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub limit: usize,
    pub offset: usize,
}

impl PageState {
    pub fn new(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn is_active(&self) -> bool {
        self.limit > 0
    }

    /// Zero-based page index of the current offset.
    pub fn page(&self) -> usize {
        if self.limit == 0 { 0 } else { self.offset / self.limit }
    }

    /// Applies `command` and reports whether the window changed.
    pub fn apply(&mut self, command: PageCommand) -> bool {
        let before = *self;
        match command {
            PageCommand::NextPage => self.offset = self.offset.saturating_add(self.limit),
            PageCommand::PreviousPage => self.offset = self.offset.saturating_sub(self.limit),
            PageCommand::SetLimit(limit) => self.limit = limit,
            PageCommand::SetPage(page) => self.offset = page.saturating_mul(self.limit),
        }
        *self != before
    }

    /// Window `[offset, offset + limit)` of `items`, or all of them when paging is off.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        if !self.is_active() {
            return items.to_vec();
        }
        let start = self.offset.min(items.len());
        let end = self.offset.saturating_add(self.limit).min(items.len());
        items[start..end].to_vec()
    }
}

/// Paging handle handed to a collection view's render function.
///
/// Each call posts a command back to the owning instance; the instance
/// re-evaluates once per change.
#[derive(Debug, Clone)]
pub struct PageController {
    state: PageState,
    sink: CommandSink,
}

impl PageController {
    pub(crate) fn new(state: PageState, sink: CommandSink) -> Self {
        Self { state, sink }
    }

    pub fn limit(&self) -> usize {
        self.state.limit
    }

    pub fn offset(&self) -> usize {
        self.state.offset
    }

    pub fn page(&self) -> usize {
        self.state.page()
    }

    pub fn next_page(&self) {
        self.send(PageCommand::NextPage);
    }

    pub fn previous_page(&self) {
        self.send(PageCommand::PreviousPage);
    }

    pub fn set_limit(&self, limit: usize) {
        self.send(PageCommand::SetLimit(limit));
    }

    pub fn set_page(&self, page: usize) {
        self.send(PageCommand::SetPage(page));
    }

    fn send(&self, command: PageCommand) {
        self.sink.send(ViewCommand::Page(command));
    }
}

impl PartialEq for PageController {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}
