//! Loading placeholder and render outcome.

use serde::Serialize;

/// Status indicator shown instead of a view while its data is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadingPlaceholder {
    pub role: &'static str,
    pub label: &'static str,
    pub class_name: &'static str,
}

impl LoadingPlaceholder {
    pub const fn new() -> Self {
        Self {
            role: "status",
            label: "Loading",
            class_name: "ld-loader",
        }
    }
}

impl Default for LoadingPlaceholder {
    fn default() -> Self {
        Self::new()
    }
}

/// What a bound view instance shows for its current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered<T> {
    /// Nothing at all (no source and no subject).
    Empty,
    /// Data is outstanding; the render function is not invoked.
    Loading(LoadingPlaceholder),
    /// The render function's output, or the props handed to it.
    View(T),
}

impl<T> Rendered<T> {
    pub fn loading() -> Self {
        Self::Loading(LoadingPlaceholder::new())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Rendered<U> {
        match self {
            Self::Empty => Rendered::Empty,
            Self::Loading(placeholder) => Rendered::Loading(placeholder),
            Self::View(view) => Rendered::View(f(view)),
        }
    }

    pub fn as_ref(&self) -> Rendered<&T> {
        match self {
            Self::Empty => Rendered::Empty,
            Self::Loading(placeholder) => Rendered::Loading(*placeholder),
            Self::View(view) => Rendered::View(view),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn view(&self) -> Option<&T> {
        match self {
            Self::View(view) => Some(view),
            _ => None,
        }
    }

    pub fn into_view(self) -> Option<T> {
        match self {
            Self::View(view) => Some(view),
            _ => None,
        }
    }
}
