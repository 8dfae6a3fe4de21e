//! Error and warning types for view binding.
//!
//! Errors are programmer mistakes (a malformed declaration, a missing backend,
//! an input of the wrong type) and abort the affected view instance.
//! Warnings are non-fatal conditions that are logged and reported back as
//! [`crate::Effect::Warn`] so hosts and tests can observe them.

use std::fmt;

use tether_types::{QueryDocumentError, ShapeId};
use thiserror::Error;

/// Main error type for binding operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid argument 'of' provided to {view}: {reason}")]
    InvalidArgument { view: String, reason: String },
}

/// Malformed declarations and missing collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Only one key is allowed to map a query to a property for collection views (found {count})")]
    QueryKeyCount { count: usize },

    #[error("Unknown value type for query key '{key}'. Keep to this format: {{propName: query}}")]
    UnknownValueType { key: String },

    #[error("Unknown data query type ({found}). Expected a query or an object with 1 key whose value is a query")]
    UnknownQueryType { found: String },

    #[error("No query backend configured for shape {shape}")]
    MissingBackend { shape: ShapeId },

    #[error("{type_name} is not linked to a shape")]
    UnlinkedType { type_name: String },

    #[error("Invalid query declaration: {0}")]
    InvalidQuery(#[from] QueryDocumentError),
}

impl BindingError {
    /// Create an invalid argument error naming the offending view.
    pub fn invalid_argument(view: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            view: view.into(),
            reason: reason.into(),
        }
    }

    /// Returns the configuration error, if this is one.
    pub fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            Self::Configuration(error) => Some(error),
            Self::InvalidArgument { .. } => None,
        }
    }
}

impl ConfigurationError {
    pub fn missing_backend(shape: &ShapeId) -> Self {
        Self::MissingBackend { shape: shape.clone() }
    }

    pub fn unlinked_type(type_name: impl Into<String>) -> Self {
        Self::UnlinkedType {
            type_name: type_name.into(),
        }
    }
}

/// Non-fatal conditions reported while binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingWarning {
    /// A single-entity view received no source and its query has no subject.
    MissingSource { view: String },
    /// A fetch was requested for an identity that is already in flight.
    DuplicateFetch { view: String, identity: String },
}

impl fmt::Display for BindingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSource { view } => {
                write!(f, "This view requires a source to be provided (use the input \"of\"): {view}")
            }
            Self::DuplicateFetch { identity, .. } => {
                write!(f, "Already loading data for source {identity}, ignoring request")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_messages_name_the_problem() {
        let error = BindingError::from(ConfigurationError::QueryKeyCount { count: 2 });
        assert!(error.to_string().contains("Only one key is allowed"));

        let error = BindingError::from(ConfigurationError::missing_backend(&ShapeId::from("Person")));
        assert!(error.to_string().contains("No query backend configured for shape Person"));

        let error = ConfigurationError::unlinked_type("BrokenCard");
        assert_eq!(error.to_string(), "BrokenCard is not linked to a shape");
    }

    #[test]
    fn invalid_argument_names_the_view() {
        let error = BindingError::invalid_argument("NameList", "expected an entity set");
        assert!(matches!(error, BindingError::InvalidArgument { .. }));
        assert!(error.to_string().contains("NameList"));
        assert!(error.as_configuration().is_none());
    }

    #[test]
    fn warnings_render_log_lines() {
        let warning = BindingWarning::DuplicateFetch {
            view: "PersonCard".into(),
            identity: "p1".into(),
        };
        assert_eq!(warning.to_string(), "Already loading data for source p1, ignoring request");
        let warning = BindingWarning::MissingSource { view: "PersonCard".into() };
        assert!(warning.to_string().contains("requires a source"));
    }
}
