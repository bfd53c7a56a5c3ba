//! Router error types.

use thiserror::Error;

/// Errors raised while registering routes or reversing them into URIs.
///
/// Registration errors (`TemplateSyntax`, `DuplicateRoute`) surface when the
/// route table is built, never while a request is being matched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A route template could not be tokenized.
    #[error("invalid route template '{template}': {reason}")]
    TemplateSyntax {
        /// The offending template.
        template: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two routes resolved to the same final name.
    #[error("a route named '{0}' is already registered")]
    DuplicateRoute(String),

    /// `reverse_uri` was asked for a name that is not registered.
    #[error("route '{0}' not found")]
    RouteNotFound(String),

    /// `reverse_uri` was not given a value for a binding or glob.
    #[error("missing route parameter '{0}'")]
    RouteParamMissing(String),
}

impl RouterError {
    pub(crate) fn syntax(template: &str, reason: impl Into<String>) -> Self {
        Self::TemplateSyntax {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
