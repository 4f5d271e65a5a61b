//! Route definition errors.

use thiserror::Error;

/// Result type alias using [`RouteError`].
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors raised while building a resource tree.
#[derive(Error, Debug)]
pub enum RouteError {
    /// A `{` without a matching `}` or vice versa.
    #[error("Unbalanced braces in segment '{segment}' of template '{template}'")]
    UnbalancedBraces {
        /// The offending template.
        template: String,
        /// The offending segment.
        segment: String,
    },

    /// A parameter without a name, e.g. `{}` or `{: \d+}`.
    #[error("Empty parameter name in template '{template}'")]
    EmptyParamName {
        /// The offending template.
        template: String,
    },

    /// A parameter pattern that is not a valid regular expression.
    #[error("Invalid pattern for parameter '{name}' in template '{template}': {source}")]
    InvalidPattern {
        /// The offending template.
        template: String,
        /// The parameter name.
        name: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// A catch-all parameter followed by further segments.
    #[error("Catch-all parameter must be the last segment in template '{template}'")]
    CatchAllNotLast {
        /// The offending template.
        template: String,
    },
}
