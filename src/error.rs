use derive_more::{Display, Error};

use crate::config::ConfigValue;

/// Errors raised while resolving a CORS policy at route-registration time.
///
/// Misconfiguration fails registration, never individual requests: once a
/// policy has resolved, request-time header computation is total and cannot
/// fail.
#[derive(Debug, Clone, Display, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A configuration value has a shape the option does not accept.
    #[display(fmt = "unsupported type for `{}`: expected {}, found {}", key, expected, found)]
    UnsupportedType {
        /// Configuration key that carried the value.
        key: &'static str,

        /// Shapes the option accepts.
        expected: &'static str,

        /// Shape that was supplied.
        found: &'static str,
    },

    /// A literal `*` appeared inside an origin list.
    #[display(fmt = "`*` is not a valid member of an origin list; use a wildcard origin policy")]
    WildcardOrigin,

    /// An allowed origin is not a valid header value.
    #[display(fmt = "origin `{}` is not a valid header value", _0)]
    InvalidOrigin(#[error(not(source))] String),

    /// An entry in the allowed methods list is not a valid HTTP method.
    #[display(fmt = "invalid entry in allowed methods list: {}", _0)]
    InvalidMethod(#[error(not(source))] String),

    /// A header list entry is not a valid header name.
    #[display(fmt = "invalid header name: {}", _0)]
    InvalidHeaderName(#[error(not(source))] String),

    /// An origin pattern failed to compile once anchored to the whole
    /// origin.
    #[display(fmt = "invalid origin pattern: {}", _0)]
    InvalidOriginPattern(#[error(not(source))] String),

    /// Exact origins and a pattern cannot describe one policy; a request
    /// origin belongs to a list or matches a pattern, never both.
    #[display(fmt = "exact origins cannot be combined with a pattern origin policy")]
    MixedOriginPolicies,

    /// `origins_single` echoes one matched origin; a pattern policy has no
    /// unambiguous value to echo when the request carries no origin.
    #[display(fmt = "`origins_single` cannot be combined with a pattern origin policy")]
    OriginsSingleWithPattern,

    /// The CORS protocol forbids credentialed requests to a wildcard origin.
    #[display(fmt = "credentials are allowed, but the allowed origin is set to `*`")]
    CredentialsWithWildcard,
}

impl ConfigError {
    pub(crate) fn unsupported(
        key: &'static str,
        expected: &'static str,
        found: &ConfigValue,
    ) -> ConfigError {
        ConfigError::UnsupportedType {
            key,
            expected,
            found: found.kind(),
        }
    }
}
