//! Application-level configuration lookup.
//!
//! Options not set on the [`Cors`](crate::Cors) builder fall back to
//! application configuration before the built-in defaults apply. The lookup
//! goes through an explicit [`ConfigProvider`] passed to
//! [`Cors::finish_with`](crate::Cors::finish_with) rather than any ambient
//! global state.

use std::collections::{HashMap, HashSet};

use regex::Regex;

/// Configuration keys recognized by [`Cors::finish_with`](crate::Cors::finish_with).
pub mod keys {
    /// Allowed origins: string, list, set, or pattern. `"*"` means any origin.
    pub const ORIGINS: &str = "CORS_ORIGINS";

    /// Allowed methods: string or list of method names.
    pub const METHODS: &str = "CORS_METHODS";

    /// Allowed request headers: string or list. `"*"` means any header.
    pub const HEADERS: &str = "CORS_HEADERS";

    /// Headers safe to expose to the browser: string or list.
    pub const EXPOSE_HEADERS: &str = "CORS_EXPOSE_HEADERS";

    /// Emit `Access-Control-Allow-Credentials` (boolean).
    pub const SUPPORTS_CREDENTIALS: &str = "CORS_SUPPORTS_CREDENTIALS";

    /// Preflight cache lifetime in seconds (number).
    pub const MAX_AGE: &str = "CORS_MAX_AGE";

    /// Always answer with `*`, ignoring the request origin (boolean).
    pub const SEND_WILDCARD: &str = "CORS_SEND_WILDCARD";

    /// Emit `Access-Control-Allow-Origin` even when the request carries no
    /// `Origin` header (boolean).
    pub const ALWAYS_SEND: &str = "CORS_ALWAYS_SEND";

    /// Intercept and answer `OPTIONS` preflight requests (boolean).
    pub const AUTOMATIC_OPTIONS: &str = "CORS_AUTOMATIC_OPTIONS";

    /// Append `Origin` to the `Vary` response header when the allowed origin
    /// is not the wildcard (boolean).
    pub const VARY_HEADER: &str = "CORS_VARY_HEADER";

    /// Echo the request's own origin when it is allowed, instead of the
    /// serialized origin list (boolean).
    pub const ORIGINS_SINGLE: &str = "CORS_ORIGINS_SINGLE";
}

/// A loosely typed configuration value.
///
/// Application config stores are stringly keyed and hold values of several
/// shapes. Each CORS option accepts a subset of these shapes; resolution
/// rejects the rest with [`ConfigError::UnsupportedType`](crate::ConfigError).
#[derive(Debug, Clone)]
pub enum ConfigValue {
    /// A single string, e.g. one origin, or `"*"`.
    Str(String),

    /// An ordered list of strings.
    List(Vec<String>),

    /// An unordered set of strings.
    Set(HashSet<String>),

    /// A compiled pattern (origins only).
    Pattern(Regex),

    /// A boolean flag.
    Bool(bool),

    /// A non-negative integer.
    Number(u64),
}

impl ConfigValue {
    /// Shape name used in error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Str(_) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Set(_) => "set",
            ConfigValue::Pattern(_) => "pattern",
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Number(_) => "number",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(value: Vec<String>) -> Self {
        ConfigValue::List(value)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(value: Vec<&str>) -> Self {
        ConfigValue::List(value.into_iter().map(ToOwned::to_owned).collect())
    }
}

impl From<HashSet<String>> for ConfigValue {
    fn from(value: HashSet<String>) -> Self {
        ConfigValue::Set(value)
    }
}

impl From<Regex> for ConfigValue {
    fn from(value: Regex) -> Self {
        ConfigValue::Pattern(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<u64> for ConfigValue {
    fn from(value: u64) -> Self {
        ConfigValue::Number(value)
    }
}

/// Source of application-level `CORS_*` defaults.
///
/// Passed to [`Cors::finish_with`](crate::Cors::finish_with). Options left
/// unset on the builder resolve from this provider before the built-in
/// defaults; options set on the builder never consult it.
pub trait ConfigProvider {
    /// Looks up a configuration value by key.
    fn get(&self, key: &str) -> Option<ConfigValue>;
}

/// The empty configuration: built-in defaults only.
impl ConfigProvider for () {
    fn get(&self, _key: &str) -> Option<ConfigValue> {
        None
    }
}

impl ConfigProvider for HashMap<String, ConfigValue> {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        HashMap::get(self, key).cloned()
    }
}

impl<'a> ConfigProvider for HashMap<&'a str, ConfigValue> {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        HashMap::get(self, key).cloned()
    }
}
