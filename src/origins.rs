use regex::Regex;

/// Resolved origin policy for a route.
///
/// The raw configuration shapes an origin policy accepts (a single string, a
/// list, a set, a pattern, or nothing at all) collapse into one tagged value
/// at resolution time; requests are answered by pattern-matching on it, never
/// by inspecting raw configuration again.
#[derive(Debug, Clone)]
pub(crate) enum Origins {
    /// Any origin is allowed.
    Any,

    /// A single allowed origin, compared case-sensitively.
    Exact(String),

    /// A finite set of allowed origins, kept in first-seen order.
    Set(Vec<String>),

    /// Origins fully matching this pattern are allowed.
    Pattern(Regex),
}

impl Origins {
    pub(crate) fn is_any(&self) -> bool {
        matches!(self, Origins::Any)
    }

    pub(crate) fn is_pattern(&self) -> bool {
        matches!(self, Origins::Pattern(_))
    }

    /// Case-sensitive membership test for a request's `Origin` value.
    ///
    /// A pattern must cover the entire origin string; a prefix or substring
    /// match is not enough to allow a request.
    pub(crate) fn contains(&self, origin: &str) -> bool {
        match self {
            Origins::Any => true,
            Origins::Exact(allowed) => allowed == origin,
            Origins::Set(allowed) => allowed.iter().any(|o| o == origin),
            Origins::Pattern(pattern) => pattern
                .find(origin)
                .map_or(false, |m| m.start() == 0 && m.end() == origin.len()),
        }
    }
}
