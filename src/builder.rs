use std::{collections::HashSet, convert::TryInto, rc::Rc};

use actix_utils::future::{ok, Ready};
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::{Error, HttpError},
    http::{
        header::{HeaderName, HeaderValue},
        Method,
    },
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    config::{keys, ConfigProvider, ConfigValue},
    AllOrSome, ConfigError, CorsMiddleware, CorsPolicy, Origins,
};

static ALL_METHODS: Lazy<Vec<Method>> = Lazy::new(|| {
    vec![
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::OPTIONS,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ]
});

/// Builder for CORS policy middleware.
///
/// To construct a policy:
///
/// 1. Call [`Cors::default()`] to start building.
/// 2. Use any of the builder methods to set options explicitly.
/// 3. Call [`Cors::finish()`] or [`Cors::finish_with()`] to resolve the
///    policy into a middleware factory.
///
/// Each option resolves from exactly one source, in fixed precedence:
/// explicit builder value, then the application configuration's `CORS_*` key
/// (only with [`Cors::finish_with()`]), then the built-in default.
/// Misconfiguration is reported by `finish*` at route registration; once a
/// policy has resolved, serving requests through it cannot fail.
///
/// # Example
///
/// ```
/// use actix_cors_policy::Cors;
/// use actix_web::http::header;
///
/// let cors = Cors::default()
///     .allowed_origin("https://www.rust-lang.org")
///     .allowed_methods(vec!["GET", "POST"])
///     .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
///     .allowed_header(header::CONTENT_TYPE)
///     .max_age(3600)
///     .finish()
///     .unwrap();
///
/// // `cors` can now be used in `App::wrap`.
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cors {
    origins: Option<Origins>,
    methods: Option<Vec<Method>>,
    allow_headers: Option<AllOrSome<Vec<HeaderName>>>,
    expose_headers: Option<Vec<HeaderName>>,
    supports_credentials: Option<bool>,
    max_age: Option<usize>,
    send_wildcard: Option<bool>,
    always_send: Option<bool>,
    automatic_options: Option<bool>,
    vary_header: Option<bool>,
    origins_single: Option<bool>,

    error: Option<ConfigError>,
}

impl Cors {
    /// A very permissive set of options: any origin is allowed and echoed
    /// back, any header is allowed, and credentials are supported.
    ///
    /// Should only be used as a development configuration.
    pub fn permissive() -> Cors {
        Cors::default()
            .allow_any_origin()
            .origins_single()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600)
    }

    /// Resets the allowed origins to wildcard: requests from any origin are
    /// accepted.
    ///
    /// This is the default when neither the builder nor the application
    /// configuration sets origins.
    pub fn allow_any_origin(mut self) -> Cors {
        if self.error.is_none() {
            self.origins = Some(Origins::Any);
        }
        self
    }

    /// Adds an origin that is allowed to make requests.
    ///
    /// The client's `Origin` request header is checked against the
    /// configured origins in a case-sensitive manner. A single configured
    /// origin is an exact-match policy; repeated calls accumulate an ordered
    /// set, de-duplicated in first-seen order.
    ///
    /// Sets the [`ConfigError::WildcardOrigin`] error if the supplied origin
    /// is a literal wildcard (`*`); use [`Cors::send_wildcard()`] or
    /// [`Cors::allow_any_origin()`] instead. Adding an exact origin on top
    /// of a pattern policy sets [`ConfigError::MixedOriginPolicies`].
    pub fn allowed_origin(mut self, origin: &str) -> Cors {
        if self.error.is_some() {
            return self;
        }

        if origin == "*" {
            self.error = Some(ConfigError::WildcardOrigin);
            return self;
        }

        if matches!(self.origins, Some(Origins::Pattern(_))) {
            self.error = Some(ConfigError::MixedOriginPolicies);
            return self;
        }

        self.origins = Some(match self.origins.take() {
            // a single origin is an exact-match policy
            None | Some(Origins::Any) => Origins::Exact(origin.to_owned()),

            Some(Origins::Exact(prev)) => {
                if prev == origin {
                    Origins::Exact(prev)
                } else {
                    Origins::Set(vec![prev, origin.to_owned()])
                }
            }

            Some(Origins::Set(mut members)) => {
                if !members.iter().any(|o| o == origin) {
                    members.push(origin.to_owned());
                }
                Origins::Set(members)
            }

            // guarded by the `MixedOriginPolicies` early return above
            Some(Origins::Pattern(_)) => unreachable!(),
        });

        self
    }

    /// Sets the list of origins that are allowed to make requests.
    ///
    /// Equivalent to calling [`Cors::allowed_origin()`] for each entry.
    pub fn allowed_origins<I>(mut self, origins: I) -> Cors
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for origin in origins {
            self = self.allowed_origin(&origin.into());
        }
        self
    }

    /// Sets the allowed origins from an unordered set.
    ///
    /// Members are serialized in the set's iteration order, which is
    /// arbitrary but fixed for the lifetime of the resolved policy.
    pub fn allowed_origin_set(mut self, origins: HashSet<String>) -> Cors {
        if self.error.is_some() {
            return self;
        }

        match normalize_origin_members(origins.into_iter()) {
            Ok(origins) => self.origins = Some(origins),
            Err(err) => self.error = Some(err),
        }

        self
    }

    /// Allows origins that fully match the given pattern.
    ///
    /// The pattern is anchored to the whole origin, so a prefix or substring
    /// match is not enough to allow a request. A matched request has its own
    /// `Origin` value echoed back in `Access-Control-Allow-Origin`; an
    /// unmatched request receives no CORS headers at all. This policy cannot
    /// be combined with exact origins or with [`Cors::origins_single()`].
    pub fn allowed_origin_pattern(mut self, pattern: Regex) -> Cors {
        if self.error.is_some() {
            return self;
        }

        if matches!(self.origins, Some(Origins::Exact(_)) | Some(Origins::Set(_))) {
            self.error = Some(ConfigError::MixedOriginPolicies);
            return self;
        }

        match anchor_pattern(&pattern) {
            Ok(pattern) => self.origins = Some(Origins::Pattern(pattern)),
            Err(err) => self.error = Some(err),
        }

        self
    }

    /// Sets the list of methods which allowed origins can perform.
    ///
    /// These are sent in the `Access-Control-Allow-Methods` response header
    /// when answering a preflight request, which also adds `OPTIONS` to the
    /// list if it is missing. Method names are folded to their canonical
    /// uppercase form and de-duplicated in first-seen order.
    ///
    /// Defaults to `[GET, HEAD, POST, OPTIONS, PUT, PATCH, DELETE]`.
    pub fn allowed_methods<U, M>(mut self, methods: U) -> Cors
    where
        U: IntoIterator<Item = M>,
        M: TryInto<Method>,
        <M as TryInto<Method>>::Error: Into<HttpError>,
    {
        if self.error.is_some() {
            return self;
        }

        let mut list = self.methods.take().unwrap_or_default();

        for method in methods {
            match method.try_into() {
                // `try_into` keeps a lowercase name as an extension method;
                // re-parse the uppercased form so `get` and `GET` are one
                Ok(method) => match parse_method(method.as_str()) {
                    Ok(method) => {
                        if !list.contains(&method) {
                            list.push(method);
                        }
                    }

                    Err(err) => {
                        self.error = Some(err);
                        break;
                    }
                },

                Err(err) => {
                    self.error = Some(ConfigError::InvalidMethod(err.into().to_string()));
                    break;
                }
            }
        }

        self.methods = Some(list);
        self
    }

    /// Resets allowed request headers to a state where any header is
    /// allowed.
    ///
    /// In this state, whatever the client requests in
    /// `Access-Control-Request-Headers` is echoed back in
    /// `Access-Control-Allow-Headers` when answering a preflight. This is
    /// the default when neither the builder nor the application
    /// configuration sets allowed headers.
    pub fn allow_any_header(mut self) -> Cors {
        if self.error.is_none() {
            self.allow_headers = Some(AllOrSome::All);
        }
        self
    }

    /// Adds an allowed request header.
    ///
    /// See [`Cors::allowed_headers()`] for details.
    pub fn allowed_header<H>(mut self, header: H) -> Cors
    where
        H: TryInto<HeaderName>,
        <H as TryInto<HeaderName>>::Error: Into<HttpError>,
    {
        if self.error.is_some() {
            return self;
        }

        match header.try_into() {
            Ok(header) => {
                let allow = self
                    .allow_headers
                    .get_or_insert(AllOrSome::Some(Vec::new()));

                if allow.is_all() {
                    *allow = AllOrSome::Some(Vec::new());
                }

                if let AllOrSome::Some(list) = allow {
                    if !list.contains(&header) {
                        list.push(header);
                    }
                }
            }

            Err(err) => {
                self.error = Some(ConfigError::InvalidHeaderName(err.into().to_string()));
            }
        }

        self
    }

    /// Sets the list of header names which can be used when this resource is
    /// accessed by allowed origins.
    ///
    /// The list is sent in `Access-Control-Allow-Headers` when answering a
    /// preflight request, canonical-cased and de-duplicated in first-seen
    /// order.
    ///
    /// Defaults to any header being allowed.
    pub fn allowed_headers<U, H>(mut self, headers: U) -> Cors
    where
        U: IntoIterator<Item = H>,
        H: TryInto<HeaderName>,
        <H as TryInto<HeaderName>>::Error: Into<HttpError>,
    {
        for header in headers {
            if self.error.is_some() {
                break;
            }
            self = self.allowed_header(header);
        }
        self
    }

    /// Sets the list of headers which are safe to expose to the API of a
    /// CORS response.
    ///
    /// The list corresponds to the `Access-Control-Expose-Headers` response
    /// header. By default no headers are exposed and the header is omitted.
    pub fn expose_headers<U, H>(mut self, headers: U) -> Cors
    where
        U: IntoIterator<Item = H>,
        H: TryInto<HeaderName>,
        <H as TryInto<HeaderName>>::Error: Into<HttpError>,
    {
        if self.error.is_some() {
            return self;
        }

        let mut list = self.expose_headers.take().unwrap_or_default();

        for header in headers {
            match header.try_into() {
                Ok(header) => {
                    if !list.contains(&header) {
                        list.push(header);
                    }
                }

                Err(err) => {
                    self.error = Some(ConfigError::InvalidHeaderName(err.into().to_string()));
                    break;
                }
            }
        }

        self.expose_headers = Some(list);
        self
    }

    /// Allows users to make authenticated requests.
    ///
    /// If set, injects the `Access-Control-Allow-Credentials` header into
    /// responses. This allows cookies and credentials to be submitted across
    /// domains.
    ///
    /// This option cannot be combined with [`Cors::send_wildcard()`] on a
    /// wildcard origin policy; that combination fails resolution with
    /// [`ConfigError::CredentialsWithWildcard`].
    ///
    /// Defaults to `false`.
    pub fn supports_credentials(mut self) -> Cors {
        if self.error.is_none() {
            self.supports_credentials = Some(true);
        }
        self
    }

    /// Sets the maximum time (in seconds) for which preflight answers may be
    /// cached, sent as the `Access-Control-Max-Age` header.
    ///
    /// Defaults to unset, omitting the header.
    pub fn max_age(mut self, max_age: usize) -> Cors {
        if self.error.is_none() {
            self.max_age = Some(max_age);
        }
        self
    }

    /// Answers every request with a wildcard `Access-Control-Allow-Origin`,
    /// regardless of the request's `Origin` header or the configured origin
    /// list.
    ///
    /// Defaults to `false`.
    pub fn send_wildcard(mut self) -> Cors {
        if self.error.is_none() {
            self.send_wildcard = Some(true);
        }
        self
    }

    /// Echoes the request's own `Origin` value in
    /// `Access-Control-Allow-Origin` when it is allowed, instead of the
    /// serialized origin list.
    ///
    /// Defaults to `false`.
    pub fn origins_single(mut self) -> Cors {
        if self.error.is_none() {
            self.origins_single = Some(true);
        }
        self
    }

    /// Omits `Access-Control-Allow-Origin` entirely on requests that carry
    /// no `Origin` header.
    ///
    /// By default such requests are still answered with the configured
    /// origins (`*` for a wildcard policy).
    pub fn disable_always_send(mut self) -> Cors {
        if self.error.is_none() {
            self.always_send = Some(false);
        }
        self
    }

    /// Disables `Vary` header support.
    ///
    /// Appending `Origin` to `Vary` when the allowed origin is dynamically
    /// generated informs CDNs and other caches that the CORS headers cannot
    /// be cached across origins.
    ///
    /// By default `Vary` header support is enabled.
    pub fn disable_vary_header(mut self) -> Cors {
        if self.error.is_none() {
            self.vary_header = Some(false);
        }
        self
    }

    /// Disables automatic handling of `OPTIONS` preflight requests.
    ///
    /// By default the middleware intercepts `OPTIONS` requests and answers
    /// them with an empty 200 response without invoking the wrapped handler.
    /// With preflight disabled, `OPTIONS` requests reach the handler like
    /// any other method.
    pub fn disable_preflight(mut self) -> Cors {
        if self.error.is_none() {
            self.automatic_options = Some(false);
        }
        self
    }

    /// Resolves the policy using built-in defaults for all unset options.
    pub fn finish(self) -> Result<CorsFactory, ConfigError> {
        self.finish_with(&())
    }

    /// Resolves the policy, reading `CORS_*` keys from `config` for options
    /// not set on the builder.
    ///
    /// This is the only point that can fail; the returned factory serves
    /// requests without any fallible work.
    pub fn finish_with(self, config: &impl ConfigProvider) -> Result<CorsFactory, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let origins = match self.origins {
            Some(origins) => origins,
            None => match config.get(keys::ORIGINS) {
                Some(value) => origins_from_config(value)?,
                None => Origins::Any,
            },
        };

        let mut methods = match self.methods {
            Some(methods) => methods,
            None => match config.get(keys::METHODS) {
                Some(value) => methods_from_config(value)?,
                None => ALL_METHODS.clone(),
            },
        };

        let allow_headers = match self.allow_headers {
            Some(allow) => allow,
            None => match config.get(keys::HEADERS) {
                Some(value) => allow_headers_from_config(value)?,
                None => AllOrSome::All,
            },
        };

        let expose_headers = match self.expose_headers {
            Some(expose) => Some(expose),
            None => match config.get(keys::EXPOSE_HEADERS) {
                Some(value) => Some(header_list_from_config(keys::EXPOSE_HEADERS, value)?),
                None => None,
            },
        };

        let max_age = match self.max_age {
            Some(max_age) => Some(max_age),
            None => match config.get(keys::MAX_AGE) {
                Some(ConfigValue::Number(max_age)) => Some(max_age as usize),
                Some(other) => {
                    return Err(ConfigError::unsupported(keys::MAX_AGE, "number", &other))
                }
                None => None,
            },
        };

        let supports_credentials = bool_option(
            self.supports_credentials,
            config,
            keys::SUPPORTS_CREDENTIALS,
            false,
        )?;
        let send_wildcard = bool_option(self.send_wildcard, config, keys::SEND_WILDCARD, false)?;
        let always_send = bool_option(self.always_send, config, keys::ALWAYS_SEND, true)?;
        let automatic_options =
            bool_option(self.automatic_options, config, keys::AUTOMATIC_OPTIONS, true)?;
        let vary_header = bool_option(self.vary_header, config, keys::VARY_HEADER, true)?;
        let origins_single = bool_option(self.origins_single, config, keys::ORIGINS_SINGLE, false)?;

        if origins_single && origins.is_pattern() {
            return Err(ConfigError::OriginsSingleWithPattern);
        }

        if supports_credentials && send_wildcard && origins.is_any() {
            return Err(ConfigError::CredentialsWithWildcard);
        }

        // preflight interception answers with the allowed methods; OPTIONS
        // itself must be among them
        if automatic_options && !methods.contains(&Method::OPTIONS) {
            methods.push(Method::OPTIONS);
        }

        let origins_baked = bake_origins(&origins)?;
        let methods_baked = intersperse_values(methods.iter().map(Method::as_str));

        let allow_headers_baked = allow_headers
            .as_ref()
            .map(|headers| intersperse_values(headers.iter().map(HeaderName::as_str)));

        let expose_headers_baked = expose_headers
            .as_ref()
            .filter(|headers| !headers.is_empty())
            .map(|headers| intersperse_values(headers.iter().map(HeaderName::as_str)));

        Ok(CorsFactory {
            inner: Rc::new(CorsPolicy {
                origins,
                origins_baked,
                methods_baked,
                allow_headers_baked,
                expose_headers_baked,
                supports_credentials,
                max_age,
                send_wildcard,
                always_send,
                automatic_options,
                vary_header,
                origins_single,
            }),
        })
    }
}

/// Resolved CORS middleware factory.
///
/// Produced by [`Cors::finish()`] or [`Cors::finish_with()`] and used as an
/// argument for Actix Web's `App::wrap()`, `Scope::wrap()`, or
/// `Resource::wrap()` methods. Holds the immutable policy shared, read-only,
/// by every request through the wrapped service.
#[derive(Debug, Clone)]
pub struct CorsFactory {
    pub(crate) inner: Rc<CorsPolicy>,
}

impl<S, B> Transform<S, ServiceRequest> for CorsFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
    B::Error: Into<Error>,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorsMiddleware {
            service,
            inner: Rc::clone(&self.inner),
        })
    }
}

/// De-duplicates raw origin members preserving first-seen order.
///
/// An empty collection is the wildcard policy; a literal `*` member is
/// rejected.
fn normalize_origin_members(
    origins: impl Iterator<Item = String>,
) -> Result<Origins, ConfigError> {
    let mut members = Vec::new();

    for origin in origins {
        if origin == "*" {
            return Err(ConfigError::WildcardOrigin);
        }

        if !members.contains(&origin) {
            members.push(origin);
        }
    }

    if members.is_empty() {
        Ok(Origins::Any)
    } else {
        Ok(Origins::Set(members))
    }
}

/// Anchors a pattern so only a whole-origin match allows a request.
///
/// Anchoring also keeps alternations exact: unanchored, `a|ab` against the
/// origin `ab` finds the leftmost match `a` and would wrongly deny it.
fn anchor_pattern(pattern: &Regex) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{})$", pattern.as_str()))
        .map_err(|_| ConfigError::InvalidOriginPattern(pattern.as_str().to_owned()))
}

fn origins_from_config(value: ConfigValue) -> Result<Origins, ConfigError> {
    match value {
        ConfigValue::Str(origin) => {
            if origin == "*" || origin.is_empty() {
                Ok(Origins::Any)
            } else {
                Ok(Origins::Exact(origin))
            }
        }

        ConfigValue::List(origins) => normalize_origin_members(origins.into_iter()),
        ConfigValue::Set(origins) => normalize_origin_members(origins.into_iter()),
        ConfigValue::Pattern(pattern) => anchor_pattern(&pattern).map(Origins::Pattern),

        other => Err(ConfigError::unsupported(
            keys::ORIGINS,
            "string, list, set, or pattern",
            &other,
        )),
    }
}

fn methods_from_config(value: ConfigValue) -> Result<Vec<Method>, ConfigError> {
    let names = match value {
        ConfigValue::Str(name) => vec![name],
        ConfigValue::List(names) => names,
        other => {
            return Err(ConfigError::unsupported(
                keys::METHODS,
                "string or list",
                &other,
            ))
        }
    };

    let mut methods = Vec::with_capacity(names.len());

    for name in names {
        let method = parse_method(&name)?;

        if !methods.contains(&method) {
            methods.push(method);
        }
    }

    Ok(methods)
}

fn parse_method(name: &str) -> Result<Method, ConfigError> {
    name.trim()
        .to_ascii_uppercase()
        .parse::<Method>()
        .map_err(|_| ConfigError::InvalidMethod(name.to_owned()))
}

fn allow_headers_from_config(value: ConfigValue) -> Result<AllOrSome<Vec<HeaderName>>, ConfigError> {
    if let ConfigValue::Str(name) = &value {
        if name == "*" {
            return Ok(AllOrSome::All);
        }
    }

    header_list_from_config(keys::HEADERS, value).map(AllOrSome::Some)
}

fn header_list_from_config(
    key: &'static str,
    value: ConfigValue,
) -> Result<Vec<HeaderName>, ConfigError> {
    let names = match value {
        ConfigValue::Str(name) => vec![name],
        ConfigValue::List(names) => names,
        other => return Err(ConfigError::unsupported(key, "string or list", &other)),
    };

    let mut headers = Vec::with_capacity(names.len());

    for name in names {
        let header = name
            .trim()
            .parse::<HeaderName>()
            .map_err(|_| ConfigError::InvalidHeaderName(name.clone()))?;

        if !headers.contains(&header) {
            headers.push(header);
        }
    }

    Ok(headers)
}

fn bool_option(
    explicit: Option<bool>,
    config: &impl ConfigProvider,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match explicit {
        Some(value) => Ok(value),
        None => match config.get(key) {
            Some(ConfigValue::Bool(value)) => Ok(value),
            Some(other) => Err(ConfigError::unsupported(key, "boolean", &other)),
            None => Ok(default),
        },
    }
}

fn bake_origins(origins: &Origins) -> Result<Option<HeaderValue>, ConfigError> {
    match origins {
        Origins::Any => Ok(Some(HeaderValue::from_static("*"))),

        Origins::Exact(origin) => HeaderValue::from_str(origin)
            .map(Some)
            .map_err(|_| ConfigError::InvalidOrigin(origin.clone())),

        Origins::Set(members) => {
            for origin in members {
                if HeaderValue::from_str(origin).is_err() {
                    return Err(ConfigError::InvalidOrigin(origin.clone()));
                }
            }

            Ok(Some(intersperse_values(members.iter().map(String::as_str))))
        }

        Origins::Pattern(_) => Ok(None),
    }
}

/// Folds a list of values into a single comma-separated `HeaderValue`.
fn intersperse_values<'a>(values: impl Iterator<Item = &'a str>) -> HeaderValue {
    let mut buf = String::with_capacity(32);

    for value in values {
        if !buf.is_empty() {
            buf.push_str(", ");
        }
        buf.push_str(value);
    }

    // method names, header names, and validated origins are always valid
    // header value characters
    buf.try_into().unwrap()
}
