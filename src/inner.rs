use actix_web::{
    dev::RequestHead,
    http::header::{self, HeaderName, HeaderValue},
};
use smallvec::SmallVec;

use crate::Origins;

/// Per-request computed header list; six slots cover every non-preflight case.
pub(crate) type HeaderList = SmallVec<[(HeaderName, HeaderValue); 6]>;

fn wildcard() -> HeaderValue {
    HeaderValue::from_static("*")
}

/// Outcome of evaluating the origin policy against one request.
#[derive(Debug, Clone)]
pub(crate) struct OriginMatch {
    /// Whether the request is acceptable under the policy.
    pub(crate) allowed: bool,

    /// Value for `Access-Control-Allow-Origin`, if one should be sent.
    pub(crate) echo: Option<HeaderValue>,
}

impl OriginMatch {
    fn allowed(echo: HeaderValue) -> OriginMatch {
        OriginMatch {
            allowed: true,
            echo: Some(echo),
        }
    }

    fn denied() -> OriginMatch {
        OriginMatch {
            allowed: false,
            echo: None,
        }
    }
}

/// A resolved, immutable CORS policy.
///
/// Built once at route registration by [`Cors::finish`](crate::Cors::finish)
/// and shared read-only across all requests through the route. Serialized
/// header values are baked here so request-time work is clone-and-insert
/// only and cannot fail.
#[derive(Debug, Clone)]
pub(crate) struct CorsPolicy {
    pub(crate) origins: Origins,
    /// Serialized origins: `*`, the exact origin, or the joined set. A
    /// pattern policy has no serialized form.
    pub(crate) origins_baked: Option<HeaderValue>,

    pub(crate) methods_baked: HeaderValue,
    /// `None` means all headers are allowed and the request's own
    /// `Access-Control-Request-Headers` is echoed back.
    pub(crate) allow_headers_baked: Option<HeaderValue>,
    pub(crate) expose_headers_baked: Option<HeaderValue>,

    pub(crate) supports_credentials: bool,
    pub(crate) max_age: Option<usize>,
    pub(crate) send_wildcard: bool,
    pub(crate) always_send: bool,
    pub(crate) automatic_options: bool,
    pub(crate) vary_header: bool,
    pub(crate) origins_single: bool,
}

impl CorsPolicy {
    /// Evaluates the origin policy against a request's `Origin` header.
    pub(crate) fn match_origin(&self, request_origin: Option<&HeaderValue>) -> OriginMatch {
        if self.send_wildcard {
            return OriginMatch::allowed(wildcard());
        }

        let origin = match request_origin {
            Some(origin) => origin,

            // No `Origin` header: there is nothing to echo, but a policy
            // with `always_send` still advertises its configured origins.
            None => {
                return if self.always_send {
                    OriginMatch {
                        allowed: true,
                        echo: self.origins_baked.clone(),
                    }
                } else {
                    OriginMatch::denied()
                };
            }
        };

        match &self.origins {
            Origins::Any => {
                if self.origins_single {
                    OriginMatch::allowed(origin.clone())
                } else {
                    OriginMatch::allowed(wildcard())
                }
            }

            Origins::Exact(_) | Origins::Set(_) => match origin.to_str() {
                Ok(value) if self.origins.contains(value) => {
                    if self.origins_single {
                        OriginMatch::allowed(origin.clone())
                    } else {
                        OriginMatch {
                            allowed: true,
                            echo: self.origins_baked.clone(),
                        }
                    }
                }
                _ => OriginMatch::denied(),
            },

            // a pattern can only ever echo the request's own origin
            Origins::Pattern(_) => match origin.to_str() {
                Ok(value) if self.origins.contains(value) => {
                    OriginMatch::allowed(origin.clone())
                }
                _ => OriginMatch::denied(),
            },
        }
    }

    /// Composes the CORS headers for one request.
    ///
    /// Resolution has already validated everything that could fail, so this
    /// is a total function of the policy and the request.
    pub(crate) fn build_headers(
        &self,
        origin: &OriginMatch,
        req: &RequestHead,
        preflight: bool,
    ) -> HeaderList {
        let mut headers = HeaderList::new();

        if let Some(ref echo) = origin.echo {
            headers.push((header::ACCESS_CONTROL_ALLOW_ORIGIN, echo.clone()));
        }

        if self.supports_credentials {
            headers.push((
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ));
        }

        if let Some(ref expose) = self.expose_headers_baked {
            headers.push((header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone()));
        }

        if let Some(max_age) = self.max_age {
            headers.push((header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age)));
        }

        if preflight {
            headers.push((
                header::ACCESS_CONTROL_ALLOW_METHODS,
                self.methods_baked.clone(),
            ));

            if let Some(ref allow) = self.allow_headers_baked {
                headers.push((header::ACCESS_CONTROL_ALLOW_HEADERS, allow.clone()));
            } else if let Some(request_headers) =
                req.headers().get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            {
                // all headers allowed; echo whatever the client asked for
                headers.push((
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    request_headers.clone(),
                ));
            }
        }

        headers
    }

    /// `Vary: Origin` value, merged with the response's existing `Vary`
    /// header.
    ///
    /// Skipped when the allowed origin is the literal wildcard, since the
    /// response is then identical for every origin.
    pub(crate) fn vary_value(
        &self,
        origin: &OriginMatch,
        existing: Option<&HeaderValue>,
    ) -> Option<HeaderValue> {
        if !self.vary_header {
            return None;
        }

        if let Some(echo) = origin.echo.as_ref() {
            if echo.as_bytes() == b"*" {
                return None;
            }
        }

        Some(match existing {
            Some(vary) => {
                let mut merged = SmallVec::<[u8; 64]>::new();
                merged.extend_from_slice(vary.as_bytes());
                merged.extend_from_slice(b", Origin");

                // appending ASCII to a valid header value stays valid
                HeaderValue::from_bytes(&merged).unwrap()
            }
            None => HeaderValue::from_static("Origin"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use regex::Regex;

    use super::*;
    use crate::Cors;

    fn policy(cors: Cors) -> Rc<CorsPolicy> {
        Rc::clone(&cors.finish().unwrap().inner)
    }

    fn origin(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn wildcard_policy_ignores_request_origin() {
        let policy = policy(Cors::default());

        let m = policy.match_origin(Some(&origin("http://example.com")));
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("*")));

        let m = policy.match_origin(None);
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("*")));
    }

    #[test]
    fn send_wildcard_short_circuits() {
        let policy = policy(
            Cors::default()
                .allowed_origin("https://example.com")
                .send_wildcard(),
        );

        // request origin is not consulted at all
        let m = policy.match_origin(Some(&origin("https://unknown.com")));
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("*")));
    }

    #[test]
    fn missing_origin_advertises_configured_origins() {
        let policy = policy(Cors::default().allowed_origins(vec!["Foo", "Bar"]));

        let m = policy.match_origin(None);
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("Foo, Bar")));
    }

    #[test]
    fn missing_origin_with_always_send_disabled() {
        let policy = policy(Cors::default().disable_always_send());

        let m = policy.match_origin(None);
        assert!(!m.allowed);
        assert_eq!(m.echo, None);
    }

    #[test]
    fn exact_mismatch_is_denied() {
        let policy = policy(Cors::default().allowed_origin("https://example.com"));

        let m = policy.match_origin(Some(&origin("https://unknown.com")));
        assert!(!m.allowed);
        assert_eq!(m.echo, None);

        let m = policy.match_origin(Some(&origin("https://example.com")));
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("https://example.com")));
    }

    #[test]
    fn origins_single_echoes_request_origin() {
        let policy = policy(
            Cors::default()
                .allowed_origins(vec!["Foo", "http://example.com"])
                .origins_single(),
        );

        let m = policy.match_origin(Some(&origin("http://example.com")));
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("http://example.com")));

        // serialized form still advertised when there is nothing to echo
        let m = policy.match_origin(None);
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("Foo, http://example.com")));
    }

    #[test]
    fn pattern_echoes_only_matched_origins() {
        let policy = policy(
            Cors::default()
                .allowed_origin_pattern(Regex::new("https://.*\\.example\\.com").unwrap()),
        );

        let m = policy.match_origin(Some(&origin("https://api.example.com")));
        assert!(m.allowed);
        assert_eq!(m.echo, Some(origin("https://api.example.com")));

        let m = policy.match_origin(Some(&origin("https://example.org")));
        assert!(!m.allowed);
        assert_eq!(m.echo, None);

        // a pattern has no serialized form to advertise
        let m = policy.match_origin(None);
        assert!(m.allowed);
        assert_eq!(m.echo, None);
    }

    #[test]
    fn opaque_origin_is_not_a_member() {
        let policy = policy(Cors::default().allowed_origin("https://example.com"));

        let opaque = HeaderValue::from_bytes(b"https://\xFFexample.com").unwrap();
        let m = policy.match_origin(Some(&opaque));
        assert!(!m.allowed);
    }

    #[test]
    fn vary_skipped_for_wildcard_echo() {
        let policy = policy(Cors::default());

        let m = policy.match_origin(Some(&origin("http://example.com")));
        assert_eq!(policy.vary_value(&m, None), None);
    }

    #[test]
    fn vary_merges_existing_value() {
        let policy = policy(Cors::default().allowed_origin("https://example.com"));

        let m = policy.match_origin(Some(&origin("https://example.com")));
        assert_eq!(policy.vary_value(&m, None), Some(origin("Origin")));
        assert_eq!(
            policy.vary_value(&m, Some(&origin("Accept-Encoding"))),
            Some(origin("Accept-Encoding, Origin")),
        );
    }
}
