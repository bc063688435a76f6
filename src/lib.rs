//! Cross-Origin Resource Sharing (CORS) policy middleware for Actix Web.
//!
//! The middleware wraps route handlers and injects the correct
//! `Access-Control-*` response headers, computed from a per-route policy and
//! the incoming request's `Origin` header. A policy resolves once, at route
//! registration time: explicit builder options take precedence over
//! application-level `CORS_*` configuration values (looked up through a
//! [`ConfigProvider`]), which take precedence over the built-in defaults.
//! Misconfiguration therefore fails application startup, never a live
//! request.
//!
//! This CORS middleware automatically handles `OPTIONS` preflight requests.
//!
//! # Origin policies
//!
//! Allowed origins are one of: wildcard (any origin), a single exact origin,
//! an ordered set of origins, or a compiled pattern. Echo behavior is
//! tunable on top of that: [`Cors::send_wildcard()`] always answers `*`,
//! [`Cors::origins_single()`] echoes the request's own origin when it is
//! allowed, and [`Cors::disable_always_send()`] omits the header for
//! requests that carry no `Origin` at all.
//!
//! # Example
//! ```no_run
//! use actix_cors_policy::Cors;
//! use actix_web::{http::header, web, App, HttpServer};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     HttpServer::new(|| {
//!         let cors = Cors::default()
//!             .allowed_origins(vec!["https://www.rust-lang.org", "https://crates.io"])
//!             .allowed_methods(vec!["GET", "POST"])
//!             .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
//!             .allowed_header(header::CONTENT_TYPE)
//!             .max_age(3600)
//!             .finish()
//!             .expect("valid CORS configuration");
//!
//!         App::new()
//!             .wrap(cors)
//!             .route("/", web::get().to(|| async { "Hello, cross-origin world!" }))
//!     })
//!     .bind(("127.0.0.1", 8080))?
//!     .run()
//!     .await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(future_incompatible, missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod all_or_some;
mod builder;
mod config;
mod error;
mod inner;
mod middleware;
mod origins;

use crate::{all_or_some::AllOrSome, inner::CorsPolicy, origins::Origins};
pub use crate::{
    builder::{Cors, CorsFactory},
    config::{keys, ConfigProvider, ConfigValue},
    error::ConfigError,
    middleware::CorsMiddleware,
};
