//! CORS (Cross-Origin Resource Sharing) middleware.
//!
//! Adds the four `Access-Control-Allow-*` headers to every response and
//! answers preflight `OPTIONS` requests with `204 No Content` without
//! invoking anything further down the chain.
//!
//! Header values are validated once, when the middleware is built:
//!
//! ```rust
//! use kasane::middleware::{Cors, CorsConfig};
//!
//! let cors = Cors::new(
//!     CorsConfig::default()
//!         .allow_origin("https://app.example.com")
//!         .allow_methods("GET, POST"),
//! )?;
//! # Ok::<(), kasane::Error>(())
//! ```

use http::header::{HeaderName, HeaderValue};
use http::StatusCode;

use super::{Middleware, Next};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::{BoxFuture, Outcome};
use crate::method::Method;

/// CORS header names.
pub mod headers {
    use http::header::{self, HeaderName};

    pub const ALLOW_ORIGIN: HeaderName = header::ACCESS_CONTROL_ALLOW_ORIGIN;
    pub const ALLOW_CREDENTIALS: HeaderName = header::ACCESS_CONTROL_ALLOW_CREDENTIALS;
    pub const ALLOW_HEADERS: HeaderName = header::ACCESS_CONTROL_ALLOW_HEADERS;
    pub const ALLOW_METHODS: HeaderName = header::ACCESS_CONTROL_ALLOW_METHODS;
}

const DEFAULT_ORIGIN: &str = "*";
const DEFAULT_HEADERS: &str = "Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, \
                               Authorization, accept, origin, Cache-Control, X-Requested-With";
const DEFAULT_METHODS: &str = "POST, OPTIONS, GET, PUT, DELETE";

/// Header values sent by [`Cors`]. Defaults are permissive.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    allow_origin: String,
    allow_credentials: bool,
    allow_headers: String,
    allow_methods: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: DEFAULT_ORIGIN.to_owned(),
            allow_credentials: true,
            allow_headers: DEFAULT_HEADERS.to_owned(),
            allow_methods: DEFAULT_METHODS.to_owned(),
        }
    }
}

impl CorsConfig {
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Comma-separated request headers, sent verbatim.
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }

    /// Comma-separated methods, sent verbatim.
    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }
}

/// CORS middleware.
#[derive(Debug, Clone)]
pub struct Cors {
    origin: HeaderValue,
    credentials: HeaderValue,
    headers: HeaderValue,
    methods: HeaderValue,
}

impl Cors {
    /// Validates `config` into ready-to-send header values.
    ///
    /// Fails with [`Error::InvalidHeader`] when a value cannot appear in an
    /// HTTP header (control characters, line breaks).
    pub fn new(config: CorsConfig) -> Result<Self> {
        Ok(Self {
            origin: value(&headers::ALLOW_ORIGIN, &config.allow_origin)?,
            credentials: HeaderValue::from_static(if config.allow_credentials { "true" } else { "false" }),
            headers: value(&headers::ALLOW_HEADERS, &config.allow_headers)?,
            methods: value(&headers::ALLOW_METHODS, &config.allow_methods)?,
        })
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            origin: HeaderValue::from_static(DEFAULT_ORIGIN),
            credentials: HeaderValue::from_static("true"),
            headers: HeaderValue::from_static(DEFAULT_HEADERS),
            methods: HeaderValue::from_static(DEFAULT_METHODS),
        }
    }
}

fn value(name: &HeaderName, raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))
}

impl Middleware for Cors {
    fn name(&self) -> &'static str { "cors" }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            ctx.insert_header(headers::ALLOW_ORIGIN, self.origin.clone())?;
            ctx.insert_header(headers::ALLOW_CREDENTIALS, self.credentials.clone())?;
            ctx.insert_header(headers::ALLOW_HEADERS, self.headers.clone())?;
            ctx.insert_header(headers::ALLOW_METHODS, self.methods.clone())?;

            if ctx.request().method() == Method::Options {
                return ctx.abort_with_status(StatusCode::NO_CONTENT);
            }

            next.run(ctx).await
        })
    }
}
