//! Header-credential authentication.
//!
//! [`Auth`] reads one header and hands it to a [`Verifier`]:
//!
//! | Header | Response | Chain |
//! |---|---|---|
//! | absent or empty | `401`, `code: "MISSING_AUTH"` | stops |
//! | rejected by the verifier | `401`, `code: "INVALID_AUTH"` | stops |
//! | accepted | none; identity stored under `user_id` | continues |
//!
//! [`StaticToken`] compares against one literal credential. It is a
//! placeholder: real services plug in their own [`Verifier`].

use http::StatusCode;
use http::header::{AUTHORIZATION, HeaderName};

use super::{Middleware, Next};
use crate::context::Context;
use crate::envelope::ErrorBody;
use crate::handler::{BoxFuture, Outcome};

/// Decides whether a credential is acceptable.
pub trait Verifier: Send + Sync + 'static {
    /// Returns the caller's identity, or `None` to reject.
    fn verify(&self, credential: &str) -> Option<String>;
}

/// Accepts exactly one credential and maps it to one identity.
#[derive(Debug, Clone)]
pub struct StaticToken {
    credential: String,
    identity: String,
}

impl StaticToken {
    pub fn new(credential: impl Into<String>, identity: impl Into<String>) -> Self {
        Self { credential: credential.into(), identity: identity.into() }
    }
}

impl Verifier for StaticToken {
    fn verify(&self, credential: &str) -> Option<String> {
        (credential == self.credential).then(|| self.identity.clone())
    }
}

/// Authentication middleware.
pub struct Auth<V> {
    verifier: V,
    header: HeaderName,
    identity_key: String,
}

impl<V: Verifier> Auth<V> {
    /// Reads `Authorization` and stores the identity under `"user_id"`.
    pub fn new(verifier: V) -> Self {
        Self { verifier, header: AUTHORIZATION, identity_key: "user_id".to_owned() }
    }

    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    pub fn identity_key(mut self, key: impl Into<String>) -> Self {
        self.identity_key = key.into();
        self
    }

    fn missing(&self) -> ErrorBody {
        ErrorBody::new(format!("the {} header is required", self.header))
            .hint(format!("send `{}: <credential>`", self.header))
            .code("MISSING_AUTH")
    }

    fn invalid(&self) -> ErrorBody {
        ErrorBody::new("the supplied credential is not valid")
            .hint(format!("check the value of the {} header", self.header))
            .code("INVALID_AUTH")
    }
}

impl<V: Verifier> Middleware for Auth<V> {
    fn name(&self) -> &'static str { "auth" }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let header = ctx.request().headers().get(&self.header);
            let identity = match header {
                None => return ctx.abort(StatusCode::UNAUTHORIZED, &self.missing()),
                Some(v) if v.is_empty() => return ctx.abort(StatusCode::UNAUTHORIZED, &self.missing()),
                Some(v) => v.to_str().ok().and_then(|c| self.verifier.verify(c)),
            };

            match identity {
                Some(id) => {
                    ctx.set(self.identity_key.clone(), id);
                    next.run(ctx).await
                }
                None => ctx.abort(StatusCode::UNAUTHORIZED, &self.invalid()),
            }
        })
    }
}
