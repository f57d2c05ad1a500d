//! Middleware layer.
//!
//! Middleware intercepts a request on its way to the handler and the response
//! on its way back. It is the right place for cross-cutting concerns: access
//! logging, CORS, authentication.
//!
//! A middleware receives the [`Context`] and a [`Next`]. Whatever it does
//! before `next.run(ctx).await` happens on the way in, in registration order.
//! Whatever it does after happens on the way out, in reverse order:
//!
//! ```text
//! A before → B before → C before → handler → C after → B after → A after
//! ```
//!
//! Not calling `next` short-circuits: the rest of the chain is skipped, and
//! the middleware must have finalized the response itself. `Next` is consumed
//! by `run`, so calling it twice does not compile.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use kasane::{BoxFuture, Context, Next, Outcome};
//!
//! fn timing<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
//!     Box::pin(async move {
//!         let start = Instant::now();
//!         let outcome = next.run(ctx).await;
//!         tracing::debug!(elapsed = ?start.elapsed(), status = %ctx.status());
//!         outcome
//!     })
//! }
//! ```

mod auth;
mod cors;
mod logger;

pub use auth::{Auth, StaticToken, Verifier};
pub use cors::{Cors, CorsConfig};
pub use logger::{AccessRecord, AccessSink, Logger, TracingSink};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, Handler, Outcome};

/// A request interceptor.
///
/// Implemented automatically for functions of the shape
/// `fn<'a>(&'a mut Context, Next<'a>) -> BoxFuture<'a, Outcome>`.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs and by [`Chain::names`](crate::Chain::names).
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

/// A type-erased middleware shared by every chain it was registered on.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<F> Middleware for F
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        (self)(ctx, next)
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of a chain: zero or more middleware, then the handler.
pub struct Next<'a> {
    inner: Step<'a>,
}

enum Step<'a> {
    Middleware {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(&'a dyn Handler),
}

impl<'a> Next<'a> {
    pub(crate) fn handler(handler: &'a dyn Handler) -> Self {
        Self { inner: Step::Handler(handler) }
    }

    /// Wraps `next` so that `middleware` runs first.
    pub(crate) fn wrap(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self { inner: Step::Middleware { middleware, next: Box::new(next) } }
    }

    /// Runs the rest of the chain.
    ///
    /// Does nothing when the response is already finalized: a finalized
    /// response is never overwritten and nothing downstream of a
    /// short-circuit runs.
    ///
    /// Failures are contained here. An `Err` or a panic from the rest of the
    /// chain replaces the response with a generic `500` and comes back as
    /// `Err`, so the caller's post-processing still runs. So does a middleware
    /// that returns without calling its `next` and without finalizing.
    pub async fn run(self, ctx: &mut Context) -> Outcome {
        if ctx.is_finalized() {
            return Ok(());
        }

        let entered = ctx.enter_step();
        let middleware = match &self.inner {
            Step::Middleware { middleware, .. } => Some(middleware.name()),
            Step::Handler(_) => None,
        };

        let step = &mut *ctx;
        let caught = AssertUnwindSafe(async move { self.invoke(step).await })
            .catch_unwind()
            .await;

        let mut outcome = caught.unwrap_or_else(|payload| Err(Error::Panic(panic_message(&*payload))));

        // A middleware that kept `next` to itself owes the client a response.
        if let Some(middleware) = middleware {
            if outcome.is_ok() && !ctx.is_finalized() && ctx.steps() == entered {
                outcome = Err(Error::Unfinalized { middleware });
            }
        }

        if let Err(err) = &outcome {
            ctx.fail(err);
        }
        outcome
    }

    fn invoke<'b>(self, ctx: &'b mut Context) -> BoxFuture<'b, Outcome>
    where
        'a: 'b,
    {
        match self.inner {
            Step::Middleware { middleware, next } => middleware.handle(ctx, *next),
            Step::Handler(handler) => handler.call(ctx),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::request::Request;
    use http::StatusCode;
    use std::sync::Mutex;

    fn ctx() -> Context {
        Context::new(Request::builder(Method::Get, "/").build().unwrap())
    }

    struct Tag {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Tag {
        fn name(&self) -> &'static str { self.name }

        fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{} in", self.name));
                let outcome = next.run(ctx).await;
                self.log.lock().unwrap().push(format!("{} out", self.name));
                outcome
            })
        }
    }

    fn ok(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
        Box::pin(async move { ctx.respond_json(StatusCode::OK, "ok") })
    }

    fn explode(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            if ctx.request().path().starts_with('/') {
                panic!("boom");
            }
            Ok(())
        })
    }

    fn stop<'a>(ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move { ctx.abort_with_status(StatusCode::FORBIDDEN) })
    }

    #[tokio::test]
    async fn wrapped_steps_nest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = Tag { name: "outer", log: Arc::clone(&log) };
        let inner = Tag { name: "inner", log: Arc::clone(&log) };

        let mut ctx = ctx();
        let next = Next::wrap(&outer, Next::wrap(&inner, Next::handler(&ok)));
        next.run(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), ["outer in", "inner in", "inner out", "outer out"]);
        assert_eq!(ctx.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn finalized_context_does_not_advance() {
        let mut ctx = ctx();
        ctx.abort_with_status(StatusCode::NO_CONTENT).unwrap();
        Next::handler(&ok).run(&mut ctx).await.unwrap();
        assert_eq!(ctx.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn short_circuit_skips_handler() {
        let mut ctx = ctx();
        Next::wrap(&stop, Next::handler(&explode)).run(&mut ctx).await.unwrap();
        assert_eq!(ctx.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn panic_becomes_500_and_err() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = Tag { name: "outer", log: Arc::clone(&log) };

        let mut ctx = ctx();
        let outcome = Next::wrap(&outer, Next::handler(&explode)).run(&mut ctx).await;

        assert!(matches!(outcome, Err(Error::Panic(ref m)) if m == "boom"));
        assert_eq!(*log.lock().unwrap(), ["outer in", "outer out"]);
        assert_eq!(ctx.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ctx.failure(), Some("panicked: boom"));
    }

    fn swallow<'a>(_ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move { Ok(()) })
    }

    #[tokio::test]
    async fn stopping_without_a_response_is_a_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = Tag { name: "outer", log: Arc::clone(&log) };

        let mut ctx = ctx();
        let outcome = Next::wrap(&outer, Next::wrap(&swallow, Next::handler(&ok))).run(&mut ctx).await;

        assert!(matches!(outcome, Err(Error::Unfinalized { middleware }) if middleware.ends_with("swallow")));
        assert_eq!(*log.lock().unwrap(), ["outer in", "outer out"]);
        assert_eq!(ctx.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ctx.failure().unwrap().contains("neither called next"));
    }

    #[tokio::test]
    async fn passing_through_to_a_silent_handler_is_not_a_failure() {
        fn silent(_ctx: &mut Context) -> BoxFuture<'_, Outcome> {
            Box::pin(async move { Ok(()) })
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = Tag { name: "outer", log: Arc::clone(&log) };

        let mut ctx = ctx();
        Next::wrap(&outer, Next::handler(&silent)).run(&mut ctx).await.unwrap();
        assert!(!ctx.is_finalized());
        assert_eq!(ctx.status(), StatusCode::OK);
    }

    #[test]
    fn fn_middleware_is_named_after_its_type() {
        assert!(Middleware::name(&stop).ends_with("stop"));
    }
}
