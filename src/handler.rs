//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! Every route owns a [`Chain`](crate::Chain) whose last step is a handler of
//! some concrete type. Chains for different routes live in one table, so
//! handlers are erased to [`BoxedHandler`] (`Arc<dyn Handler>`) and called
//! through one vtable dispatch per request.
//!
//! A handler borrows the [`Context`] for the duration of its future, so the
//! future's lifetime is tied to that borrow. Plain `async fn` cannot express
//! that in a trait bound yet; handlers return a [`BoxFuture`] instead:
//!
//! ```rust
//! use http::StatusCode;
//! use kasane::{BoxFuture, Context, Outcome};
//!
//! fn hello(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
//!     Box::pin(async move { ctx.respond_json(StatusCode::OK, "hello") })
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls it in place; `Send` so tokio may
/// move it across worker threads. `'a` is the borrow of the [`Context`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every middleware and handler returns.
///
/// `Ok(())` covers every *response*, including 4xx ones. `Err` means the step
/// broke; the chain turns it into a `500` on the way out.
pub type Outcome = Result<(), Error>;

/// The terminal step of a chain.
///
/// Implemented automatically for any function of the shape
/// `fn(&mut Context) -> BoxFuture<'_, Outcome>`. Implement it on a struct when
/// the handler needs state of its own.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome>;
}

/// A type-erased handler shared by every request routed to it.
pub type BoxedHandler = Arc<dyn Handler>;

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        (self)(ctx)
    }
}

/// Answers every unmatched request.
pub(crate) fn not_found(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
    Box::pin(async move {
        ctx.respond_json(http::StatusCode::NOT_FOUND, &crate::envelope::ErrorBody::not_found())
    })
}
