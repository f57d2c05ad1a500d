//! # kasane
//!
//! Ordered, short-circuiting middleware chains for HTTP services that sit
//! behind a reverse proxy.
//!
//! ## The model
//!
//! - A [`Context`] is created per request. It owns the immutable [`Request`],
//!   a bag of annotations, and the response under construction.
//! - A [`Middleware`] gets the context and a [`Next`]. It may work before and
//!   after calling `next`, or not call it at all (short-circuit).
//! - A [`Handler`] is the last step of a [`Chain`].
//! - A [`Router`] collects middleware, routes and groups, then
//!   [`build`](Router::build)s an immutable [`Dispatcher`].
//! - The [`Dispatcher`] matches a request to its chain, runs it, and turns any
//!   failure that escapes into a generic `500`.
//!
//! Built-ins: [`middleware::Logger`], [`middleware::Cors`], [`middleware::Auth`].
//!
//! What the proxy already owns (TLS, rate limiting, body-size limits, slow
//! clients) kasane ignores.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use kasane::middleware::{Auth, Cors, Logger, StaticToken};
//! use kasane::{BoxFuture, Context, Outcome, Router, Server, Success};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kasane::Error> {
//!     let app = Router::new()
//!         .layer(Logger::new())
//!         .layer(Cors::default())
//!         .group("/api/v1", |api| {
//!             api.layer(Auth::new(StaticToken::new("Bearer demo-token", "demo-user")))
//!                 .get("/me", me)
//!         })
//!         .build()?;
//!
//!     Server::bind("0.0.0.0:8080")?.serve(app).await
//! }
//!
//! fn me(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
//!     Box::pin(async move {
//!         let user = ctx.get_str("user_id").unwrap_or_default().to_owned();
//!         ctx.respond_json(StatusCode::OK, &Success::new(user))
//!     })
//! }
//! ```

mod chain;
mod context;
mod dispatcher;
mod envelope;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod health;
pub mod middleware;

pub use chain::Chain;
pub use context::Context;
pub use dispatcher::Dispatcher;
pub use envelope::{ErrorBody, Success};
pub use error::{Error, Result};
pub use handler::{BoxFuture, BoxedHandler, Handler, Outcome};
pub use method::Method;
pub use middleware::{BoxedMiddleware, Middleware, Next};
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, Response};
pub use router::Router;
pub use server::Server;
