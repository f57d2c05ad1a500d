//! Chain builder.
//!
//! A [`Router`] collects middleware, routes and nested groups. Nothing runs
//! until [`Router::build`] flattens it into a [`Dispatcher`]: every route gets
//! its own immutable [`Chain`] of
//!
//! ```text
//! root middleware ++ group middleware ++ nested group middleware ++ handler
//! ```
//!
//! Middleware apply to every route of their scope regardless of the order in
//! which `layer` and the route methods were called.

use std::sync::Arc;

use crate::chain::Chain;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::handler::{self, BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware};

/// The application router.
///
/// Each builder method returns `self` so registrations chain naturally.
/// `Router` is cheap to clone; building never consumes it.
#[derive(Clone, Default)]
pub struct Router {
    prefix: String,
    middleware: Vec<BoxedMiddleware>,
    routes: Vec<Route>,
    groups: Vec<Router>,
}

#[derive(Clone)]
struct Route {
    method: Method,
    path: String,
    handler: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` to this scope.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers `handler` for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; read them with
    /// [`Context::param`](crate::Context::param).
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes.push(Route { method, path: path.to_owned(), handler: Arc::new(handler) });
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self { self.on(Method::Get, path, handler) }
    pub fn post(self, path: &str, handler: impl Handler) -> Self { self.on(Method::Post, path, handler) }
    pub fn put(self, path: &str, handler: impl Handler) -> Self { self.on(Method::Put, path, handler) }
    pub fn patch(self, path: &str, handler: impl Handler) -> Self { self.on(Method::Patch, path, handler) }
    pub fn delete(self, path: &str, handler: impl Handler) -> Self { self.on(Method::Delete, path, handler) }
    pub fn options(self, path: &str, handler: impl Handler) -> Self { self.on(Method::Options, path, handler) }

    /// Opens a nested scope under `prefix`.
    ///
    /// `build` receives an empty router; whatever it layers applies only to
    /// the routes registered inside it, after all of this router's middleware.
    ///
    /// ```rust
    /// # use kasane::{BoxFuture, Context, Outcome, Router};
    /// # use kasane::middleware::{Auth, Logger, StaticToken};
    /// # fn list_users(ctx: &mut Context) -> BoxFuture<'_, Outcome> { Box::pin(async { Ok(()) }) }
    /// let app = Router::new()
    ///     .layer(Logger::new())
    ///     .group("/api/v1", |api| {
    ///         api.layer(Auth::new(StaticToken::new("Bearer demo-token", "demo-user")))
    ///             .get("/users", list_users)
    ///     });
    /// ```
    pub fn group(mut self, prefix: &str, build: impl FnOnce(Router) -> Router) -> Self {
        let scope = Router { prefix: prefix.to_owned(), ..Router::default() };
        self.groups.push(build(scope));
        self
    }

    /// Snapshots the current configuration into a [`Dispatcher`].
    ///
    /// Later changes to this router do not affect dispatchers already built.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRoute`] for a path or prefix without a leading `/`,
    /// [`Error::Route`] for patterns the radix tree rejects, including two
    /// handlers for the same method and path.
    pub fn build(&self) -> Result<Dispatcher> {
        let not_found: BoxedHandler = Arc::new(handler::not_found);
        let mut dispatcher = Dispatcher::new(Chain::new(self.middleware.clone(), not_found));
        self.collect("", &[], &mut dispatcher)?;
        Ok(dispatcher)
    }

    fn collect(&self, base: &str, inherited: &[BoxedMiddleware], out: &mut Dispatcher) -> Result<()> {
        let prefix = join(base, &self.prefix)?;
        let stack: Vec<BoxedMiddleware> = inherited.iter().chain(&self.middleware).cloned().collect();

        for route in &self.routes {
            let mut path = join(&prefix, &route.path)?;
            if path.is_empty() {
                path.push('/');
            }
            out.insert(route.method, path, Chain::new(stack.clone(), Arc::clone(&route.handler)))?;
        }
        for group in &self.groups {
            group.collect(&prefix, &stack, out)?;
        }
        Ok(())
    }
}

fn join(prefix: &str, path: &str) -> Result<String> {
    if path.is_empty() {
        return Ok(prefix.to_owned());
    }
    if !path.starts_with('/') {
        return Err(Error::InvalidRoute(path.to_owned()));
    }
    Ok(format!("{}{path}", prefix.trim_end_matches('/')))
}
