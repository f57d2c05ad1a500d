//! Request dispatch.
//!
//! One radix tree per HTTP method, O(path-length) lookup. The table is built
//! once by [`Router::build`](crate::Router::build) and only read afterwards,
//! so one [`Dispatcher`] behind an `Arc` serves any number of concurrent
//! requests without locking.

use std::collections::HashMap;

use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;
use tracing::error;

use crate::chain::Chain;
use crate::context::{Context, PARAM_PREFIX};
use crate::error::{Error, Result};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Matches requests to chains and runs them.
pub struct Dispatcher {
    routes: HashMap<Method, MatchitRouter<Chain>>,
    listing: Vec<(Method, String)>,
    /// Root middleware around the 404 handler.
    fallback: Chain,
}

impl Dispatcher {
    pub(crate) fn new(fallback: Chain) -> Self {
        Self { routes: HashMap::new(), listing: Vec::new(), fallback }
    }

    pub(crate) fn insert(&mut self, method: Method, path: String, chain: Chain) -> Result<()> {
        self.routes
            .entry(method)
            .or_default()
            .insert(path.clone(), chain)
            .map_err(|source| Error::Route { path: path.clone(), source })?;
        self.listing.push((method, path));
        Ok(())
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.listing.iter().map(|(m, p)| (*m, p.as_str()))
    }

    /// The chain registered for `method` and `path`, with captured path parameters.
    ///
    /// `path` is matched as given. [`dispatch`](Self::dispatch) percent-decodes
    /// the request path first.
    pub fn lookup(&self, method: Method, path: &str) -> Option<(&Chain, Vec<(String, String)>)> {
        let matched = self.routes.get(&method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }

    /// Runs `request` through its chain and returns the finished response.
    ///
    /// Never fails. Unmatched requests get a `404` envelope after passing
    /// through the root middleware. A failure that escapes the chain is
    /// logged here and the client receives the generic `500` envelope.
    pub async fn dispatch(&self, request: Request) -> Response {
        // Routes are matched against the decoded path: `/users/%32` is `/users/2`.
        let (chain, params) = {
            let path = percent_decode_str(request.path()).decode_utf8_lossy();
            self.lookup(request.method(), &path)
        }
        .unwrap_or((&self.fallback, Vec::new()));

        let mut ctx = Context::new(request);
        for (name, value) in params {
            ctx.set(format!("{PARAM_PREFIX}{name}"), value);
        }

        if let Err(err) = chain.run(&mut ctx).await {
            let req = ctx.request();
            error!(method = %req.method(), path = %req.path(), error = %err, "request failed");
        }

        ctx.into_response()
    }
}
