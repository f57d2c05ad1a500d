//! Immutable middleware chains.
//!
//! A [`Chain`] is an ordered list of middleware plus exactly one handler,
//! fixed when the [`Router`](crate::Router) is built. Running it composes the
//! steps right-to-left:
//!
//! ```text
//! handler
//! C(handler)
//! B(C(handler))
//! A(B(C(handler)))   ← invoked
//! ```
//!
//! so "before" code runs A, B, C and "after" code runs C, B, A.

use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxedHandler, Outcome};
use crate::middleware::{BoxedMiddleware, Next};

#[derive(Clone)]
pub struct Chain {
    middleware: Arc<[BoxedMiddleware]>,
    handler: BoxedHandler,
}

impl Chain {
    pub(crate) fn new(middleware: Vec<BoxedMiddleware>, handler: BoxedHandler) -> Self {
        Self { middleware: middleware.into(), handler }
    }

    /// Middleware names in the order they run, handler excluded.
    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Runs the chain against `ctx`.
    ///
    /// A failure from any step, the outermost included, leaves a `500` in
    /// `ctx` and comes back as `Err`.
    pub async fn run(&self, ctx: &mut Context) -> Outcome {
        self.entry().run(ctx).await
    }

    fn entry(&self) -> Next<'_> {
        self.middleware
            .iter()
            .rev()
            .fold(Next::handler(self.handler.as_ref()), |next, mw| Next::wrap(mw.as_ref(), next))
    }
}
