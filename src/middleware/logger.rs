//! Access logging.
//!
//! Register [`Logger`] first so it wraps everything else: it then sees the
//! final status of every request, including short-circuits and recovered
//! failures, and writes exactly one record per request.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use http::StatusCode;
use tracing::{error, info};

use super::{Middleware, Next};
use crate::context::Context;
use crate::handler::{BoxFuture, Outcome};
use crate::method::Method;

/// One finished request.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub timestamp: DateTime<Local>,
    pub status: StatusCode,
    pub latency: Duration,
    pub client: Option<IpAddr>,
    pub method: Method,
    /// Path with the query string re-attached.
    pub path: String,
    /// Detail of a failure that escaped the chain. Never sent to the client.
    pub failure: Option<String>,
}

/// `2026/10/19 - 13:05:09 | 200 |      1.207ms |     203.0.113.7 | GET     /health`
impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let latency = format!("{:?}", self.latency);
        let client = self.client.map_or_else(|| "-".to_owned(), |ip| ip.to_string());
        write!(
            f,
            "{} | {:>3} | {:>13} | {:>15} | {:<7} {}",
            self.timestamp.format("%Y/%m/%d - %H:%M:%S"),
            self.status.as_u16(),
            latency,
            client,
            self.method.as_str(),
            self.path,
        )
    }
}

/// Where [`Logger`] sends its records.
pub trait AccessSink: Send + Sync + 'static {
    fn record(&self, entry: &AccessRecord);
}

impl<F> AccessSink for F
where
    F: Fn(&AccessRecord) + Send + Sync + 'static,
{
    fn record(&self, entry: &AccessRecord) {
        self(entry)
    }
}

/// Default sink: one `tracing` event per request on target `kasane::access`.
///
/// 5xx records are emitted at `ERROR` with the failure detail attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AccessSink for TracingSink {
    fn record(&self, e: &AccessRecord) {
        let client = e.client.map(|ip| ip.to_string());
        if e.status.is_server_error() {
            error!(
                target: "kasane::access",
                status = e.status.as_u16(),
                latency = ?e.latency,
                client = client.as_deref(),
                method = %e.method,
                path = %e.path,
                failure = e.failure.as_deref(),
                "{e}"
            );
        } else {
            info!(
                target: "kasane::access",
                status = e.status.as_u16(),
                latency = ?e.latency,
                client = client.as_deref(),
                method = %e.method,
                path = %e.path,
                "{e}"
            );
        }
    }
}

/// Access-log middleware.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn AccessSink>,
}

impl Logger {
    /// Logs through [`TracingSink`].
    pub fn new() -> Self {
        Self::with_sink(TracingSink)
    }

    pub fn with_sink(sink: impl AccessSink) -> Self {
        Self { sink: Arc::new(sink) }
    }
}

impl Default for Logger {
    fn default() -> Self { Self::new() }
}

impl Middleware for Logger {
    fn name(&self) -> &'static str { "logger" }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let start = Instant::now();
            let outcome = next.run(ctx).await;
            let latency = start.elapsed();

            let req = ctx.request();
            let record = AccessRecord {
                timestamp: Local::now(),
                status: ctx.status(),
                latency,
                client: req.client_ip(),
                method: req.method(),
                path: req.target(),
                failure: ctx.failure().map(str::to_owned),
            };
            self.sink.record(&record);
            outcome
        })
    }
}
