//! Built-in health-check handler.
//!
//! ```rust
//! use kasane::{Router, health};
//!
//! let app = Router::new().get("/health", health::liveness);
//! ```
//!
//! Register it outside any authenticated group: probes carry no credentials.

use chrono::Local;
use http::StatusCode;
use serde_json::json;

use crate::context::Context;
use crate::handler::{BoxFuture, Outcome};

/// Liveness probe.
///
/// Always `200 OK`. If the process can answer HTTP at all, it is alive.
pub fn liveness(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
    Box::pin(async move {
        ctx.respond_json(
            StatusCode::OK,
            &json!({
                "status": "ok",
                "message": "server is running",
                "timestamp": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            }),
        )
    })
}
