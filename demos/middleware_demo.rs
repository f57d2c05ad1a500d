//! Middleware demo: access log and CORS on every route, bearer auth on `/api/v1`.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example middleware_demo
//!
//! Try:
//!   curl http://localhost:8080/health
//!   curl http://localhost:8080/public
//!   curl http://localhost:8080/api/v1/users                                   # 401 MISSING_AUTH
//!   curl -H 'Authorization: Bearer nope' http://localhost:8080/api/v1/users   # 401 INVALID_AUTH
//!   curl -H 'Authorization: Bearer demo-token' http://localhost:8080/api/v1/users/2
//!   curl -X OPTIONS -i http://localhost:8080/api/v1/users                     # 204 preflight

use std::sync::Arc;

use chrono::Local;
use http::StatusCode;
use kasane::middleware::{Auth, Cors, Logger, StaticToken};
use kasane::{BoxFuture, Context, ErrorBody, Handler, Outcome, Router, Server, health};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CREDENTIAL: &str = "Bearer demo-token";

#[tokio::main]
async fn main() -> Result<(), kasane::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let directory = Directory::seeded();

    let app = Router::new()
        .layer(Logger::new())
        .layer(Cors::default())
        .group("/api/v1", |api| {
            api.layer(Auth::new(StaticToken::new(CREDENTIAL, "demo-user")))
                .get("/users", ListUsers(directory.clone()))
                .get("/users/{id}", GetUser(directory.clone()))
                .get("/protected", protected)
        })
        .get("/health", health::liveness)
        .get("/public", public)
        .build()?;

    for (method, path) in app.routes() {
        info!(%method, path, "route registered");
    }
    info!("routes under /api/v1 need `Authorization: {CREDENTIAL}`");

    let addr = std::env::var("KASANE_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    Server::bind(&addr)?.serve(app).await
}

// ── Users ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u32,
    name: String,
    age: u32,
}

/// Read-only user list, built once and shared by the handlers that need it.
#[derive(Clone)]
struct Directory {
    users: Arc<[User]>,
}

impl Directory {
    fn seeded() -> Self {
        let users = [(1, "Taro Tanaka", 25), (2, "Hanako Sato", 30), (3, "Ichiro Suzuki", 28)]
            .into_iter()
            .map(|(id, name, age)| User { id, name: name.to_owned(), age })
            .collect();
        Self { users }
    }

    fn find(&self, id: u32) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
}

// GET /api/v1/users
struct ListUsers(Directory);

impl Handler for ListUsers {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let users: &[User] = &self.0.users;
            ctx.respond_json(
                StatusCode::OK,
                &json!({
                    "status": "success",
                    "data": users,
                    "count": users.len(),
                    "message": "visible to authenticated callers only",
                }),
            )
        })
    }
}

// GET /api/v1/users/{id}: 400 on a non-numeric id, 404 on an unknown one.
struct GetUser(Directory);

impl Handler for GetUser {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(id) = ctx.param("id").and_then(|id| id.parse::<u32>().ok()) else {
                return ctx.respond_json(StatusCode::BAD_REQUEST, &ErrorBody::new("invalid user id"));
            };

            match self.0.find(id) {
                Some(user) => ctx.respond_json(
                    StatusCode::OK,
                    &json!({
                        "status": "success",
                        "data": user,
                        "message": "visible to authenticated callers only",
                    }),
                ),
                None => ctx.respond_json(StatusCode::NOT_FOUND, &ErrorBody::new("user not found")),
            }
        })
    }
}

// GET /api/v1/protected
fn protected(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
    Box::pin(async move {
        let Some(user_id) = ctx.get_str("user_id").map(str::to_owned) else {
            return ctx.respond_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorBody::new("could not read the caller identity"),
            );
        };

        ctx.respond_json(
            StatusCode::OK,
            &json!({
                "status": "success",
                "message": "this is protected data",
                "data": {
                    "user_id": user_id,
                    "secret_data": "kasane middleware demo",
                    "timestamp": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    "permissions": ["read", "write", "admin"],
                },
            }),
        )
    })
}

// GET /public
fn public(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
    Box::pin(async move {
        ctx.respond_json(
            StatusCode::OK,
            &json!({
                "message": "public endpoint, no authentication required",
                "data": "anyone can read this",
            }),
        )
    })
}
