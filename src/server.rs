//! HTTP transport and graceful shutdown.
//!
//! The server is a thin adapter: it turns hyper requests into [`Request`]s,
//! hands them to a [`Dispatcher`], and writes the [`Response`] back. The
//! pipeline never touches a socket.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::envelope::ErrorBody;
use crate::error::{Error, Result};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use kasane::Server;
    /// let server = Server::bind("0.0.0.0:3000")?;
    /// # Ok::<(), kasane::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self> {
        Ok(Self { addr: addr.parse()? })
    }

    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Starts accepting connections and dispatching them through `dispatcher`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        let shutdown = shutdown_signal()?;
        serve_until(listener, Arc::new(dispatcher), shutdown).await
    }
}

/// The accept loop, split out so tests can drive it with their own listener
/// and shutdown future.
pub(crate) async fn serve_until(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), Error> {
    info!(addr = ?listener.local_addr().ok(), "kasane listening");

    // Tracks every connection task so shutdown can wait for them.
    let mut tasks = tokio::task::JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Check shutdown first so a SIGTERM stops accepting immediately,
            // even with connections queued.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let dispatcher = Arc::clone(&dispatcher);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let dispatcher = Arc::clone(&dispatcher);
                        async move { handle(&dispatcher, req, remote_addr).await }
                    });

                    // `auto::Builder` serves HTTP/1.1 and HTTP/2, whichever the client speaks.
                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("kasane stopped");
    Ok(())
}

/// Converts one hyper request, dispatches it, converts the response back.
///
/// Requests that cannot be represented (unknown method, broken body) are
/// answered here and never enter the pipeline.
async fn handle(
    dispatcher: &Dispatcher,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let method = match Method::try_from(&parts.method) {
        Ok(m) => m,
        Err(e) => {
            warn!(peer = %remote_addr, "{e}");
            let body = ErrorBody::new("method not allowed").code("METHOD_NOT_ALLOWED");
            return Ok(Response::error(StatusCode::METHOD_NOT_ALLOWED, &body).into_http());
        }
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            let body = ErrorBody::new("unreadable request body").code("BAD_REQUEST");
            return Ok(Response::error(StatusCode::BAD_REQUEST, &body).into_http());
        }
    };

    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let request = Request::new(method, target, parts.headers, body, Some(remote_addr));

    Ok(dispatcher.dispatch(request).await.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };

        // Never resolves: on non-Unix platforms only Ctrl-C stops the server.
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c    => {}
            () = terminate => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, Outcome};
    use crate::router::Router;
    use crate::context::Context;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn hello(ctx: &mut Context) -> BoxFuture<'_, Outcome> {
        Box::pin(async move { ctx.respond_json(StatusCode::OK, "hello") })
    }

    async fn roundtrip(raw: &[u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dispatcher = Arc::new(Router::new().get("/hello", hello).build().unwrap());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_until(listener, dispatcher, async move {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn serves_a_request_over_tcp() {
        let out = roundtrip(b"GET /hello HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 200 OK"), "{out}");
        assert!(out.ends_with("\"hello\""), "{out}");
    }

    #[tokio::test]
    async fn unknown_method_is_405() {
        let out = roundtrip(b"PURGE /hello HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 405"), "{out}");
        assert!(out.contains("METHOD_NOT_ALLOWED"), "{out}");
    }

    #[test]
    fn bind_rejects_garbage() {
        assert!(matches!(Server::bind("not an addr"), Err(Error::InvalidAddress(_))));
    }
}
