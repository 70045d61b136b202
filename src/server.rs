//! HTTP harness and graceful shutdown.
//!
//! weft is a composition library, not a framework — but a composed route has
//! to live somewhere, and tests and demos want a real socket. [`Server`]
//! mounts one [`Route`] behind hyper with the same lifecycle a production
//! deployment expects:
//!
//! 1. On SIGTERM / Ctrl-C, `listener.accept()` stops immediately — no new
//!    connections are made.
//! 2. Every in-flight connection task runs to completion.
//! 3. [`Server::serve`] returns, letting `main` exit cleanly.
//!
//! Embedding weft inside a larger framework instead? Skip this module and
//! call [`Route::dispatch`] (or [`Endpoint::run`](crate::Endpoint::run))
//! from your own request path.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::status::Status;

/// The HTTP harness.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use weft::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `route`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, route: Route) -> Result<(), crate::Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // Arc so the route table is shared across concurrent connection
        // tasks without copying it.
        let route = Arc::new(route);

        info!(addr = %self.addr, "weft listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        // Futures must not move in memory after the first poll — `tokio::pin!`
        // pins the shutdown future on the stack so the loop can re-poll it.
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom instead of
                // randomly. Shutdown goes first so a SIGTERM immediately
                // stops accepting, even if more connections are queued.
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

                    let route = Arc::clone(&route);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the
                    // hyper IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // The service closure runs once per request on the
                        // connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let route = Arc::clone(&route);
                            async move { dispatch(route, req).await }
                        });

                        // `auto::Builder` transparently handles both
                        // HTTP/1.1 and HTTP/2, whatever the client speaks.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not
                // grow without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection before returning.
        while tasks.join_next().await.is_some() {}

        info!("weft stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Hot path: adapts one hyper request into a [`Request`], runs the route,
/// adapts the [`Response`] back out.
///
/// The error type is [`Infallible`](std::convert::Infallible) — every
/// failure becomes a response (405, 400, 500) so hyper never sees an error.
///
/// Generic over the body so tests can feed it something other than a live
/// `hyper::body::Incoming`.
async fn dispatch<B>(
    route: Arc<Route>,
    req: hyper::Request<B>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();

    // Unknown methods never reach a route: 405 before dispatch.
    let Ok(method) = Method::from_str(parts.method.as_str()) else {
        return Ok(Response::status(Status::MethodNotAllowed).into_http());
    };

    // Path and query travel separately: `Request::path` is the bare path.
    let path = parts.uri.path().to_owned();
    let query = parts.uri.query().map(str::to_owned);

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(%method, %path, "failed to read request body: {e}");
            return Ok(Response::status(Status::BadRequest).into_http());
        }
    };

    let mut request = Request::new(method, path).with_body(body);
    if let Some(q) = query {
        request = request.with_query(q);
    }
    for (name, value) in &parts.headers {
        request = request.with_header(
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }

    Ok(route.dispatch(request).await.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves — on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
