//! Chain composition: several middleware around one terminal handler.
//!
//! A [`Chain`] is built left-to-right and finished with a handler, yielding
//! an [`Endpoint`] — a single callable the surrounding framework mounts as a
//! route. Execution order is exactly registration order:
//!
//! ```rust
//! use weft::{Chain, Request, Response};
//!
//! # async fn authenticate(req: Request) -> Request { req }
//! # async fn rate_limit(req: Request) -> Request { req }
//! let endpoint = Chain::new()
//!     .with(authenticate)
//!     .with(rate_limit)
//!     .finish(|_req: Request| async move {
//!         Response::text("made it through")
//!     });
//! ```
//!
//! # Error flow
//!
//! A failing stage stops the chain. If the chain carries a shared error
//! handler ([`Chain::catch`]), it converts the error — from middleware *or*
//! the terminal handler — into the response. Without one, the failure is
//! logged and answered with a bare 500.

use std::future::Future;
use std::sync::Arc;

use tracing::error;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler, IntoOutcome};
use crate::method::Method;
use crate::middleware::{Flow, Middleware, Next, Stage};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::status::Status;

// ── Error handlers ────────────────────────────────────────────────────────────

/// A shared error handler: converts a failure into the response the client
/// sees. Automatically satisfied for any
/// `async fn(Method, Error) -> impl IntoResponse`.
pub trait ErrorHandler: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_catcher(self) -> Catcher;
}

/// Erased, shareable error handler.
#[doc(hidden)]
#[derive(Clone)]
pub struct Catcher(Arc<dyn ErasedErrorHandler + Send + Sync>);

impl Catcher {
    pub(crate) async fn handle(&self, method: Method, error: Error) -> Response {
        self.0.call(method, error).await
    }
}

trait ErasedErrorHandler {
    fn call(&self, method: Method, error: Error) -> BoxFuture<Response>;
}

impl<F, Fut, R> ErrorHandler for F
where
    F: Fn(Method, Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_catcher(self) -> Catcher {
        Catcher(Arc::new(FnErrorHandler(self)))
    }
}

struct FnErrorHandler<F>(F);

impl<F, Fut, R> ErasedErrorHandler for FnErrorHandler<F>
where
    F: Fn(Method, Error) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, method: Method, error: Error) -> BoxFuture<Response> {
        let fut = (self.0)(method, error);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Raised ────────────────────────────────────────────────────────────────────

/// A failure, tagged with the part of the endpoint it came from. Route-level
/// error handlers only cover terminal-handler failures on explicit opt-in,
/// so the distinction has to survive until dispatch.
pub(crate) enum Raised {
    Middleware(Error),
    Handler(Error),
}

impl Raised {
    pub(crate) fn into_error(self) -> Error {
        match self {
            Self::Middleware(e) | Self::Handler(e) => e,
        }
    }

    /// Flattens for a `Next` continuation, keeping the origin recoverable
    /// via the error's internal marker.
    fn into_marked_error(self) -> Error {
        match self {
            Self::Middleware(e) => e,
            Self::Handler(e) => e.mark_from_handler(),
        }
    }

    /// Re-tags an error that round-tripped through a two-argument
    /// middleware. Errors the middleware raised (or built fresh while
    /// transforming a downstream one) carry no marker and stay attributed
    /// to the middleware.
    fn from_marked_error(e: Error) -> Self {
        if e.is_from_handler() { Self::Handler(e) } else { Self::Middleware(e) }
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// Ordered middleware stack, waiting for its terminal handler.
#[derive(Default)]
pub struct Chain {
    stages: Vec<Stage>,
    catcher: Option<Catcher>,
}

impl Chain {
    pub fn new() -> Self {
        Self { stages: Vec::new(), catcher: None }
    }

    /// Appends a middleware. Order matters: stages run in the order they
    /// were added.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.stages.push(middleware.into_stage());
        self
    }

    /// Installs a shared error handler covering every middleware *and* the
    /// terminal handler.
    pub fn catch(mut self, handler: impl ErrorHandler) -> Self {
        self.catcher = Some(handler.into_catcher());
        self
    }

    /// Terminates the chain, producing a mountable [`Endpoint`].
    pub fn finish(self, handler: impl Handler) -> Endpoint {
        Endpoint {
            stages: self.stages.into(),
            handler: handler.into_boxed_handler(),
            catcher: self.catcher,
        }
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// A composed chain plus terminal handler: the per-route artifact.
///
/// Cheap to clone (everything inside is `Arc`ed) and safe to call from
/// concurrent connection tasks.
#[derive(Clone)]
pub struct Endpoint {
    stages: Arc<[Stage]>,
    handler: BoxedHandler,
    catcher: Option<Catcher>,
}

impl Endpoint {
    pub(crate) fn from_parts(
        stages: Vec<Stage>,
        handler: BoxedHandler,
        catcher: Option<Catcher>,
    ) -> Self {
        Self { stages: stages.into(), handler, catcher }
    }

    /// Runs the chain and handler to completion, resolving any failure via
    /// this endpoint's own error handler or the logged default 500.
    pub async fn run(&self, req: Request) -> Response {
        let method = req.method();
        let path = req.path().to_owned();
        match self.try_run(req).await {
            Ok(resp) => resp,
            Err(raised) => match &self.catcher {
                Some(catcher) => catcher.handle(method, raised.into_error()).await,
                None => unhandled(method, &path, raised.into_error()),
            },
        }
    }

    /// Runs the chain and handler, leaving failures to the caller.
    pub(crate) async fn try_run(&self, req: Request) -> Result<Response, Raised> {
        run_from(Arc::clone(&self.stages), 0, Arc::clone(&self.handler), req).await
    }

    pub(crate) fn catcher(&self) -> Option<&Catcher> {
        self.catcher.as_ref()
    }
}

/// Last resort when no error handler is installed.
pub(crate) fn unhandled(method: Method, path: &str, err: Error) -> Response {
    error!(%method, %path, error = %err, "unhandled error in route");
    Response::status(Status::InternalServerError)
}

/// Walks the stages starting at `idx`, then the terminal handler.
///
/// Inline stages are a plain loop. An around stage receives the whole
/// remainder as its `Next` continuation, which recurses back in here — hence
/// the boxed return type. A downstream error's origin survives an around
/// stage that just propagates it; only errors the stage raises itself are
/// attributed to the stage.
fn run_from(
    stages: Arc<[Stage]>,
    mut idx: usize,
    handler: BoxedHandler,
    mut req: Request,
) -> BoxFuture<Result<Response, Raised>> {
    Box::pin(async move {
        while idx < stages.len() {
            match &stages[idx] {
                Stage::Inline(mw) => match mw.call(req).await {
                    Ok(Flow::Next(r)) => {
                        req = r;
                        idx += 1;
                    }
                    Ok(Flow::Halt(resp)) => return Ok(resp),
                    Err(e) => return Err(Raised::Middleware(e)),
                },
                Stage::Around(mw) => {
                    let rest = Arc::clone(&stages);
                    let rest_handler = Arc::clone(&handler);
                    let rest_idx = idx + 1;
                    let next = Next::new(move |req| {
                        Box::pin(async move {
                            run_from(rest, rest_idx, rest_handler, req)
                                .await
                                .map_err(Raised::into_marked_error)
                        })
                    });
                    return mw.call(req, next).await.map_err(Raised::from_marked_error);
                }
            }
        }
        handler.call(req).await.map_err(Raised::Handler)
    })
}

// ── IntoEndpoint ──────────────────────────────────────────────────────────────

/// Anything a per-method [`Route`](crate::Route) entry accepts: a finished
/// [`Endpoint`], or a bare handler function (the no-middleware case).
pub trait IntoEndpoint {
    fn into_endpoint(self) -> Endpoint;
}

impl IntoEndpoint for Endpoint {
    fn into_endpoint(self) -> Endpoint {
        self
    }
}

impl<F, Fut, R> IntoEndpoint for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_endpoint(self) -> Endpoint {
        Endpoint::from_parts(Vec::new(), self.into_boxed_handler(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;

    #[derive(Clone, PartialEq, Debug)]
    struct Seen(Vec<&'static str>);

    fn record(label: &'static str) -> impl Middleware {
        move |mut req: Request| async move {
            let mut seen = req.take::<Seen>().unwrap_or(Seen(Vec::new()));
            seen.0.push(label);
            req.set(seen);
            req
        }
    }

    fn req() -> Request {
        Request::new(Method::Get, "/test")
    }

    #[tokio::test]
    async fn empty_chain_runs_handler_directly() {
        let endpoint = Chain::new().finish(|_req: Request| async { "just the handler" });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.body(), b"just the handler");
    }

    #[tokio::test]
    async fn stages_run_left_to_right() {
        let endpoint = Chain::new()
            .with(record("first"))
            .with(record("second"))
            .finish(|req: Request| async move {
                let seen = req.get::<Seen>().cloned().unwrap_or(Seen(vec![]));
                Response::text(seen.0.join(","))
            });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.body(), b"first,second");
    }

    #[tokio::test]
    async fn halt_skips_rest_of_chain_and_handler() {
        let endpoint = Chain::new()
            .with(|_req: Request| async { Response::status(Status::Forbidden) })
            .with(record("never"))
            .finish(|_req: Request| async { "never either" });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.status_code(), 403);
    }

    #[tokio::test]
    async fn catch_converts_middleware_error() {
        let endpoint = Chain::new()
            .with(|_req: Request| async { Err::<Flow, Error>(Error::msg("teapot time")) })
            .catch(|_method: Method, err: Error| async move {
                Response::builder()
                    .status(Status::ImATeapot)
                    .json(format!(r#"{{"message":"{}"}}"#, err.message()))
            })
            .finish(|_req: Request| async { "unreachable" });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.status_code(), 418);
        assert_eq!(resp.body(), br#"{"message":"teapot time"}"#);
    }

    #[tokio::test]
    async fn catch_covers_handler_errors_too() {
        let endpoint = Chain::new()
            .catch(|_method: Method, _err: Error| async { Status::BadGateway })
            .finish(|_req: Request| async { Err::<Response, Error>(Error::msg("late")) });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.status_code(), 502);
    }

    #[tokio::test]
    async fn unhandled_error_is_a_500() {
        let endpoint = Chain::new()
            .finish(|_req: Request| async { Err::<Response, Error>(Error::msg("oops")) });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.status_code(), 500);
    }

    #[tokio::test]
    async fn around_middleware_sees_the_response_on_the_way_out() {
        let endpoint = Chain::new()
            .with(from_fn(|req: Request, next: Next| async move {
                let resp = next.run(req).await?;
                Ok::<_, Error>(Response::builder()
                    .status(Status::Ok)
                    .header("x-wrapped", "yes")
                    .text(resp.body().to_vec()))
            }))
            .with(record("inner"))
            .finish(|req: Request| async move {
                let seen = req.get::<Seen>().cloned().unwrap_or(Seen(vec![]));
                Response::text(seen.0.join(","))
            });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.header("x-wrapped"), Some("yes"));
        assert_eq!(resp.body(), b"inner");
    }

    #[tokio::test]
    async fn handler_error_keeps_its_origin_through_around() {
        let endpoint = Chain::new()
            .with(from_fn(|req: Request, next: Next| async move { next.run(req).await }))
            .finish(|_req: Request| async { Err::<Response, Error>(Error::msg("late")) });
        match endpoint.try_run(req()).await {
            Err(Raised::Handler(e)) => assert_eq!(e.message(), "late"),
            _ => panic!("expected handler-origin error"),
        }
    }

    #[tokio::test]
    async fn around_error_of_its_own_is_a_middleware_error() {
        let endpoint = Chain::new()
            .with(from_fn(|req: Request, next: Next| async move {
                next.run(req).await?;
                Err::<Response, Error>(Error::msg("post-processing failed"))
            }))
            .finish(|_req: Request| async { "fine" });
        match endpoint.try_run(req()).await {
            Err(Raised::Middleware(e)) => assert_eq!(e.message(), "post-processing failed"),
            _ => panic!("expected middleware-origin error"),
        }
    }

    #[tokio::test]
    async fn around_transforming_a_handler_error_claims_it() {
        let endpoint = Chain::new()
            .with(from_fn(|req: Request, next: Next| async move {
                next.run(req).await.map_err(|e| Error::msg(format!("rewrapped: {e}")))
            }))
            .finish(|_req: Request| async { Err::<Response, Error>(Error::msg("late")) });
        match endpoint.try_run(req()).await {
            Err(Raised::Middleware(e)) => assert_eq!(e.message(), "rewrapped: late"),
            _ => panic!("expected middleware-origin error"),
        }
    }

    #[tokio::test]
    async fn around_short_circuits_by_not_calling_next() {
        let endpoint = Chain::new()
            .with(from_fn(|_req: Request, _next: Next| async move {
                Response::status(Status::TooManyRequests)
            }))
            .finish(|_req: Request| async { "never" });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.status_code(), 429);
    }
}
