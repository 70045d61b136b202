//! Adapter for two-argument `(request, next)` middleware.
//!
//! The older middleware style receives the request *and* an explicit
//! continuation, letting it run code on both sides of the downstream chain:
//!
//! ```rust
//! use weft::middleware::{Next, from_fn};
//! use weft::{Error, Request, Response};
//!
//! async fn attach_request_id(mut req: Request, next: Next) -> Result<Response, Error> {
//!     req.set(42u64); // pretend this came from a generator
//!     let resp = next.run(req).await?;
//!     // resp is on its way out — inspect it, log it, pass it along
//!     Ok(resp)
//! }
//!
//! let chain = weft::Chain::new().with(from_fn(attach_request_id));
//! ```
//!
//! Not calling `next` is the short-circuit: return a response directly and
//! the rest of the chain never runs.

use std::future::Future;

use super::{ErasedAround, Middleware, Stage, private};
use crate::error::Error;
use crate::handler::{BoxFuture, IntoOutcome};
use crate::request::Request;
use crate::response::Response;

/// The continuation handed to a two-argument middleware.
///
/// Consuming `run` enforces at-most-once: the remainder of the chain plus
/// the terminal handler run exactly when (and if) the middleware asks.
pub struct Next {
    inner: Box<dyn FnOnce(Request) -> BoxFuture<Result<Response, Error>> + Send>,
}

impl Next {
    pub(crate) fn new(
        f: impl FnOnce(Request) -> BoxFuture<Result<Response, Error>> + Send + 'static,
    ) -> Self {
        Self { inner: Box::new(f) }
    }

    /// Runs the rest of the chain and the terminal handler.
    pub async fn run(self, req: Request) -> Result<Response, Error> {
        (self.inner)(req).await
    }
}

/// Adapts a two-argument `(request, next)` middleware so it can sit inside a
/// chain alongside the single-argument style.
pub fn from_fn<F, Fut, R>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    FromFn(f)
}

/// Middleware returned by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut, R> private::Sealed for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_stage(self) -> Stage {
        Stage::Around(std::sync::Arc::new(self))
    }
}

impl<F, Fut, R> ErasedAround for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture<Result<Response, Error>> {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
