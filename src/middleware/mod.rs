//! Middleware layer.
//!
//! Middleware intercepts in-flight requests and is the right place for
//! cross-cutting concerns: authentication, request-id injection, structured
//! tracing, header inspection. A middleware is an async function that takes
//! the [`Request`] by value and decides what happens next:
//!
//! ```rust
//! use weft::{Flow, Request, Response, Status};
//!
//! #[derive(Clone)]
//! struct ApiKey(String);
//!
//! async fn require_api_key(mut req: Request) -> Flow {
//!     let Some(key) = req.header("x-api-key").map(str::to_owned) else {
//!         return Flow::Halt(Response::status(Status::Unauthorized));
//!     };
//!     req.set(ApiKey(key));
//!     Flow::Next(req)
//! }
//! ```
//!
//! Chains run middleware strictly left-to-right in registration order;
//! [`Flow::Halt`] stops the chain before the terminal handler ever runs.
//! Typed values attached with [`Request::set`] are visible to every later
//! middleware and to the terminal handler.
//!
//! Older two-argument `(request, next)` middleware slots in via
//! [`from_fn`]; [`trace`] is a ready-made middleware in that style.

mod from_fn;
mod trace;

pub use from_fn::{FromFn, Next, from_fn};
pub use trace::trace;

use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

// ── Flow ──────────────────────────────────────────────────────────────────────

/// What a middleware decided to do with the request.
pub enum Flow {
    /// Keep going: hand the (possibly mutated) request to the next stage.
    Next(Request),
    /// Short-circuit: answer with this response, skipping the rest of the
    /// chain and the terminal handler.
    Halt(Response),
}

/// What a middleware function is allowed to return.
///
/// Besides [`Flow`] itself, a middleware may return the bare [`Request`]
/// (continue), a bare [`Response`] (halt), or a `Result` of either so `?`
/// works inside:
///
/// ```rust
/// use weft::{Error, Flow, Request};
///
/// async fn tag(mut req: Request) -> Result<Flow, Error> {
///     let tenant = req
///         .header("x-tenant")
///         .map(str::to_owned)
///         .ok_or(Error::msg("missing tenant"))?;
///     req.set(tenant);
///     Ok(Flow::Next(req))
/// }
/// ```
pub trait IntoFlow {
    fn into_flow(self) -> Result<Flow, Error>;
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Result<Flow, Error> {
        Ok(self)
    }
}

/// Returning the request continues the chain.
impl IntoFlow for Request {
    fn into_flow(self) -> Result<Flow, Error> {
        Ok(Flow::Next(self))
    }
}

/// Returning a response halts the chain.
impl IntoFlow for Response {
    fn into_flow(self) -> Result<Flow, Error> {
        Ok(Flow::Halt(self))
    }
}

impl<E: Into<Error>> IntoFlow for Result<Flow, E> {
    fn into_flow(self) -> Result<Flow, Error> {
        self.map_err(Into::into)
    }
}

impl<E: Into<Error>> IntoFlow for Result<Request, E> {
    fn into_flow(self) -> Result<Flow, Error> {
        self.map(Flow::Next).map_err(Into::into)
    }
}

// ── Type erasure ──────────────────────────────────────────────────────────────
//
// Same trick as `handler`: a chain holds middleware of different concrete
// types in one Vec, so each is hidden behind a trait object. Inline
// middleware (request in, Flow out) and around middleware (request + Next
// in, response out) erase to different shapes; `Stage` carries either.

/// Internal dispatch interface for inline middleware.
#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request) -> BoxFuture<Result<Flow, Error>>;
}

/// Internal dispatch interface for around middleware (see [`from_fn`]).
#[doc(hidden)]
pub trait ErasedAround {
    fn call(&self, req: Request, next: Next) -> BoxFuture<Result<Response, Error>>;
}

/// One erased link of a chain.
#[doc(hidden)]
#[derive(Clone)]
pub enum Stage {
    Inline(Arc<dyn ErasedMiddleware + Send + Sync>),
    Around(Arc<dyn ErasedAround + Send + Sync>),
}

// ── Public Middleware trait ───────────────────────────────────────────────────

/// Implemented for everything a [`Chain`](crate::Chain) accepts.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn(Request) -> impl IntoFlow`, and for the adapters returned by
/// [`from_fn`] and [`trace`]. Sealed for the same reason as
/// [`Handler`](crate::Handler).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_stage(self) -> Stage;
}

pub(crate) mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
    fn into_stage(self) -> Stage {
        Stage::Inline(Arc::new(FnMiddleware(self)))
    }
}

/// Newtype bridging a concrete inline middleware to the trait-object world.
struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Result<Flow, Error>> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_flow() })
    }
}
