//! Statically-typed pipelines.
//!
//! The dynamic [`Chain`](crate::Chain) shares values through the request's
//! typed field map, checked at runtime. A [`Pipeline`] moves that contract
//! into the type system: each middleware *produces* a value, and the
//! terminal handler receives the accumulated tuple of everything produced so
//! far — misspell a type or reorder the stages and the program does not
//! compile.
//!
//! ```rust
//! use weft::typed::{Pipeline, Step};
//! use weft::{Request, Response, Status};
//!
//! struct UserId(u64);
//! struct Quota(u32);
//!
//! let endpoint = Pipeline::new()
//!     .then(|req: Request| async move {
//!         match req.header("x-user").map(|u| u.len() as u64) {
//!             Some(n) => Step::Next(req, UserId(n)),
//!             None => Step::Halt(Response::status(Status::Unauthorized)),
//!         }
//!     })
//!     .then(|req: Request| async move { Step::Next(req, Quota(100)) })
//!     .finish(|_req: Request, (user, quota): (UserId, Quota)| async move {
//!         Response::text(format!("user {} quota {}", user.0, quota.0))
//!     });
//! ```
//!
//! A halting stage never produces its value, so later stages and the handler
//! never run — the tuple the handler sees is always fully populated.
//!
//! Tuples stay flat up to eight produced values, which has yet to be a
//! limit anyone hit in practice.

use std::future::Future;
use std::sync::Arc;

use crate::chain::{Endpoint, ErrorHandler};
use crate::error::Error;
use crate::handler::{BoxFuture, Handler, IntoOutcome};
use crate::request::Request;
use crate::response::Response;

// ── Step ──────────────────────────────────────────────────────────────────────

/// What a typed middleware decided: continue with a produced value, or halt.
pub enum Step<T> {
    Next(Request, T),
    Halt(Response),
}

/// What a typed middleware function is allowed to return: a [`Step`], or a
/// `Result` of one so `?` works inside.
pub trait IntoStep<T> {
    fn into_step(self) -> Result<Step<T>, Error>;
}

impl<T> IntoStep<T> for Step<T> {
    fn into_step(self) -> Result<Step<T>, Error> {
        Ok(self)
    }
}

impl<T, E: Into<Error>> IntoStep<T> for Result<Step<T>, E> {
    fn into_step(self) -> Result<Step<T>, Error> {
        self.map_err(Into::into)
    }
}

// ── Join ──────────────────────────────────────────────────────────────────────

/// Flat tuple accumulation: `()` + A = `(A,)`, `(A,)` + B = `(A, B)`, and so
/// on. This is what keeps the handler signature readable instead of nesting
/// pairs.
pub trait Join<T> {
    type Joined;
    fn join(self, value: T) -> Self::Joined;
}

impl<T> Join<T> for () {
    type Joined = (T,);
    fn join(self, value: T) -> (T,) {
        (value,)
    }
}

impl<A, T> Join<T> for (A,) {
    type Joined = (A, T);
    fn join(self, value: T) -> (A, T) {
        (self.0, value)
    }
}

impl<A, B, T> Join<T> for (A, B) {
    type Joined = (A, B, T);
    fn join(self, value: T) -> (A, B, T) {
        (self.0, self.1, value)
    }
}

impl<A, B, C, T> Join<T> for (A, B, C) {
    type Joined = (A, B, C, T);
    fn join(self, value: T) -> (A, B, C, T) {
        (self.0, self.1, self.2, value)
    }
}

impl<A, B, C, D, T> Join<T> for (A, B, C, D) {
    type Joined = (A, B, C, D, T);
    fn join(self, value: T) -> (A, B, C, D, T) {
        (self.0, self.1, self.2, self.3, value)
    }
}

impl<A, B, C, D, E, T> Join<T> for (A, B, C, D, E) {
    type Joined = (A, B, C, D, E, T);
    fn join(self, value: T) -> (A, B, C, D, E, T) {
        (self.0, self.1, self.2, self.3, self.4, value)
    }
}

impl<A, B, C, D, E, F, T> Join<T> for (A, B, C, D, E, F) {
    type Joined = (A, B, C, D, E, F, T);
    fn join(self, value: T) -> (A, B, C, D, E, F, T) {
        (self.0, self.1, self.2, self.3, self.4, self.5, value)
    }
}

impl<A, B, C, D, E, F, G, T> Join<T> for (A, B, C, D, E, F, G) {
    type Joined = (A, B, C, D, E, F, G, T);
    fn join(self, value: T) -> (A, B, C, D, E, F, G, T) {
        (self.0, self.1, self.2, self.3, self.4, self.5, self.6, value)
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

type PipelineFn<S> = dyn Fn(Request) -> BoxFuture<Result<Step<S>, Error>> + Send + Sync;

/// A statically-typed middleware pipeline carrying produced state `S`.
///
/// Start with [`Pipeline::new`] (state `()`), grow the state with
/// [`then`](Pipeline::then), terminate with [`finish`](Pipeline::finish).
pub struct Pipeline<S> {
    run: Arc<PipelineFn<S>>,
    catcher: Option<crate::chain::Catcher>,
}

impl Pipeline<()> {
    pub fn new() -> Self {
        Self {
            run: Arc::new(|req| Box::pin(async move { Ok(Step::Next(req, ())) })),
            catcher: None,
        }
    }
}

impl Default for Pipeline<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + 'static> Pipeline<S> {
    /// Appends a typed middleware. Its produced value joins the state tuple.
    pub fn then<F, Fut, R, T>(self, middleware: F) -> Pipeline<S::Joined>
    where
        S: Join<T>,
        S::Joined: Send + 'static,
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoStep<T> + Send + 'static,
        T: Send + 'static,
    {
        let prev = self.run;
        let middleware = Arc::new(middleware);
        Pipeline {
            run: Arc::new(move |req| {
                let prev_fut = (prev)(req);
                let middleware = Arc::clone(&middleware);
                Box::pin(async move {
                    match prev_fut.await? {
                        Step::Halt(resp) => Ok(Step::Halt(resp)),
                        Step::Next(req, state) => match (middleware)(req).await.into_step()? {
                            Step::Halt(resp) => Ok(Step::Halt(resp)),
                            Step::Next(req, value) => Ok(Step::Next(req, state.join(value))),
                        },
                    }
                })
            }),
            catcher: self.catcher,
        }
    }

    /// Installs a shared error handler covering every stage and the terminal
    /// handler. A pipeline erases into a single endpoint stage, so this is
    /// the place to catch — route-level `error_handler` treats a pipeline
    /// failure as a handler failure.
    pub fn catch(mut self, handler: impl ErrorHandler) -> Self {
        self.catcher = Some(handler.into_catcher());
        self
    }

    /// Terminates the pipeline. The handler receives the request plus the
    /// full state tuple; the result mounts anywhere an
    /// [`Endpoint`](crate::Endpoint) does.
    pub fn finish<H, Fut, R>(self, handler: H) -> Endpoint
    where
        H: Fn(Request, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + Send + 'static,
    {
        let run = self.run;
        let handler = Arc::new(handler);
        let glue = move |req: Request| {
            let pipeline_fut = (run)(req);
            let handler = Arc::clone(&handler);
            async move {
                match pipeline_fut.await? {
                    Step::Halt(resp) => Ok::<Response, Error>(resp),
                    Step::Next(req, state) => (handler)(req, state).await.into_outcome(),
                }
            }
        };
        Endpoint::from_parts(Vec::new(), glue.into_boxed_handler(), self.catcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::status::Status;

    struct Tenant(&'static str);
    struct Plan(&'static str);

    fn req() -> Request {
        Request::new(Method::Get, "/typed")
    }

    #[tokio::test]
    async fn state_accumulates_left_to_right() {
        let endpoint = Pipeline::new()
            .then(|req: Request| async move { Step::Next(req, Tenant("acme")) })
            .then(|req: Request| async move { Step::Next(req, Plan("pro")) })
            .finish(|_req: Request, (tenant, plan): (Tenant, Plan)| async move {
                Response::text(format!("{}/{}", tenant.0, plan.0))
            });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.body(), b"acme/pro");
    }

    #[tokio::test]
    async fn halt_stops_before_later_stages() {
        let endpoint = Pipeline::new()
            .then(|_req: Request| async move {
                Step::<Tenant>::Halt(Response::status(Status::Unauthorized))
            })
            .then(|req: Request| async move { Step::Next(req, Plan("pro")) })
            .finish(|_req: Request, (_t, _p): (Tenant, Plan)| async move {
                Response::text("never")
            });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.status_code(), 401);
    }

    #[tokio::test]
    async fn fallible_stage_reaches_pipeline_catch() {
        let endpoint = Pipeline::new()
            .then(|_req: Request| async move {
                Err::<Step<Tenant>, Error>(Error::msg("lookup failed"))
            })
            .catch(|_m: Method, err: Error| async move {
                Response::builder().status(Status::BadGateway).text(err.message().to_owned())
            })
            .finish(|_req: Request, (_t,): (Tenant,)| async move { Response::text("never") });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.status_code(), 502);
        assert_eq!(resp.body(), b"lookup failed");
    }

    #[tokio::test]
    async fn empty_pipeline_passes_unit_state() {
        let endpoint = Pipeline::new()
            .finish(|_req: Request, (): ()| async move { Response::text("bare") });
        let resp = endpoint.run(req()).await;
        assert_eq!(resp.body(), b"bare");
    }
}
