//! # weft
//!
//! Composable middleware chains for async API route handlers.
//! Nothing more. Nothing less.
//!
//! ## The contract
//!
//! The surrounding framework owns the URL: it decided which route file the
//! request belongs to before weft runs. weft owns what happens *inside* the
//! route: several small middleware functions run in a fixed left-to-right
//! order around one terminal handler. Each middleware may:
//!
//! - read or extend the in-flight [`Request`] (attaching typed fields later
//!   stages can read), then yield it onward, or
//! - short-circuit the chain with a [`Response`], or
//! - fail, handing an [`Error`] to the shared error handler.
//!
//! What weft intentionally ignores — the framework or your middleware owns:
//!
//! - **URL routing/matching** — the framework picked the route already
//! - **Request parsing** — `req.body()` is bytes; bring your own parser
//! - **Response serialization** — `Response::json` takes bytes you built
//! - **Validation** — that's a middleware you write, not a feature weft ships
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use weft::{Chain, Error, Flow, Method, Request, Response, Route, Server, Status};
//!
//! #[derive(Clone)]
//! struct CurrentUser(String);
//!
//! async fn authenticate(mut req: Request) -> Flow {
//!     let Some(user) = req.header("x-user").map(str::to_owned) else {
//!         return Flow::Halt(Response::status(Status::Unauthorized));
//!     };
//!     req.set(CurrentUser(user));
//!     Flow::Next(req)
//! }
//!
//! async fn whoami(req: Request) -> Response {
//!     let user = req.get::<CurrentUser>().map(|u| u.0.clone()).unwrap_or_default();
//!     Response::json(format!(r#"{{"user":"{user}"}}"#).into_bytes())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let route = Route::new()
//!         .get(Chain::new().with(authenticate).finish(whoami))
//!         .error_handler(|_method: Method, err: Error| async move {
//!             Response::builder()
//!                 .status(Status::InternalServerError)
//!                 .json(format!(r#"{{"error":"{err}"}}"#).into_bytes())
//!         });
//!
//!     Server::bind("0.0.0.0:3000").serve(route).await.unwrap();
//! }
//! ```
//!
//! ## Two route shapes
//!
//! - **Per-route** (legacy): one [`Endpoint`] answers every method —
//!   `Chain::new().with(…).finish(handler)`, then call [`Endpoint::run`].
//! - **Per-method** (newer): a [`Route`] table maps each HTTP method to its
//!   own endpoint; missing methods answer 405.
//!
//! For chains where the value sharing should be checked at compile time
//! instead of through the typed field map, see [`typed::Pipeline`].

mod chain;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod route;
mod server;
mod status;

pub mod middleware;
pub mod typed;

pub use chain::{Chain, Endpoint, ErrorHandler, IntoEndpoint};
pub use error::Error;
pub use handler::{Handler, IntoOutcome};
pub use method::Method;
pub use middleware::{Flow, IntoFlow, Middleware};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response};
pub use route::Route;
pub use server::Server;
pub use status::Status;
