//! Per-method route tables.
//!
//! A [`Route`] is the newer route shape: one entry per HTTP method, each
//! entry a bare handler or a finished chain. No path matching happens here —
//! the surrounding framework already decided which route file owns the URL;
//! weft only decides which method entry runs.
//!
//! ```rust
//! use weft::{Chain, Request, Response, Route, Status};
//!
//! # async fn authenticate(req: Request) -> Request { req }
//! let route = Route::new()
//!     .get(|_req: Request| async { Response::text("list") })
//!     .post(
//!         Chain::new()
//!             .with(authenticate)
//!             .finish(|_req: Request| async { Status::Created }),
//!     );
//! ```

use std::collections::HashMap;

use crate::chain::{Catcher, Endpoint, ErrorHandler, IntoEndpoint, Raised, unhandled};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// A per-method route table.
///
/// Build it once at startup; dispatch it per request. Each registration
/// method returns `self` so entries chain naturally. Registering the same
/// method twice keeps the later entry.
pub struct Route {
    entries: HashMap<Method, Endpoint>,
    catcher: Option<Catcher>,
    include_handler_errors: bool,
}

impl Route {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            catcher: None,
            include_handler_errors: false,
        }
    }

    /// Registers an entry for an arbitrary method.
    pub fn on(mut self, method: Method, endpoint: impl IntoEndpoint) -> Self {
        self.entries.insert(method, endpoint.into_endpoint());
        self
    }

    pub fn get(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::Get, endpoint)
    }

    pub fn post(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::Post, endpoint)
    }

    pub fn put(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::Put, endpoint)
    }

    pub fn patch(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::Patch, endpoint)
    }

    pub fn delete(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::Delete, endpoint)
    }

    pub fn head(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::Head, endpoint)
    }

    pub fn options(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::Options, endpoint)
    }

    /// Installs a shared error handler for every entry.
    ///
    /// Covers middleware failures. Terminal-handler failures stay out of its
    /// sight unless [`include_handler_errors`](Route::include_handler_errors)
    /// opts them in — a handler that fails without opt-in is logged and
    /// answered with a bare 500.
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.catcher = Some(handler.into_catcher());
        self
    }

    /// Extends the shared error handler to terminal-handler failures.
    pub fn include_handler_errors(mut self, include: bool) -> Self {
        self.include_handler_errors = include;
        self
    }

    /// Runs the entry registered for the request's method.
    ///
    /// No entry means `405 Method Not Allowed`.
    pub async fn dispatch(&self, req: Request) -> Response {
        let method = req.method();
        let Some(endpoint) = self.entries.get(&method) else {
            return Response::status(Status::MethodNotAllowed);
        };

        let path = req.path().to_owned();
        match endpoint.try_run(req).await {
            Ok(resp) => resp,
            Err(raised) => {
                let from_handler = matches!(raised, Raised::Handler(_));
                let error = raised.into_error();
                // The entry's own `catch` wins over the route-wide handler
                // and covers both origins, matching standalone Endpoint::run.
                if let Some(own) = endpoint.catcher() {
                    own.handle(method, error).await
                } else if let Some(shared) = &self.catcher {
                    if !from_handler || self.include_handler_errors {
                        shared.handle(method, error).await
                    } else {
                        unhandled(method, &path, error)
                    }
                } else {
                    unhandled(method, &path, error)
                }
            }
        }
    }

    /// The methods this route answers, mainly useful for an OPTIONS/Allow
    /// header built by the caller.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.entries.keys().copied()
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::new()
    }
}
