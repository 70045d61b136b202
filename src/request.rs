//! The in-flight request type middleware chains operate on.
//!
//! A [`Request`] is owned by whichever stage of the chain is currently
//! running: middleware receives it by value, mutates or extends it, and
//! yields it onward (or consumes it by halting with a response). The
//! interesting part is the typed field map — see [`Request::set`].

use bytes::Bytes;
use http::Extensions;

use crate::method::Method;

/// An in-flight API request.
///
/// Construction is builder-flavoured; the surrounding framework (or a test)
/// assembles one and hands it to a chain:
///
/// ```rust
/// use weft::{Method, Request};
///
/// let req = Request::new(Method::Post, "/api/users")
///     .with_header("content-type", "application/json")
///     .with_body(r#"{"name":"alice"}"#);
/// ```
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    fields: Extensions,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Vec::new(),
            body: Bytes::new(),
            fields: Extensions::new(),
        }
    }

    /// Sets the raw query string, without the leading `?`.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Appends a header. Names are stored as given; lookup is case-insensitive.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The path only — never includes the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, if the URL had one. Decoding it is the caller's
    /// business.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup. First match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Raw body bytes. Parsing them is the caller's business.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    // ── Typed fields ──────────────────────────────────────────────────────────
    //
    // One value per type. A middleware that attaches `CurrentUser` makes it
    // visible to every later middleware and to the terminal handler; the
    // request object is the union of everything attached so far.

    /// Attaches a typed field, returning the previous value of that type if
    /// one was already attached.
    pub fn set<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.fields.insert(value)
    }

    /// Reads a typed field attached by an earlier middleware.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.fields.get()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.fields.get_mut()
    }

    /// Detaches and returns a typed field.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.fields.remove()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.fields.get::<T>().is_some()
    }
}
