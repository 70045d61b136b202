//! Unified error type.

use std::fmt;

/// The error type carried by failing middleware and handlers.
///
/// Expected outcomes (401, 404, 422, …) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// genuine failures — a database gone away, a malformed token, a bug — on
/// their way to the shared error handler, or to the default 500 response if
/// no handler is installed.
pub struct Error {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    from_handler: bool,
}

impl Error {
    /// An error from a bare message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None, from_handler: false }
    }

    /// An error wrapping an underlying cause.
    pub fn wrap(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            source: Some(Box::new(source)),
            from_handler: false,
        }
    }

    /// The human-readable message, as shown to the shared error handler.
    pub fn message(&self) -> &str {
        &self.message
    }

    // Origin marker for errors crossing a two-argument middleware. The chain
    // flattens its origin tag into the error before handing it to `Next`'s
    // caller and recovers it afterwards, so a middleware that merely
    // propagates a terminal-handler failure with `?` does not claim it as
    // its own. Errors built through the public constructors never carry the
    // mark.
    pub(crate) fn mark_from_handler(mut self) -> Self {
        self.from_handler = true;
        self
    }

    pub(crate) fn is_from_handler(&self) -> bool {
        self.from_handler
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error").field("message", &self.message).finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::wrap(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_survives_wrapping() {
        let io = std::io::Error::other("disk on fire");
        let err = Error::wrap(io);
        assert_eq!(err.message(), "disk on fire");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn msg_has_no_source() {
        let err = Error::msg("nope");
        assert!(std::error::Error::source(&err).is_none());
    }
}
