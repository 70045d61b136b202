//! Built-in request tracing middleware.

use std::time::Instant;

use tracing::info;

use super::{Middleware, Next, from_fn};
use crate::request::Request;

/// Per-request tracing: method, path, status, latency.
///
/// ```rust
/// use weft::Chain;
/// use weft::middleware::trace;
///
/// let chain = Chain::new().with(trace());
/// ```
///
/// Emits one `info` event per request once the response is known. Put it
/// first in the chain so the latency figure covers every later stage and
/// the terminal handler.
pub fn trace() -> impl Middleware {
    from_fn(|req: Request, next: Next| async move {
        let method = req.method();
        let path = req.path().to_owned();
        let start = Instant::now();

        let result = next.run(req).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(resp) => {
                info!(%method, %path, status = resp.status_code(), ?elapsed, "request");
            }
            Err(error) => {
                info!(%method, %path, %error, ?elapsed, "request failed");
            }
        }
        result
    })
}
