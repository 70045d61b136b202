//! Minimal weft example — an authenticated JSON API route.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/                       # 401, no key
//!   curl -H 'x-api-key: hunter2' http://localhost:3000/
//!   curl -X POST -H 'x-api-key: hunter2' \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}' http://localhost:3000/
//!   curl -X DELETE http://localhost:3000/             # 405, no entry

use weft::middleware::trace;
use weft::{Chain, Error, Flow, Method, Request, Response, Route, Server, Status};

#[derive(Clone)]
struct ApiKey(String);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let route = Route::new()
        .get(
            Chain::new()
                .with(trace())
                .with(require_api_key)
                .finish(whoami),
        )
        .post(
            Chain::new()
                .with(trace())
                .with(require_api_key)
                .finish(create_user),
        )
        .error_handler(|method: Method, err: Error| async move {
            Response::builder()
                .status(Status::InternalServerError)
                .json(format!(r#"{{"method":"{method}","error":"{err}"}}"#).into_bytes())
        });

    Server::bind("0.0.0.0:3000")
        .serve(route)
        .await
        .expect("server error");
}

// Middleware: reject requests without an x-api-key header, attach the key
// for downstream stages otherwise.
async fn require_api_key(mut req: Request) -> Flow {
    let Some(key) = req.header("x-api-key").map(str::to_owned) else {
        return Flow::Halt(Response::status(Status::Unauthorized));
    };
    req.set(ApiKey(key));
    Flow::Next(req)
}

// GET /
//
// The typed field attached by require_api_key is visible here.
async fn whoami(req: Request) -> Response {
    let key = req.get::<ApiKey>().map(|k| k.0.clone()).unwrap_or_default();
    Response::json(format!(r#"{{"key":"{key}"}}"#).into_bytes())
}

// POST /
//
// req.body() is &[u8] — parse with serde_json::from_slice or anything else.
// weft does not touch the bytes.
async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(Status::BadRequest);
    }

    Response::builder()
        .status(Status::Created)
        .header("location", "/users/99")
        .json(r#"{"id":"99"}"#.as_bytes().to_vec())
}
