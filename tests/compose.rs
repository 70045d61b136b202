//! End-to-end composition scenarios, exercised through the public API only.

use weft::middleware::{Next, from_fn, trace};
use weft::typed::{Pipeline, Step};
use weft::{Chain, Error, Flow, Method, Request, Response, Route, Status};

#[derive(Clone, PartialEq, Debug)]
struct Foo(&'static str);

#[derive(Clone, PartialEq, Debug)]
struct Fizz(&'static str);

async fn with_foo(mut req: Request) -> Request {
    req.set(Foo("foo"));
    req
}

async fn with_fizz(mut req: Request) -> Request {
    req.set(Fizz("fizz"));
    req
}

async fn with_error(_req: Request) -> Result<Flow, Error> {
    Err(Error::msg("im a teapot error message"))
}

async fn render_both(req: Request) -> Response {
    let foo = req.get::<Foo>().map(|f| f.0).unwrap_or("missing");
    let fizz = req.get::<Fizz>().map(|f| f.0).unwrap_or("missing");
    Response::json(format!(r#"{{"foo":"{foo}","fizz":"{fizz}"}}"#).into_bytes())
}

fn get(path: &str) -> Request {
    Request::new(Method::Get, path)
}

#[tokio::test]
async fn empty_chain_runs_the_final_handler() {
    let endpoint = Chain::new().finish(|_req: Request| async { "im empty" });
    let resp = endpoint.run(get("/")).await;
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.body(), b"im empty");
}

#[tokio::test]
async fn two_middleware_attach_fields_the_handler_reads() {
    let endpoint = Chain::new()
        .with(with_fizz)
        .with(with_foo)
        .finish(render_both);
    let resp = endpoint.run(get("/")).await;
    assert_eq!(resp.body(), br#"{"foo":"foo","fizz":"fizz"}"#);
    assert_eq!(resp.header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn failing_middleware_reaches_the_shared_error_handler() {
    let endpoint = Chain::new()
        .with(with_fizz)
        .with(with_error)
        .with(with_foo)
        .catch(|_method: Method, err: Error| async move {
            Response::builder()
                .status(Status::ImATeapot)
                .json(format!(r#"{{"message":"{}"}}"#, err.message()).into_bytes())
        })
        .finish(render_both);
    let resp = endpoint.run(get("/")).await;
    assert_eq!(resp.status_code(), 418);
    assert_eq!(resp.body(), br#"{"message":"im a teapot error message"}"#);
}

#[tokio::test]
async fn adapted_two_argument_middleware_attach_fields_too() {
    // The (request, next) style: mutate, then hand off explicitly.
    let connect_foo = from_fn(|mut req: Request, next: Next| async move {
        req.set(Foo("foo"));
        next.run(req).await
    });
    let connect_fizz = from_fn(|mut req: Request, next: Next| async move {
        req.set(Fizz("fizz"));
        next.run(req).await
    });

    let endpoint = Chain::new()
        .with(connect_fizz)
        .with(connect_foo)
        .finish(render_both);
    let resp = endpoint.run(get("/")).await;
    assert_eq!(resp.body(), br#"{"foo":"foo","fizz":"fizz"}"#);
}

#[tokio::test]
async fn per_method_route_mixes_bare_handlers_and_chains() {
    let route = Route::new()
        .get(|_req: Request| async { Response::text("haha") })
        .post(
            Chain::new()
                .with(with_foo)
                .with(with_fizz)
                .finish(render_both),
        );

    let got = route.dispatch(get("/api/hello")).await;
    assert_eq!(got.body(), b"haha");

    let posted = route.dispatch(Request::new(Method::Post, "/api/hello")).await;
    assert_eq!(posted.body(), br#"{"foo":"foo","fizz":"fizz"}"#);

    let denied = route.dispatch(Request::new(Method::Delete, "/api/hello")).await;
    assert_eq!(denied.status_code(), 405);
}

#[tokio::test]
async fn halting_middleware_answers_without_the_handler() {
    let route = Route::new().get(
        Chain::new()
            .with(|_req: Request| async {
                Response::builder().status(Status::Forbidden).text("halted")
            })
            .finish(|_req: Request| async { "handler output" }),
    );
    let resp = route.dispatch(get("/")).await;
    assert_eq!(resp.status_code(), 403);
    assert_eq!(resp.body(), b"halted");
}

#[tokio::test]
async fn route_error_handler_skips_handler_failures_unless_opted_in() {
    let failing_handler =
        |_req: Request| async { Err::<Response, Error>(Error::msg("handler broke")) };

    let without_opt_in = Route::new()
        .get(failing_handler)
        .error_handler(|_m: Method, _e: Error| async { Status::ImATeapot });
    assert_eq!(without_opt_in.dispatch(get("/")).await.status_code(), 500);

    let with_opt_in = Route::new()
        .get(failing_handler)
        .error_handler(|_m: Method, _e: Error| async { Status::ImATeapot })
        .include_handler_errors(true);
    assert_eq!(with_opt_in.dispatch(get("/")).await.status_code(), 418);
}

#[tokio::test]
async fn typed_pipeline_mounts_as_a_route_entry() {
    struct User(String);
    struct Role(&'static str);

    let route = Route::new().get(
        Pipeline::new()
            .then(|req: Request| async move {
                match req.header("x-user").map(str::to_owned) {
                    Some(u) => Step::Next(req, User(u)),
                    None => Step::Halt(Response::status(Status::Unauthorized)),
                }
            })
            .then(|req: Request| async move { Step::Next(req, Role("admin")) })
            .finish(|_req: Request, (user, role): (User, Role)| async move {
                Response::text(format!("{} is {}", user.0, role.0))
            }),
    );

    let ok = route
        .dispatch(get("/").with_header("x-user", "alice"))
        .await;
    assert_eq!(ok.body(), b"alice is admin");

    let denied = route.dispatch(get("/")).await;
    assert_eq!(denied.status_code(), 401);
}

#[tokio::test]
async fn trace_middleware_is_transparent() {
    let endpoint = Chain::new()
        .with(trace())
        .with(with_foo)
        .finish(|req: Request| async move {
            let foo = req.get::<Foo>().map(|f| f.0).unwrap_or("missing");
            Response::text(foo)
        });
    let resp = endpoint.run(get("/traced")).await;
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.body(), b"foo");
}

#[tokio::test]
async fn later_middleware_sees_earlier_fields() {
    let endpoint = Chain::new()
        .with(with_foo)
        .with(|req: Request| async move {
            // Downstream middleware reads what upstream attached.
            assert_eq!(req.get::<Foo>(), Some(&Foo("foo")));
            req
        })
        .finish(|_req: Request| async { Status::NoContent });
    let resp = endpoint.run(get("/")).await;
    assert_eq!(resp.status_code(), 204);
}
