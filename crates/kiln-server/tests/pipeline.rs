//! End-to-end tests for the request pipeline.

use std::sync::{Arc, Mutex};

use http::{Method, StatusCode};
use kiln_core::{Callable, Handler, KilnError, Provider, Reply, Request, Response, ValidationError};
use kiln_extract::{Header, RequestData, UploadedFile};
use kiln_middleware::{FnMiddleware, Next, Renderers, ResponseRenderer, TextRenderer};
use kiln_router::{Include, Route};
use kiln_server::{App, AppBuilder, Outcome, Transport};
use serde_json::{json, Value as Json};

fn request(method: Method, target: &str) -> Request {
    Request::builder(method, target).build().unwrap()
}

fn send(app: &App, request: Request) -> Response {
    app.handle(request, None)
        .into_response()
        .expect("pipeline kept the connection")
}

fn json_body(response: &Response) -> Json {
    serde_json::from_slice(&response.body).unwrap()
}

fn echo_data() -> Handler {
    Callable::builder("echo")
        .param::<RequestData>("data")
        .build(|args| {
            let data = args.shared::<RequestData>("data")?;
            Ok(Reply::ok(data.fields().clone()))
        })
}

fn add() -> Handler {
    Callable::builder("add")
        .param::<i64>("x")
        .param::<i64>("y")
        .build(|args| {
            let x = args.get::<i64>("x")?;
            let y = args.get::<i64>("y")?;
            Ok(Reply::ok(json!(x + y)))
        })
}

fn app() -> AppBuilder {
    App::builder()
        .route(Route::get("/add/{x}/{y}", add()))
        .route(Route::post("/echo", echo_data()))
}

#[test]
fn test_unmatched_route_is_404() {
    let app = app().build().unwrap();
    let response = send(&app, request(Method::GET, "/missing"));

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text_body(), "Not Found");
    assert_eq!(response.headers.get("content-length"), Some("9"));
}

#[test]
fn test_method_mismatch_is_404() {
    let app = app().build().unwrap();
    let response = send(&app, request(Method::DELETE, "/add/1/2"));
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_path_params_are_coerced() {
    let app = app().build().unwrap();
    let response = send(&app, request(Method::GET, "/add/3/4"));

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(json_body(&response), json!(7));
}

#[test]
fn test_path_param_coercion_failure_is_400() {
    let app = app().build().unwrap();
    let response = send(&app, request(Method::GET, "/add/3/four"));

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response), json!({"y": "invalid int value"}));
}

#[test]
fn test_json_body_round_trip() {
    let app = app().build().unwrap();
    let request = Request::builder(Method::POST, "/echo")
        .header("content-type", "application/json")
        .body(r#"{"name": "kiln"}"#)
        .build()
        .unwrap();

    let response = send(&app, request);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(json_body(&response), json!({"name": "kiln"}));
}

#[test]
fn test_unsupported_media_type_is_415() {
    let app = app().build().unwrap();
    let request = Request::builder(Method::POST, "/echo")
        .header("content-type", "text/xml")
        .body("<name/>")
        .build()
        .unwrap();

    let response = send(&app, request);
    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.text_body(), "Unsupported Media Type");
}

#[test]
fn test_malformed_body_is_400() {
    let app = app().build().unwrap();
    let request = Request::builder(Method::POST, "/echo")
        .header("content-type", "application/json")
        .body("{not json")
        .build()
        .unwrap();

    let response = send(&app, request);
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text_body(),
        "Request cannot be parsed: JSON input could not be parsed"
    );
}

#[test]
fn test_handler_error_is_500() {
    let failing = Callable::builder("failing")
        .build(|_| Err::<Reply, _>(KilnError::internal("database is down")));
    let app = App::builder().route(Route::get("/", failing)).build().unwrap();

    let response = send(&app, request(Method::GET, "/"));
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text_body(), "Internal Server Error");
}

#[test]
fn test_unresolvable_dependency_is_500() {
    struct Database;

    let handler = Callable::builder("needs_db")
        .param::<Database>("db")
        .build(|_| Ok(Reply::ok(json!(null))));
    let app = App::builder().route(Route::get("/", handler)).build().unwrap();

    let response = send(&app, request(Method::GET, "/"));
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_missing_header_is_400() {
    let handler = Callable::builder("secret")
        .param::<Header>("x_api_key")
        .build(|args| {
            let key = args.shared::<Header>("x_api_key")?;
            Ok(Reply::ok(json!(key.as_str())))
        });
    let app = App::builder().route(Route::get("/", handler)).build().unwrap();

    let response = send(&app, request(Method::GET, "/"));
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response), json!({"x-api-key": "missing"}));

    let request = Request::builder(Method::GET, "/")
        .header("x-api-key", "hunter2")
        .build()
        .unwrap();
    assert_eq!(json_body(&send(&app, request)), json!("hunter2"));
}

#[test]
fn test_not_acceptable_is_406() {
    let app = app().build().unwrap();
    let request = Request::builder(Method::GET, "/add/1/1")
        .header("accept", "application/xml")
        .build()
        .unwrap();

    let response = send(&app, request);
    assert_eq!(response.status, StatusCode::NOT_ACCEPTABLE);
}

#[test]
fn test_accept_picks_matching_renderer() {
    let renderers = Renderers::new(vec![
        Arc::new(kiln_middleware::JsonRenderer) as Arc<dyn ResponseRenderer>,
        Arc::new(TextRenderer),
    ]);
    let app = app().renderers(renderers).build().unwrap();

    let request = Request::builder(Method::GET, "/add/1/1")
        .header("accept", "text/plain, application/json")
        .build()
        .unwrap();
    let response = send(&app, request);

    assert_eq!(response.text_body(), "2");
    assert!(response.headers.get("content-type").unwrap().starts_with("text/plain"));
}

#[test]
fn test_custom_not_found_can_inject() {
    let not_found = Callable::builder("not_found")
        .param::<Request>("request")
        .build(|args| {
            let request = args.shared::<Request>("request")?;
            Ok(Reply::with_status(StatusCode::NOT_FOUND, json!({ "missing": request.path })))
        });
    let app = app().not_found(not_found).build().unwrap();

    let response = send(&app, request(Method::GET, "/nowhere"));
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&response), json!({"missing": "/nowhere"}));
}

#[test]
fn test_fallback_receives_exception() {
    let internal = Callable::builder("internal")
        .param::<KilnError>("exception")
        .build(|args| {
            let err = args.shared::<KilnError>("exception")?;
            Ok(Reply::with_status(
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "kind": err.kind(), "message": err.to_string() }),
            ))
        });
    let failing = Callable::builder("failing")
        .build(|_| Err::<Reply, _>(KilnError::internal("queue full")));
    let app = App::builder()
        .route(Route::get("/", failing))
        .internal_error(internal)
        .build()
        .unwrap();

    let response = send(&app, request(Method::GET, "/"));
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&response), json!({"kind": "internal", "message": "queue full"}));
}

#[test]
fn test_failing_fallback_yields_failed_outcome() {
    let broken = Callable::builder("broken")
        .build(|_| Err::<Reply, _>(KilnError::internal("fallback broke")));
    let app = App::builder()
        .internal_error(broken.clone())
        .route(Route::get("/", broken))
        .build()
        .unwrap();

    match app.handle(request(Method::GET, "/"), None) {
        Outcome::Failed { kind, detail } => {
            assert_eq!(kind, "internal");
            assert_eq!(detail, "fallback broke");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_middleware_runs_outermost_first() {
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let layer = |label: &'static str, log: Arc<Mutex<Vec<String>>>| {
        FnMiddleware::new(label, move |next: Next| {
            let log = Arc::clone(&log);
            Callable::builder(label).build(move |_| {
                log.lock().unwrap().push(format!("{label}:in"));
                let reply = next.run();
                log.lock().unwrap().push(format!("{label}:out"));
                reply
            })
        })
    };

    let app = app()
        .middleware(layer("outer", Arc::clone(&log)))
        .middleware(layer("inner", Arc::clone(&log)))
        .build()
        .unwrap();
    send(&app, request(Method::GET, "/add/1/2"));

    assert_eq!(
        *log.lock().unwrap(),
        ["outer:in", "inner:in", "inner:out", "outer:out"]
    );
}

#[test]
fn test_middleware_can_short_circuit() {
    let deny = FnMiddleware::new("deny", |_next: Next| {
        Callable::builder("deny")
            .optional::<Header>("authorization")
            .build(|args| {
                if args.optional_shared::<Header>("authorization")?.is_none() {
                    return Err(KilnError::http(
                        StatusCode::UNAUTHORIZED,
                        json!({"error": "authorization required"}),
                    ));
                }
                Ok(Reply::ok(json!("allowed")))
            })
    });
    let app = app().middleware(deny).build().unwrap();

    let response = send(&app, request(Method::GET, "/add/1/2"));
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&response), json!({"error": "authorization required"}));
}

#[test]
fn test_http_error_without_renderer_middleware_is_still_rendered() {
    let teapot = Callable::builder("teapot")
        .build(|_| Err::<Reply, _>(KilnError::http(StatusCode::IM_A_TEAPOT, json!("short and stout"))));
    let app = App::builder()
        .middleware_stack(Vec::new())
        .route(Route::get("/", teapot))
        .build()
        .unwrap();

    let response = send(&app, request(Method::GET, "/"));
    assert_eq!(response.status, StatusCode::IM_A_TEAPOT);
    assert_eq!(json_body(&response), json!("short and stout"));
}

#[test]
fn test_validation_error_is_400() {
    let create = Callable::builder("create")
        .param::<RequestData>("data")
        .build(|args| {
            let data = args.shared::<RequestData>("data")?;
            if data.get("name").is_none() {
                return Err(KilnError::from(ValidationError::field("name", "this field is required")));
            }
            Ok(Reply::ok(data.fields().clone()))
        });
    let request = || {
        Request::builder(Method::POST, "/items")
            .header("content-type", "application/json")
            .body("{}")
            .build()
            .unwrap()
    };

    for stack in [None, Some(Vec::new())] {
        let mut builder = App::builder().route(Route::post("/items", create.clone()));
        if let Some(stack) = stack {
            builder = builder.middleware_stack(stack);
        }
        let response = send(&builder.build().unwrap(), request());

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&response), json!({"name": "this field is required"}));
    }
}

#[test]
fn test_multipart_upload() {
    let upload = Callable::builder("upload")
        .param::<RequestData>("data")
        .param::<UploadedFile>("document")
        .build(|args| {
            let data = args.shared::<RequestData>("data")?;
            let document = args.shared::<UploadedFile>("document")?;
            Ok(Reply::with_status(
                StatusCode::CREATED,
                json!({
                    "title": data.get("title"),
                    "file_name": document.file_name(),
                    "content_type": document.content_type(),
                    "size": document.len(),
                }),
            ))
        });
    let app = App::builder().route(Route::post("/upload", upload)).build().unwrap();

    let body = concat!(
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n",
        "\r\n",
        "Quarterly report\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"document\"; filename=\"q3.csv\"\r\n",
        "Content-Type: text/csv\r\n",
        "\r\n",
        "month,total\r\njuly,12\r\n",
        "--XyZ--\r\n",
    );
    let upload_request = |body: &'static str| {
        Request::builder(Method::POST, "/upload")
            .header("content-type", "multipart/form-data; boundary=XyZ")
            .body(body)
            .build()
            .unwrap()
    };

    let response = send(&app, upload_request(body));
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        json_body(&response),
        json!({
            "title": "Quarterly report",
            "file_name": "q3.csv",
            "content_type": "text/csv",
            "size": 20,
        })
    );

    let without_file = concat!(
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n",
        "\r\n",
        "Quarterly report\r\n",
        "--XyZ--\r\n",
    );
    let response = send(&app, upload_request(without_file));
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response), json!({"document": "missing"}));
}

#[test]
fn test_handler_can_take_over_transport() {
    let upgrade = Callable::builder("upgrade")
        .param::<Transport>("transport")
        .build(|args| {
            let transport = args.shared::<Transport>("transport")?;
            transport.send(Response::text(StatusCode::SWITCHING_PROTOCOLS, ""))?;
            Err::<Reply, _>(KilnError::RequestHandled)
        });
    let app = App::builder().route(Route::get("/ws", upgrade)).build().unwrap();

    let (transport, captured) = Transport::capture();
    let outcome = app.handle(request(Method::GET, "/ws"), Some(transport));

    assert!(outcome.is_taken_over());
    assert!(outcome.into_response().is_none());
    assert_eq!(captured.take().unwrap().status, StatusCode::SWITCHING_PROTOCOLS);
}

#[test]
fn test_no_content_has_no_body() {
    let handler = Callable::builder("delete")
        .build(|_| Ok(Reply::Response(Response::with_body(StatusCode::NO_CONTENT, "gone"))));
    let app = App::builder().route(Route::delete("/item", handler)).build().unwrap();

    let response = send(&app, request(Method::DELETE, "/item"));
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
    assert!(!response.headers.contains("content-length"));
}

#[test]
fn test_singleton_component_is_shared_across_requests() {
    struct Counter(Mutex<u64>);

    let counter = Provider::<Counter>::new(
        Callable::builder("counter").build(|_| Ok(Counter(Mutex::new(0)))),
    )
    .singleton();
    let hit = Callable::builder("hit")
        .param::<Counter>("counter")
        .build(|args| {
            let counter = args.shared::<Counter>("counter")?;
            let mut count = counter.0.lock().unwrap();
            *count += 1;
            Ok(Reply::ok(json!(*count)))
        });
    let app = App::builder()
        .component(counter)
        .route(Route::get("/hit", hit))
        .build()
        .unwrap();

    assert_eq!(json_body(&send(&app, request(Method::GET, "/hit"))), json!(1));
    assert_eq!(json_body(&send(&app, request(Method::GET, "/hit"))), json!(2));
}

#[test]
fn test_includes_and_reverse_uri() {
    let show = Callable::builder("show")
        .param::<String>("id")
        .build(|args| Ok(Reply::ok(json!(args.get::<String>("id")?))));
    let app = App::builder()
        .route(Include::new("/v1/accounts", vec![Route::get("/{id}", show).into()]).with_namespace("accounts"))
        .build()
        .unwrap();

    let response = send(&app, request(Method::GET, "/v1/accounts/42"));
    assert_eq!(json_body(&response), json!("42"));
    assert_eq!(
        app.reverse_uri("accounts:show", [("id", "42")]).unwrap(),
        "/v1/accounts/42"
    );
    assert!(app.reverse_uri("accounts:missing", [("id", "1")]).is_err());
}
