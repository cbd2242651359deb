use std::time::Instant;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use micro_h2_web::router::{Router, get, post};
use micro_h2_web::{BoxError, Html, Json, Next, PathParams, PushExt, QueryExt, Server, handler_fn, middleware_fn};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct EchoResult {
    #[serde(rename = "Result")]
    result: String,
}

async fn index(req: Request<Bytes>) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from_static(b"<link rel=stylesheet href=/static/site.css><h1>hello h2</h1>"));
    response.push(&req, "/static/site.css");
    response
}

async fn hello(req: Request<Bytes>) -> Html<String> {
    let name = PathParams::from_request(&req).get("name").unwrap_or("world");
    Html(format!("<p>hello {name}</p>"))
}

// curl --http2-prior-knowledge 'http://127.0.0.1:8080/greet?name=h2'
async fn greet(req: Request<Bytes>) -> String {
    format!("hello {}", req.query_param("name").unwrap_or_else(|| "world".into()))
}

async fn access_log(req: Request<Bytes>, next: Next) -> Result<Response<Bytes>, BoxError> {
    let start = Instant::now();
    let (method, path) = (req.method().clone(), req.uri().path().to_string());
    let response = next.run(req).await?;
    info!(%method, %path, status = response.status().as_u16(), elapsed = ?start.elapsed(), "request done");
    Ok(response)
}

// curl --http2-prior-knowledge -d 'TEST' http://127.0.0.1:8080/test
async fn echo(req: Request<Bytes>) -> Result<Json<EchoResult>, (StatusCode, &'static str)> {
    match std::str::from_utf8(req.body()) {
        Ok(body) => Ok(Json(EchoResult { result: format!("{body}_RESULT") })),
        Err(_) => Err((StatusCode::BAD_REQUEST, "request body is not utf8")),
    }
}

#[tokio::main]
async fn main() {
    let router = Router::builder()
        .route("/", get(handler_fn(index)))
        .route("/hello/{name}", get(handler_fn(hello)))
        .route("/greet", get(handler_fn(greet)))
        .route("/test", post(handler_fn(echo)))
        .static_dir("/static", "./public")
        .build()
        .unwrap();

    Server::builder()
        .router(router)
        .middleware(middleware_fn(access_log))
        .address("127.0.0.1:8080")
        .build()
        .unwrap()
        .start()
        .await;
}
