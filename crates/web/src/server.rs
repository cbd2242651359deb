use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use micro_h2::connection::{H2Config, H2Connection};
use micro_h2::handler::Handler;
use micro_h2::protocol::HttpError;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_rustls::TlsAcceptor;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::handler::{BoxError, RequestHandler};
use crate::middleware::{Middleware, Middlewares, Next};
use crate::responder::TEXT_PLAIN_UTF_8;
use crate::router::Router;
use crate::tls::{self, ALPN_H2, TlsError};

pub struct ServerBuilder {
    router: Option<Router>,
    middlewares: Vec<Arc<dyn Middleware>>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    tls: Option<(PathBuf, PathBuf)>,
    config: H2Config,
    error_sender: Option<mpsc::Sender<HttpError>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            router: None,
            middlewares: Vec::new(),
            address: None,
            tls: None,
            config: H2Config::default(),
            error_sender: None,
        }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Runs `middleware` around every request, in registration order.
    ///
    /// Server-wide middleware also sees static files and unmatched paths.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Serves h2 over TLS with the PEM encoded certificate chain and key.
    pub fn tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some((cert_path.into(), key_path.into()));
        self
    }

    pub fn config(mut self, config: H2Config) -> Self {
        self.config = config;
        self
    }

    /// Receives the error of every connection that ended with one.
    ///
    /// Errors are dropped when the channel is full.
    pub fn error_sender(mut self, sender: mpsc::Sender<HttpError>) -> Self {
        self.error_sender = Some(sender);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)??;
        let tls_acceptor = match &self.tls {
            Some((cert_path, key_path)) => Some(tls::acceptor(cert_path, key_path)?),
            None => None,
        };

        Ok(Server {
            routes: Arc::new(Routes { router }),
            middlewares: self.middlewares.into(),
            address,
            tls_acceptor,
            config: self.config,
            error_sender: self.error_sender,
        })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("router", &self.router)
            .field("middlewares", &self.middlewares.len())
            .field("address", &self.address)
            .field("tls", &self.tls)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub struct Server {
    routes: Arc<Routes>,
    middlewares: Middlewares,
    address: Vec<SocketAddr>,
    tls_acceptor: Option<TlsAcceptor>,
    config: H2Config,
    error_sender: Option<mpsc::Sender<HttpError>>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] io::Error),
    #[error("tls setup failed: {0}")]
    Tls(#[from] TlsError),
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            debug!("global tracing subscriber already installed");
        }

        info!(address = ?self.address, tls = self.tls_acceptor.is_some(), "start listening");
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        self.serve(tcp_listener).await;
    }

    /// Accepts connections from `tcp_listener` forever.
    pub async fn serve(self, tcp_listener: TcpListener) {
        let server = Arc::new(self);
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server.serve_connection(tcp_stream, remote_addr).await;
            });
        }
    }

    async fn serve_connection(self: Arc<Self>, tcp_stream: TcpStream, remote_addr: SocketAddr) {
        let config = self.config.clone();
        let result = match &self.tls_acceptor {
            Some(acceptor) => {
                let tls_stream = match acceptor.accept(tcp_stream).await {
                    Ok(tls_stream) => tls_stream,
                    Err(e) => {
                        warn!(%remote_addr, cause = %e, "tls handshake failed");
                        return;
                    }
                };
                if tls_stream.get_ref().1.alpn_protocol() != Some(ALPN_H2) {
                    warn!(%remote_addr, "client did not negotiate h2, closing");
                    return;
                }
                let (reader, writer) = tokio::io::split(tls_stream);
                H2Connection::with_config(reader, writer, config).process(Arc::clone(&self)).await
            }
            None => {
                let (reader, writer) = tcp_stream.into_split();
                H2Connection::with_config(reader, writer, config).process(Arc::clone(&self)).await
            }
        };

        match result {
            Ok(()) => info!(%remote_addr, "finished process, connection shutdown"),
            Err(e) => {
                error!(%remote_addr, cause = %e, "connection shutdown with error");
                self.report(e);
            }
        }
    }

    fn report(&self, e: HttpError) {
        let Some(sender) = &self.error_sender else {
            return;
        };
        match sender.try_send(e) {
            Ok(()) => {}
            Err(TrySendError::Full(e)) => warn!(cause = %e, "error channel full, dropping connection error"),
            Err(TrySendError::Closed(e)) => debug!(cause = %e, "error channel closed, dropping connection error"),
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("router", &self.routes.router)
            .field("middlewares", &self.middlewares.len())
            .field("address", &self.address)
            .field("tls", &self.tls_acceptor.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn not_found() -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF_8));
    response
}

/// HEAD answers carry the headers GET would, with `content-length` but no body.
fn strip_body(mut response: Response<Bytes>) -> Response<Bytes> {
    let body = std::mem::take(response.body_mut());
    if !body.is_empty() && !response.headers().contains_key(CONTENT_LENGTH) {
        response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    response
}

/// The innermost step of the server-wide chain: routes, then static files, then 404.
struct Routes {
    router: Router,
}

#[async_trait]
impl RequestHandler for Routes {
    async fn invoke(&self, mut req: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        let path = req.uri().path().to_string();
        let route_result = self.router.search(&path);

        if let Some(handler) = route_result.handler(req.method()) {
            req.extensions_mut().insert(route_result.into_params());
            return handler.invoke(req).await;
        }

        if let Some(file) = route_result.static_file() {
            if req.method() == Method::GET || req.method() == Method::HEAD {
                return Ok(file.serve().await);
            }
        }

        debug!(method = %req.method(), path = %path, "no handler found");
        Ok(not_found())
    }
}

#[async_trait]
impl Handler for Server {
    type Error = BoxError;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        let is_head = req.method() == Method::HEAD;
        let endpoint: Arc<dyn RequestHandler> = self.routes.clone();
        let response = Next::new(Arc::clone(&self.middlewares), endpoint).run(req).await?;
        Ok(if is_head { strip_body(response) } else { response })
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;
    use crate::handler_fn;
    use crate::middleware::middleware_fn;
    use crate::responder::Json;
    use crate::router::{get, post};

    #[derive(Serialize)]
    struct EchoResult {
        #[serde(rename = "Result")]
        result: String,
    }

    async fn hello(_req: Request<Bytes>) -> &'static str {
        "Hello World"
    }

    async fn test_post(req: Request<Bytes>) -> Json<EchoResult> {
        let body = String::from_utf8_lossy(req.body());
        Json(EchoResult { result: format!("{body}_RESULT") })
    }

    async fn echo_param(req: Request<Bytes>) -> String {
        crate::PathParams::from_request(&req).get("msg").unwrap_or_default().to_string()
    }

    fn server() -> Server {
        let router = Router::builder()
            .route("/", get(handler_fn(hello)))
            .route("/test", post(handler_fn(test_post)))
            .route("/api/{msg}", get(handler_fn(echo_param)))
            .build()
            .unwrap();
        Server::builder().router(router).address("127.0.0.1:0").build().unwrap()
    }

    fn request(method: Method, path: &str, body: &'static [u8]) -> Request<Bytes> {
        Request::builder().method(method).uri(path).body(Bytes::from_static(body)).unwrap()
    }

    #[tokio::test]
    async fn post_with_json_result() {
        let response = server().call(request(Method::POST, "/test", b"TEST")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.body(), r#"{"Result":"TEST_RESULT"}"#);
    }

    #[tokio::test]
    async fn unmatched_path_is_not_found() {
        let response = server().call(request(Method::GET, "/invalid", b"")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn unmatched_method_is_not_found() {
        let response = server().call(request(Method::DELETE, "/", b"")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn path_params_reach_the_handler() {
        let response = server().call(request(Method::GET, "/api/hi", b"")).await.unwrap();
        assert_eq!(response.body(), "hi");
    }

    async fn preflight(req: Request<Bytes>, next: Next) -> Result<Response<Bytes>, BoxError> {
        if req.method() != Method::OPTIONS {
            return next.run(req).await;
        }
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = StatusCode::NO_CONTENT;
        response.headers_mut().insert("access-control-allow-origin", HeaderValue::from_static("*"));
        Ok(response)
    }

    async fn server_header(req: Request<Bytes>, next: Next) -> Result<Response<Bytes>, BoxError> {
        let mut response = next.run(req).await?;
        response.headers_mut().insert("server", HeaderValue::from_static("micro-h2"));
        Ok(response)
    }

    fn server_with_middleware() -> Server {
        let router = Router::builder().route("/", get(handler_fn(hello))).build().unwrap();
        Server::builder()
            .router(router)
            .middleware(middleware_fn(server_header))
            .middleware(middleware_fn(preflight))
            .address("127.0.0.1:0")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn server_middleware_wraps_routes_and_not_found() {
        let server = server_with_middleware();

        let response = server.call(request(Method::GET, "/", b"")).await.unwrap();
        assert_eq!(response.headers()["server"], "micro-h2");
        assert_eq!(response.body(), "Hello World");

        let response = server.call(request(Method::GET, "/missing", b"")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["server"], "micro-h2");
    }

    #[tokio::test]
    async fn middleware_can_answer_without_a_route() {
        // no OPTIONS route exists, the middleware answers before routing
        let response = server_with_middleware().call(request(Method::OPTIONS, "/", b"")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["server"], "micro-h2");
    }

    #[tokio::test]
    async fn head_on_a_get_route_has_length_but_no_body() {
        let response = server().call(request(Method::HEAD, "/", b"")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "11");
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn head_on_a_static_file_has_length_but_no_body() {
        let dir = std::env::temp_dir().join(format!("micro-h2-web-head-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("hello.txt"), "hello static").await.unwrap();

        let router = Router::builder().static_dir("/static", &dir).build().unwrap();
        let server = Server::builder().router(router).address("127.0.0.1:0").build().unwrap();

        let response = server.call(request(Method::HEAD, "/static/hello.txt", b"")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "12");
        assert!(response.body().is_empty());

        let response = server.call(request(Method::GET, "/static/hello.txt", b"")).await.unwrap();
        assert_eq!(response.body(), "hello static");
        assert!(response.headers().get(CONTENT_LENGTH).is_none());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn build_requires_router_and_address() {
        assert!(matches!(Server::builder().address("127.0.0.1:0").build(), Err(ServerBuildError::MissingRouter)));

        let router = Router::builder().build().unwrap();
        assert!(matches!(Server::builder().router(router).build(), Err(ServerBuildError::MissingAddress)));
    }

    #[tokio::test]
    async fn connection_errors_are_reported_without_blocking() {
        let (sender, mut receiver) = mpsc::channel(1);
        let router = Router::builder().build().unwrap();
        let server = Server::builder().router(router).address("127.0.0.1:0").error_sender(sender).build().unwrap();

        server.report(HttpError::handshake("first"));
        server.report(HttpError::handshake("second"));

        assert!(matches!(receiver.recv().await, Some(HttpError::Handshake { reason }) if reason == "first"));
        assert!(receiver.try_recv().is_err());
    }
}
