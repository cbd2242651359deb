//! Path and method routing on top of [`matchit`].
//!
//! ```
//! use bytes::Bytes;
//! use http::Request;
//! use micro_h2_web::router::{Router, get, post};
//! use micro_h2_web::{PathParams, handler_fn};
//!
//! async fn echo(req: Request<Bytes>) -> String {
//!     PathParams::from_request(&req).get("msg").unwrap_or_default().to_string()
//! }
//!
//! async fn create(_req: Request<Bytes>) -> &'static str {
//!     "created"
//! }
//!
//! let router = Router::builder()
//!     .route("/api/{msg}", get(handler_fn(echo)))
//!     .route("/api/{msg}", post(handler_fn(create)))
//!     .static_dir("/static", "./public")
//!     .build()
//!     .unwrap();
//! assert!(router.search("/api/hello").handler(&http::Method::GET).is_some());
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, Response};
use thiserror::Error;
use tracing::trace;

use crate::handler::{BoxError, RequestHandler};
use crate::middleware::{Middleware, Middlewares, Next};
use crate::request::PathParams;
use crate::static_files::StaticFile;

type InnerRouter<T> = matchit::Router<T>;

/// Main router structure that handles HTTP request routing
pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
    static_dirs: Vec<StaticDir>,
}

/// A handler bound to one method of a route, behind its own middleware
pub struct RouterItem {
    method: Method,
    handler: Arc<dyn RequestHandler>,
    middlewares: Middlewares,
}

#[derive(Debug, Clone)]
struct StaticDir {
    prefix: String,
    dir: PathBuf,
}

/// Result of matching a path: the handlers of the matched route and its path
/// parameters, or the static file the path names.
pub struct RouteResult<'router> {
    router_items: &'router [RouterItem],
    params: PathParams,
    static_file: Option<StaticFile>,
}

#[derive(Debug, Error)]
pub enum RouterBuildError {
    #[error("invalid route '{path}': {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Matches a path against the routes first and the static directories second.
    pub fn search(&self, path: &str) -> RouteResult<'_> {
        if let Ok(matched) = self.inner_router.at(path) {
            return RouteResult { router_items: matched.value.as_slice(), params: matched.params.into(), static_file: None };
        }

        let static_file = self.static_dirs.iter().find_map(|static_dir| static_dir.resolve(path));
        trace!(path, found_static = static_file.is_some(), "no route matched");
        RouteResult { router_items: &[], params: PathParams::empty(), static_file }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("static_dirs", &self.static_dirs).finish_non_exhaustive()
    }
}

impl StaticDir {
    fn resolve(&self, path: &str) -> Option<StaticFile> {
        let rest = path.strip_prefix(self.prefix.trim_end_matches('/'))?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        StaticFile::resolve(&self.dir, rest)
    }
}

impl RouterItem {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Runs `middleware` around this route's handler, after any added before it.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        let mut middlewares = self.middlewares.to_vec();
        middlewares.push(Arc::new(middleware));
        self.middlewares = middlewares.into();
        self
    }
}

#[async_trait]
impl RequestHandler for RouterItem {
    async fn invoke(&self, req: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        Next::new(Arc::clone(&self.middlewares), Arc::clone(&self.handler)).run(req).await
    }
}

impl std::fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterItem")
            .field("method", &self.method)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl<'router> RouteResult<'router> {
    /// Returns true if neither a route nor a static file matched
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.router_items.is_empty() && self.static_file.is_none()
    }

    /// The handler registered for `method`; HEAD falls back to GET.
    pub fn handler(&self, method: &Method) -> Option<&'router RouterItem> {
        let find = |method: &Method| self.router_items.iter().find(|item| item.method == method);
        find(method).or_else(|| if method == Method::HEAD { find(&Method::GET) } else { None })
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_params(self) -> PathParams {
        self.params
    }

    pub fn static_file(&self) -> Option<&StaticFile> {
        self.static_file.as_ref()
    }

    pub fn router_items(&self) -> &'router [RouterItem] {
        self.router_items
    }
}

impl std::fmt::Debug for RouteResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteResult")
            .field("router_items", &self.router_items)
            .field("params", &self.params)
            .field("static_file", &self.static_file)
            .finish()
    }
}

pub struct RouterBuilder {
    data: HashMap<String, Vec<RouterItem>>,
    static_dirs: Vec<StaticDir>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { data: HashMap::new(), static_dirs: Vec::new() }
    }

    pub fn route(mut self, route: impl Into<String>, item: RouterItem) -> Self {
        self.data.entry(route.into()).or_default().push(item);
        self
    }

    /// Serves files below `dir` for every path starting with `prefix` that no route matched.
    pub fn static_dir(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.static_dirs.push(StaticDir { prefix: prefix.into(), dir: dir.into() });
        self
    }

    pub fn build(self) -> Result<Router, RouterBuildError> {
        let mut inner_router = InnerRouter::new();
        for (path, items) in self.data {
            inner_router
                .insert(path.clone(), items)
                .map_err(|source| RouterBuildError::InvalidRoute { path, source })?;
        }
        Ok(Router { inner_router, static_dirs: self.static_dirs })
    }
}

impl std::fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder").field("routes", &self.data.keys()).field("static_dirs", &self.static_dirs).finish()
    }
}

macro_rules! method_router {
    ($name:ident, $method:expr) => {
        pub fn $name<H: RequestHandler + 'static>(handler: H) -> RouterItem {
            RouterItem { method: $method, handler: Arc::new(handler), middlewares: Arc::from(Vec::new()) }
        }
    };
}

method_router!(get, Method::GET);
method_router!(post, Method::POST);
method_router!(put, Method::PUT);
method_router!(delete, Method::DELETE);
method_router!(head, Method::HEAD);
method_router!(options, Method::OPTIONS);
method_router!(patch, Method::PATCH);

#[cfg(test)]
mod tests {
    use std::path::Path;

    use http::{HeaderValue, StatusCode};

    use super::*;
    use crate::handler_fn;
    use crate::middleware::middleware_fn;

    async fn simple_get(_req: Request<Bytes>) -> &'static str {
        "get"
    }

    async fn simple_post(_req: Request<Bytes>) -> &'static str {
        "post"
    }

    fn router() -> Router {
        Router::builder()
            .route("/", get(handler_fn(simple_get)))
            .route("/", post(handler_fn(simple_post)))
            .route("/api/{msg}", get(handler_fn(simple_get)))
            .static_dir("/static", "public")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn picks_the_handler_by_method() {
        let router = router();
        let result = router.search("/");
        assert_eq!(result.router_items().len(), 2);

        let response = result.handler(&Method::POST).unwrap().invoke(Request::new(Bytes::new())).await.unwrap();
        assert_eq!(response.body(), "post");
        assert!(result.handler(&Method::HEAD).is_some());
        assert!(result.handler(&Method::DELETE).is_none());
    }

    async fn teapot(_req: Request<Bytes>, _next: Next) -> Result<Response<Bytes>, BoxError> {
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = StatusCode::IM_A_TEAPOT;
        Ok(response)
    }

    async fn stamp(req: Request<Bytes>, next: Next) -> Result<Response<Bytes>, BoxError> {
        let mut response = next.run(req).await?;
        response.headers_mut().insert("x-route", HeaderValue::from_static("stamped"));
        Ok(response)
    }

    #[tokio::test]
    async fn route_middleware_only_wraps_its_route() {
        let router = Router::builder()
            .route("/", get(handler_fn(simple_get)).with(middleware_fn(stamp)))
            .route("/", post(handler_fn(simple_post)))
            .route("/locked", get(handler_fn(simple_get)).with(middleware_fn(teapot)).with(middleware_fn(stamp)))
            .build()
            .unwrap();

        let result = router.search("/");
        let response = result.handler(&Method::GET).unwrap().invoke(Request::new(Bytes::new())).await.unwrap();
        assert_eq!(response.headers()["x-route"], "stamped");
        assert_eq!(response.body(), "get");

        let response = result.handler(&Method::POST).unwrap().invoke(Request::new(Bytes::new())).await.unwrap();
        assert!(response.headers().get("x-route").is_none());

        // the first middleware answers, so neither the second nor the handler runs
        let result = router.search("/locked");
        let response = result.handler(&Method::GET).unwrap().invoke(Request::new(Bytes::new())).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert!(response.headers().get("x-route").is_none());
        assert!(response.body().is_empty());
    }

    #[test]
    fn captures_path_params() {
        let router = router();
        let result = router.search("/api/hello");
        assert_eq!(result.params().get("msg"), Some("hello"));
        assert!(result.static_file().is_none());
    }

    #[test]
    fn falls_back_to_static_dirs() {
        let router = router();
        let result = router.search("/static/css/site.css");
        assert!(result.router_items().is_empty());
        assert_eq!(result.static_file().unwrap().path(), Path::new("public/css/site.css"));

        assert!(router.search("/staticfile.css").is_empty());
        assert!(router.search("/invalid").is_empty());
    }

    #[test]
    fn conflicting_routes_fail_to_build() {
        let result = Router::builder()
            .route("/{a}", get(handler_fn(simple_get)))
            .route("/{b}", get(handler_fn(simple_get)))
            .build();
        assert!(matches!(result, Err(RouterBuildError::InvalidRoute { .. })));
    }
}
