//! Middleware running around request handlers.
//!
//! A middleware sees the request before the handler and the response after it.
//! Returning a response without calling [`Next::run`] finishes the request early,
//! so later middleware and the handler never run.
//!
//! Middleware is registered for the whole server with
//! [`ServerBuilder::middleware`](crate::ServerBuilder::middleware), where it also
//! sees static files and unmatched paths, or for one route with
//! [`RouterItem::with`](crate::router::RouterItem::with).
//!
//! ```
//! use bytes::Bytes;
//! use http::{Request, Response, StatusCode};
//! use micro_h2_web::middleware::{Next, middleware_fn};
//! use micro_h2_web::{BoxError, QueryExt};
//!
//! async fn authenticated(req: Request<Bytes>, next: Next) -> Result<Response<Bytes>, BoxError> {
//!     if req.query_param("token").as_deref() != Some("1234") {
//!         let mut response = Response::new(Bytes::new());
//!         *response.status_mut() = StatusCode::UNAUTHORIZED;
//!         return Ok(response);
//!     }
//!     next.run(req).await
//! }
//!
//! let _middleware = middleware_fn(authenticated);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::handler::{BoxError, RequestHandler};

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: Request<Bytes>, next: Next) -> Result<Response<Bytes>, BoxError>;
}

/// An ordered list of middleware, shared by every request that runs through it.
pub type Middlewares = Arc<[Arc<dyn Middleware>]>;

/// The rest of the chain: the remaining middleware, then the handler.
#[derive(Clone)]
pub struct Next {
    middlewares: Middlewares,
    index: usize,
    endpoint: Arc<dyn RequestHandler>,
}

impl Next {
    pub(crate) fn new(middlewares: Middlewares, endpoint: Arc<dyn RequestHandler>) -> Self {
        Self { middlewares, index: 0, endpoint }
    }

    pub async fn run(mut self, req: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        match self.middlewares.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(req, self).await
            }
            None => self.endpoint.invoke(req).await,
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("remaining", &(self.middlewares.len() - self.index)).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct FnMiddleware<F> {
    f: F,
}

/// Wraps `async fn(Request<Bytes>, Next) -> Result<Response<Bytes>, BoxError>` as a [`Middleware`].
pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request<Bytes>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>, BoxError>> + Send,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request<Bytes>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>, BoxError>> + Send,
{
    async fn handle(&self, req: Request<Bytes>, next: Next) -> Result<Response<Bytes>, BoxError> {
        (self.f)(req, next).await
    }
}
