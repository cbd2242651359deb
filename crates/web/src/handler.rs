use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::responder::Responder;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// A routed endpoint.
///
/// Path parameters, when the route has any, are in the request's extensions
/// (see [`PathParams::from_request`](crate::PathParams::from_request)).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: Request<Bytes>) -> Result<Response<Bytes>, BoxError>;
}

/// An async fn holder which turns whatever the fn returns into a response.
#[derive(Debug)]
pub struct FnHandler<F> {
    f: F,
}

/// Wraps `async fn(Request<Bytes>) -> impl Responder` as a [`RequestHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    async fn invoke(&self, req: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        let responder = (self.f)(req).await;
        Ok(responder.response_to())
    }
}
