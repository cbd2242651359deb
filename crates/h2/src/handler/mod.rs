//! The seam between the connection engine and application code.
//!
//! Every completed request stream is turned into an [`http::Request<Bytes>`] and
//! passed to a [`Handler`] on its own task. Requests and responses are fully
//! buffered: HTTP/2 bodies arrive as DATA frames and are collected by the read
//! loop before the handler runs.

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

#[async_trait]
pub trait Handler: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<Err, F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<Bytes>, Err>> + Send,
{
    type Error = Err;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        (self.f)(req).await
    }
}

/// Wraps an async function as a [`Handler`].
///
/// ```
/// use bytes::Bytes;
/// use http::{Request, Response};
/// use micro_h2::handler::make_handler;
///
/// async fn hello(_req: Request<Bytes>) -> Result<Response<Bytes>, std::convert::Infallible> {
///     Ok(Response::new(Bytes::from_static(b"Hello World")))
/// }
///
/// let handler = make_handler(hello);
/// # let _ = handler;
/// ```
pub fn make_handler<F, Err, Ret>(f: F) -> HandlerFn<F>
where
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<Bytes>, Err>>,
    F: Fn(Request<Bytes>) -> Ret,
{
    HandlerFn { f }
}
