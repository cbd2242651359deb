//! A small web layer on top of [`micro_h2`].
//!
//! It provides the pieces an HTTP/2 application needs around the connection engine:
//!
//! - [`Router`]: path and method routing with path parameters and static directories
//! - [`handler_fn`]: turns `async fn(Request<Bytes>) -> impl Responder` into a handler
//! - [`middleware`]: code around handlers, server-wide or per route, that may answer early
//! - [`QueryExt`]: typed access to the query string
//! - [`Responder`]: text, [`Json`], [`Html`], status pairs and prebuilt responses
//! - [`PushExt`]: server push from inside a handler
//! - [`Server`]: the accept loop, optionally behind TLS with ALPN `h2`
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Request;
//! use micro_h2_web::router::{Router, get};
//! use micro_h2_web::{Server, handler_fn};
//!
//! async fn hello_world(_req: Request<Bytes>) -> &'static str {
//!     "hello world"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder().route("/", get(handler_fn(hello_world))).build().unwrap();
//!
//!     Server::builder().router(router).address("127.0.0.1:8080").build().unwrap().start().await;
//! }
//! ```

mod handler;
mod push;
mod request;
mod responder;
mod server;
mod static_files;

pub mod middleware;
pub mod router;
pub mod tls;

pub use handler::{BoxError, FnHandler, RequestHandler, handler_fn};
pub use middleware::{Middleware, Next, middleware_fn};
pub use push::PushExt;
pub use request::{PathParams, QueryExt};
pub use responder::{Html, Json, Responder};
pub use router::Router;
pub use server::{Server, ServerBuildError, ServerBuilder};
pub use static_files::StaticFile;
