//! An asynchronous micro HTTP/2 server engine
//!
//! This crate implements the server side of an HTTP/2 connection on top of tokio:
//! the binary frame codec, HPACK header compression, the stream and connection
//! state machines, flow control and server push. Request routing and responses are
//! left to a [`handler::Handler`]; every completed request stream is handed to it
//! as a buffered [`http::Request<bytes::Bytes>`].
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use micro_h2::connection::H2Connection;
//! use micro_h2::handler::make_handler;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             match H2Connection::new(reader, writer).process(handler).await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!(cause = %e, "connection shutdown with error"),
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request<Bytes>) -> Result<Response<Bytes>, Infallible> {
//!     info!(path = request.uri().path(), "receiving request");
//!     Ok(Response::new(Bytes::from_static(b"Hello World!")))
//! }
//! ```
//!
//! # Layers
//!
//! - [`codec`]: frame header and payload parsing, preface detection
//! - [`hpack`]: header compression with static and dynamic tables and Huffman coding
//! - [`protocol`]: error types, settings, the per-stream state machine, request and
//!   response conversion, push requests
//! - [`connection`]: the read loop, dispatcher and writer tied together by [`connection::H2Connection`]
//! - [`handler`]: the application seam
//!
//! # Limitations
//!
//! - Prior-knowledge HTTP/2 only; there is no HTTP/1.1 upgrade path
//! - Bodies are fully buffered in both directions
//! - Stream priorities are parsed and recorded but do not influence scheduling

pub mod codec;
pub mod connection;
pub mod handler;
pub mod hpack;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
