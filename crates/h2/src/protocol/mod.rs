//! HTTP/2 protocol types shared by the codec, the connection and handlers.
//!
//! - `error`: error codes and the error types of every layer
//! - [`settings`]: SETTINGS parameters and their validation
//! - `stream`: the per-stream state machine
//! - `message`: what flows between the read loop, the dispatcher and the writer
//! - request/response conversion between header fields and [`http`] types
//! - `push`: server push requests a handler attaches to its response

mod error;
mod message;
mod push;
mod request;
mod response;
pub mod settings;
mod stream;

pub use error::{ErrorCode, H2Error, HttpError};
pub use message::{OutboundKind, OutboundStream, RequestStream};
pub use push::{PushRequest, PushRequests};
pub use response::{internal_server_error, response_fields};
pub use settings::Settings;
pub use stream::{Stream, StreamState};
