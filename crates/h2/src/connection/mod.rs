//! HTTP/2 connection handling
//!
//! [`H2Connection`] drives one server-side connection from the client preface to
//! the final GOAWAY. Internally it is split in three parts that talk over bounded
//! channels:
//!
//! - the read loop, the only place inbound frames mutate connection and stream state
//! - the dispatcher, which runs the [`Handler`](crate::handler::Handler) for every
//!   completed request and sends server pushes
//! - the writer, the single funnel for outbound frames, which also enforces the
//!   peer's flow-control windows
//!
//! The stream table is shared by all three behind a mutex.

mod config;
mod dispatcher;
mod h2_connection;
mod reader;
mod stream_table;
mod writer;

pub use config::H2Config;
pub use h2_connection::H2Connection;
