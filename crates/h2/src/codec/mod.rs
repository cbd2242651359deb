//! HTTP/2 wire codec.
//!
//! - [`PrefaceDecoder`] consumes the client connection preface; afterwards
//!   `FramedRead::map_decoder` swaps in a [`FrameDecoder`] without losing buffered bytes
//! - [`FrameDecoder`] yields [`RawFrame`]s, [`Frame::decode`] gives them their typed payload
//! - [`FrameEncoder`] writes typed [`Frame`]s back out
//!
//! Errors surfaced here as [`FrameError`] are fatal to the transport. Everything
//! a peer can get wrong inside a well-delimited frame is reported as an
//! [`H2Error`](crate::protocol::H2Error) instead.

mod frame;
mod frame_decoder;
mod frame_encoder;
mod preface;

pub use frame::*;
pub use frame_decoder::FrameDecoder;
pub use frame_encoder::FrameEncoder;
pub use preface::{CONNECTION_PREFACE, PrefaceDecoder};

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("invalid connection preface")]
    InvalidPreface,

    #[error("frame of {length} octets exceeds the maximum of {max}")]
    TooLarge { length: u32, max: u32 },
}
