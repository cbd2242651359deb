//! Splits the inbound byte stream into length-delimited frames.
//!
//! The decoder only enforces what is needed to keep the stream in sync: a
//! complete 9-octet header, a length within the advertised maximum, and that
//! many payload octets. Payload grammar is checked later by [`Frame::decode`].
//!
//! [`Frame::decode`]: super::Frame::decode

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use super::FrameError;
use super::frame::{FRAME_HEADER_LEN, FrameHeader, RawFrame};
use crate::protocol::settings::DEFAULT_MAX_FRAME_SIZE;

#[derive(Debug)]
pub struct FrameDecoder {
    /// the SETTINGS_MAX_FRAME_SIZE we advertised
    max_frame_size: u32,
    /// header of a frame whose payload is still arriving
    pending: Option<FrameHeader>,
}

impl FrameDecoder {
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size, pending: None }
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameDecoder {
    type Item = RawFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending {
            Some(header) => header,
            None => {
                if src.len() < FRAME_HEADER_LEN {
                    return Ok(None);
                }
                let header_bytes = src.split_to(FRAME_HEADER_LEN);
                let mut raw = [0u8; FRAME_HEADER_LEN];
                raw.copy_from_slice(&header_bytes);
                let header = FrameHeader::parse(&raw);

                if header.length > self.max_frame_size {
                    return Err(FrameError::TooLarge { length: header.length, max: self.max_frame_size });
                }
                header
            }
        };

        let length = header.length as usize;
        if src.len() < length {
            src.reserve(length - src.len());
            self.pending = Some(header);
            return Ok(None);
        }

        self.pending = None;
        let payload = src.split_to(length).freeze();
        trace!(kind = ?header.kind, stream_id = header.stream_id, length, "decoded frame");
        Ok(Some(RawFrame { header, payload }))
    }
}
