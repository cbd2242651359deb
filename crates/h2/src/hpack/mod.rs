//! HPACK header compression (RFC 7541).
//!
//! A connection owns one [`HpackContext`], made of a receive-side [`HpackDecoder`]
//! and a send-side [`HpackEncoder`]. Each keeps its own dynamic table; the peer
//! holds the mirror images, so blocks must be coded exactly once and in wire order.
//!
//! # Layout
//!
//! - [`huffman`]: the canonical code from Appendix B
//! - `integer`: prefix-coded integers
//! - `static_table` / `dynamic_table` / `table`: the two tables and the shared index space
//! - [`HpackDecoder`] / [`HpackEncoder`]: the representation grammar

mod decoder;
mod dynamic_table;
mod encoder;
pub mod huffman;
mod integer;
mod static_table;
mod table;

pub use decoder::HpackDecoder;
pub use dynamic_table::DynamicTable;
pub use encoder::HpackEncoder;

use bytes::Bytes;
use thiserror::Error;

/// Fixed per-entry overhead in the table size accounting.
pub const ENTRY_OVERHEAD: usize = 32;

/// A single decoded or to-be-encoded header.
///
/// Names and values stay raw octets. Table accounting has to see exactly what went
/// over the wire, and values may legally carry bytes that are not UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
}

impl HeaderField {
    pub fn new<N: AsRef<[u8]>, V: AsRef<[u8]>>(name: N, value: V) -> Self {
        Self { name: Bytes::copy_from_slice(name.as_ref()), value: Bytes::copy_from_slice(value.as_ref()) }
    }

    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Size as counted against a dynamic table's limit.
    pub fn size(&self) -> usize {
        self.name.len() + self.value.len() + ENTRY_OVERHEAD
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HpackError {
    #[error("invalid representation starting with octet {octet:#04x}")]
    InvalidRepresentation { octet: u8 },

    #[error("header table index {index} out of range")]
    InvalidIndex { index: usize },

    #[error("header block truncated")]
    Truncated,

    #[error("integer exceeds the supported range")]
    IntegerOverflow,

    #[error("dynamic table size update after the first header field")]
    MisplacedSizeUpdate,

    #[error("dynamic table size update to {size} exceeds the advertised {max}")]
    SizeUpdateTooLarge { size: usize, max: usize },

    #[error("huffman error: {0}")]
    Huffman(#[from] huffman::HuffmanError),
}

/// The compression state of one connection.
#[derive(Debug)]
pub struct HpackContext {
    decoder: HpackDecoder,
    encoder: HpackEncoder,
}

impl HpackContext {
    /// `header_table_size` is the initial HEADER_TABLE_SIZE for both directions.
    pub fn new(header_table_size: usize) -> Self {
        Self { decoder: HpackDecoder::new(header_table_size), encoder: HpackEncoder::new(header_table_size) }
    }

    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>, HpackError> {
        self.decoder.decode(block)
    }

    pub fn encode(&mut self, fields: &[HeaderField]) -> Vec<u8> {
        let mut block = Vec::with_capacity(fields.len() * 16);
        self.encoder.encode(fields, &mut block);
        block
    }

    pub fn decoder_mut(&mut self) -> &mut HpackDecoder {
        &mut self.decoder
    }

    pub fn encoder_mut(&mut self) -> &mut HpackEncoder {
        &mut self.encoder
    }

    /// Splits the context so the reader and writer tasks can each own one half.
    pub fn into_parts(self) -> (HpackDecoder, HpackEncoder) {
        (self.decoder, self.encoder)
    }
}
