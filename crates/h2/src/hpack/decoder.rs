use bytes::Bytes;
use tracing::trace;

use super::dynamic_table::DynamicTable;
use super::{HeaderField, HpackError, huffman, integer, table};
use crate::ensure;

/// Decodes header blocks received from the peer.
///
/// Owns the receive-side dynamic table. Blocks must be fed in the order they
/// arrived on the wire, including blocks of streams that are later rejected.
#[derive(Debug)]
pub struct HpackDecoder {
    table: DynamicTable,
    /// the HEADER_TABLE_SIZE we advertised, the ceiling for peer size updates
    max_table_size: usize,
}

impl HpackDecoder {
    pub fn new(max_table_size: usize) -> Self {
        Self { table: DynamicTable::new(max_table_size), max_table_size }
    }

    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    pub fn set_max_table_size(&mut self, max_table_size: usize) {
        self.max_table_size = max_table_size;
        if self.table.max_size() > max_table_size {
            self.table.set_max_size(max_table_size);
        }
    }

    pub fn decode(&mut self, src: &[u8]) -> Result<Vec<HeaderField>, HpackError> {
        let mut fields = Vec::new();
        let mut pos = 0;
        // size updates are only legal before the first field of a block
        let mut at_block_start = true;

        while pos < src.len() {
            let rest = &src[pos..];
            let octet = rest[0];

            if octet & 0x80 == 0x80 {
                let (index, used) = integer::decode(rest, 7)?;
                ensure!(index != 0, HpackError::InvalidRepresentation { octet });
                fields.push(table::resolve(index, &self.table)?);
                pos += used;
            } else if octet & 0xc0 == 0x40 {
                let (field, used) = self.decode_literal(rest, 6)?;
                self.table.insert(field.clone());
                fields.push(field);
                pos += used;
            } else if octet & 0xe0 == 0x20 {
                ensure!(at_block_start, HpackError::MisplacedSizeUpdate);
                let (size, used) = integer::decode(rest, 5)?;
                ensure!(size <= self.max_table_size, HpackError::SizeUpdateTooLarge { size, max: self.max_table_size });
                trace!(size, "dynamic table size update");
                self.table.set_max_size(size);
                pos += used;
                continue;
            } else {
                // 0000 without indexing, 0001 never indexed; neither touches the table
                let (field, used) = self.decode_literal(rest, 4)?;
                fields.push(field);
                pos += used;
            }

            at_block_start = false;
        }

        Ok(fields)
    }

    fn decode_literal(&self, src: &[u8], prefix_bits: u8) -> Result<(HeaderField, usize), HpackError> {
        let (name_index, mut pos) = integer::decode(src, prefix_bits)?;

        let name = if name_index == 0 {
            let (name, used) = decode_string(&src[pos..])?;
            pos += used;
            name
        } else {
            table::resolve(name_index, &self.table)?.name
        };

        let (value, used) = decode_string(&src[pos..])?;
        pos += used;

        Ok((HeaderField { name, value }, pos))
    }
}

/// Reads a length-prefixed, optionally Huffman coded string literal.
fn decode_string(src: &[u8]) -> Result<(Bytes, usize), HpackError> {
    let first = *src.first().ok_or(HpackError::Truncated)?;
    let (len, prefix_len) = integer::decode(src, 7)?;
    let end = prefix_len.checked_add(len).filter(|end| *end <= src.len()).ok_or(HpackError::Truncated)?;
    let raw = &src[prefix_len..end];

    let octets = if first & 0x80 == 0x80 {
        let mut decoded = Vec::with_capacity(raw.len() * 8 / 5);
        huffman::decode(raw, &mut decoded)?;
        Bytes::from(decoded)
    } else {
        Bytes::copy_from_slice(raw)
    };

    Ok((octets, end))
}
