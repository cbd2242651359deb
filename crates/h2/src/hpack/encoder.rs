use super::dynamic_table::DynamicTable;
use super::{HeaderField, huffman, integer, static_table, table};

/// Encodes header blocks sent to the peer.
///
/// Fields small enough to fit the table are sent with incremental indexing and
/// inserted right after they are written, mirroring what the peer's decoder does.
#[derive(Debug)]
pub struct HpackEncoder {
    table: DynamicTable,
    /// smallest and latest table size set since the last block, still to be signalled
    pending_size_update: Option<(usize, usize)>,
}

enum Match {
    Full(usize),
    Name(usize),
    None,
}

impl HpackEncoder {
    pub fn new(max_table_size: usize) -> Self {
        Self { table: DynamicTable::new(max_table_size), pending_size_update: None }
    }

    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    /// Applies a new table size; the change is announced at the start of the next block.
    pub fn set_max_table_size(&mut self, max_table_size: usize) {
        if max_table_size == self.table.max_size() && self.pending_size_update.is_none() {
            return;
        }
        self.table.set_max_size(max_table_size);
        let smallest = match self.pending_size_update {
            Some((smallest, _)) => smallest.min(max_table_size),
            None => max_table_size,
        };
        self.pending_size_update = Some((smallest, max_table_size));
    }

    pub fn encode(&mut self, fields: &[HeaderField], dst: &mut Vec<u8>) {
        if let Some((smallest, latest)) = self.pending_size_update.take() {
            if smallest < latest {
                integer::encode(smallest, 5, 0x20, dst);
            }
            integer::encode(latest, 5, 0x20, dst);
        }

        for field in fields {
            self.encode_field(field, dst);
        }
    }

    fn encode_field(&mut self, field: &HeaderField, dst: &mut Vec<u8>) {
        let name_index = match self.find(field) {
            Match::Full(index) => {
                integer::encode(index, 7, 0x80, dst);
                return;
            }
            Match::Name(index) => Some(index),
            Match::None => None,
        };

        let indexing = field.size() <= self.table.max_size();
        let (prefix_bits, flags) = if indexing { (6, 0x40) } else { (4, 0x00) };

        match name_index {
            Some(index) => integer::encode(index, prefix_bits, flags, dst),
            None => {
                dst.push(flags);
                encode_string(&field.name, dst);
            }
        }
        encode_string(&field.value, dst);

        if indexing {
            self.table.insert(field.clone());
        }
    }

    fn find(&self, field: &HeaderField) -> Match {
        let static_match = static_table::find(&field.name, &field.value);
        if let Some((index, true)) = static_match {
            return Match::Full(index);
        }

        let mut dynamic_name = None;
        for (age, entry) in self.table.iter().enumerate() {
            if entry.name != field.name {
                continue;
            }
            if entry.value == field.value {
                return Match::Full(table::dynamic_index(age));
            }
            dynamic_name.get_or_insert(table::dynamic_index(age));
        }

        match (static_match, dynamic_name) {
            (Some((index, _)), _) => Match::Name(index),
            (None, Some(index)) => Match::Name(index),
            (None, None) => Match::None,
        }
    }
}

/// Writes a string literal, Huffman coded whenever that is shorter.
fn encode_string(src: &[u8], dst: &mut Vec<u8>) {
    let huffman_len = huffman::encoded_len(src);
    if huffman_len < src.len() {
        integer::encode(huffman_len, 7, 0x80, dst);
        huffman::encode(src, dst);
    } else {
        integer::encode(src.len(), 7, 0x00, dst);
        dst.extend_from_slice(src);
    }
}
