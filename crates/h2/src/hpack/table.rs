//! The combined HPACK index space: `1..=61` is the static table, `62..` walks the
//! dynamic table from newest to oldest.

use super::HeaderField;
use super::HpackError;
use super::dynamic_table::DynamicTable;
use super::static_table::{self, STATIC_TABLE_LEN};

/// Where a combined index points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableIndex {
    Static(usize),
    /// age from the newest dynamic entry
    Dynamic(usize),
}

/// Translates a wire index into a table position.
pub fn translate(index: usize) -> Option<TableIndex> {
    match index {
        0 => None,
        i if i <= STATIC_TABLE_LEN => Some(TableIndex::Static(i)),
        i => Some(TableIndex::Dynamic(i - STATIC_TABLE_LEN - 1)),
    }
}

/// Inverse of [`translate`] for a dynamic entry.
pub fn dynamic_index(age: usize) -> usize {
    STATIC_TABLE_LEN + 1 + age
}

/// Resolves a wire index against the static table and `dynamic`.
pub fn resolve(index: usize, dynamic: &DynamicTable) -> Result<HeaderField, HpackError> {
    let entry = match translate(index) {
        Some(TableIndex::Static(i)) => static_table::get(i).map(|(name, value)| HeaderField::new(name, value)),
        Some(TableIndex::Dynamic(age)) => dynamic.get(age).cloned(),
        None => None,
    };
    entry.ok_or(HpackError::InvalidIndex { index })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_boundaries() {
        assert_eq!(translate(0), None);
        assert_eq!(translate(1), Some(TableIndex::Static(1)));
        assert_eq!(translate(61), Some(TableIndex::Static(61)));
        assert_eq!(translate(62), Some(TableIndex::Dynamic(0)));
        assert_eq!(translate(70), Some(TableIndex::Dynamic(8)));
        assert_eq!(dynamic_index(0), 62);
    }

    #[test]
    fn resolves_both_tables() {
        let mut dynamic = DynamicTable::new(4096);
        dynamic.insert(HeaderField::new("old", "1"));
        dynamic.insert(HeaderField::new("new", "2"));

        assert_eq!(resolve(2, &dynamic).unwrap(), HeaderField::new(":method", "GET"));
        assert_eq!(resolve(62, &dynamic).unwrap(), HeaderField::new("new", "2"));
        assert_eq!(resolve(63, &dynamic).unwrap(), HeaderField::new("old", "1"));
        assert_eq!(resolve(64, &dynamic), Err(HpackError::InvalidIndex { index: 64 }));
        assert_eq!(resolve(0, &dynamic), Err(HpackError::InvalidIndex { index: 0 }));
    }
}
