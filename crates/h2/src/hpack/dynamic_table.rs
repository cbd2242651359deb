use std::collections::VecDeque;

use super::HeaderField;

/// A size-bounded FIFO of recently coded header fields, newest first.
///
/// One instance lives on each side of a connection. The encoder and decoder apply
/// the same insertions in the same order, so both converge on identical content.
#[derive(Debug, Clone)]
pub struct DynamicTable {
    entries: VecDeque<HeaderField>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        Self { entries: VecDeque::new(), size: 0, max_size }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// `age` 0 is the most recently inserted entry.
    pub fn get(&self, age: usize) -> Option<&HeaderField> {
        self.entries.get(age)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.entries.iter()
    }

    /// Inserts at the newest end, evicting from the oldest end until the entry fits.
    ///
    /// An entry larger than the whole table empties it and is not stored.
    pub fn insert(&mut self, field: HeaderField) {
        let field_size = field.size();
        if field_size > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }

        self.evict_to(self.max_size - field_size);
        self.size += field_size;
        self.entries.push_front(field);
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to(max_size);
    }

    fn evict_to(&mut self, target: usize) {
        while self.size > target {
            match self.entries.pop_back() {
                Some(evicted) => self.size -= evicted.size(),
                None => break,
            }
        }
    }
}
