use std::sync::Mutex;

use clipwright_core::types::BufferItem;

use crate::sync::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Stored; carries the new length.
    Appended(usize),
    Empty,
    /// Equal to the item directly before it.
    Duplicate,
}

/// Ordered collection of collected items with adjacent-duplicate suppression.
#[derive(Debug, Default)]
pub struct BufferStore {
    items: Mutex<Vec<BufferItem>>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trims `raw` and appends it unless it is blank or repeats the last item.
    ///
    /// The compare and the push happen under one lock so two concurrent
    /// writers cannot both pass the duplicate check.
    pub fn append(&self, raw: &str) -> AppendOutcome {
        let Some(item) = BufferItem::new(raw) else {
            return AppendOutcome::Empty;
        };

        let mut items = lock(&self.items);
        if items.last() == Some(&item) {
            return AppendOutcome::Duplicate;
        }
        items.push(item);
        AppendOutcome::Appended(items.len())
    }

    pub fn clear(&self) {
        lock(&self.items).clear();
    }

    pub fn snapshot(&self) -> Vec<BufferItem> {
        lock(&self.items).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }
}
