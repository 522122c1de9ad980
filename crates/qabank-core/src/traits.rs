use std::collections::BTreeSet;

use crate::types::{Entry, EntryId, Tag};

/// Read access to the current version of every stored entry.
pub trait EntrySource {
    fn entry(&self, id: EntryId) -> Option<&Entry>;
    /// Current versions in ascending id order.
    fn current_entries(&self) -> Box<dyn Iterator<Item = &Entry> + '_>;
    fn entry_count(&self) -> usize;
}

/// Tag → entry id resolution used to narrow search candidates.
pub trait TagLookup {
    /// Ids carrying `tag`; empty for unknown tags.
    fn lookup(&self, tag: &Tag) -> BTreeSet<EntryId>;
}
