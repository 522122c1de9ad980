//! Store and tag index behind one reader/writer lock.
//!
//! Writes take the lock exclusively and update the index in the same
//! critical section, so a reader never sees an entry the index does not
//! know about (or the reverse).

use std::path::Path;

use parking_lot::RwLock;

use qabank_core::loader::ParsedBatch;
use qabank_core::types::{Entry, EntryId, NewEntry, SearchHit, Tag};
use qabank_core::{EntryStore, Error, MalformedRecord, Result};
use qabank_text::{Query, QueryEngine, TagIndex};

struct Shelves {
    store: EntryStore,
    index: TagIndex,
}

impl Shelves {
    fn put(&mut self, draft: NewEntry) -> Result<EntryId> {
        let id = self.store.put(draft)?;
        let (current, previous) = match self.store.history(id)? {
            [.., previous, current] => (current, Some(previous)),
            [current] => (current, None),
            [] => return Err(Error::not_found(format!("entry {id}"))),
        };
        self.index.record(current, previous);
        Ok(id)
    }
}

pub struct Library {
    inner: RwLock<Shelves>,
}

/// Outcome of [`Library::ingest`].
#[derive(Debug, Default)]
pub struct IngestReport {
    pub added: Vec<EntryId>,
    pub revised: Vec<EntryId>,
    pub unchanged: Vec<EntryId>,
    pub malformed: Vec<MalformedRecord>,
}

impl IngestReport {
    pub fn written(&self) -> usize {
        self.added.len() + self.revised.len()
    }
}

impl Library {
    pub fn new(store: EntryStore) -> Self {
        let index = TagIndex::build(&store);
        Self { inner: RwLock::new(Shelves { store, index }) }
    }

    pub fn in_memory() -> Self {
        Self::new(EntryStore::in_memory())
    }

    /// Replay the entry log at `path` and index it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(EntryStore::open(path)?))
    }

    pub fn put(&self, draft: NewEntry) -> Result<EntryId> {
        self.inner.write().put(draft)
    }

    pub fn get(&self, id: EntryId) -> Result<Entry> {
        self.inner.read().store.get(id).cloned()
    }

    pub fn history(&self, id: EntryId) -> Result<Vec<Entry>> {
        self.inner.read().store.history(id).map(<[Entry]>::to_vec)
    }

    pub fn list(&self, topic: Option<&Tag>) -> Vec<Entry> {
        self.inner.read().store.list(topic).into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().store.is_empty()
    }

    pub fn lookup(&self, tag: &Tag) -> Vec<EntryId> {
        self.inner.read().index.lookup(tag).into_iter().collect()
    }

    pub fn search(&self, query: &Query) -> Vec<Entry> {
        let guard = self.inner.read();
        QueryEngine::new(&guard.store, &guard.index).search(query).into_iter().cloned().collect()
    }

    /// Like [`Library::search`], with each result's relevance.
    pub fn search_scored<F, T>(&self, query: &Query, each: F) -> Vec<T>
    where
        F: FnMut(SearchHit<'_>) -> T,
    {
        let guard = self.inner.read();
        QueryEngine::new(&guard.store, &guard.index)
            .search_scored(query)
            .into_iter()
            .map(each)
            .collect()
    }

    pub fn tag_counts(&self) -> Vec<(Tag, usize)> {
        self.inner.read().index.tag_counts()
    }

    /// Drop the live index and rebuild it from the store.
    pub fn rebuild_index(&self) {
        let mut guard = self.inner.write();
        let shelves = &mut *guard;
        shelves.index.rebuild(&shelves.store);
    }

    /// Compare the live index against one rebuilt from the store.
    pub fn verify_index(&self) -> Result<()> {
        let guard = self.inner.read();
        let fresh = TagIndex::build(&guard.store);
        let mismatched = guard.index.mismatched_tags(&fresh);
        if mismatched.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = mismatched.iter().map(Tag::to_string).collect();
        Err(Error::IndexMismatch(names.join(", ")))
    }

    /// Record every draft of `batch`, skipping malformed records.
    ///
    /// A draft whose topic and question match an existing entry becomes a new
    /// version of it, or is left alone when nothing changed.
    pub fn ingest(&self, batch: ParsedBatch) -> Result<IngestReport> {
        let mut report = IngestReport { malformed: batch.malformed, ..IngestReport::default() };
        for bad in &report.malformed {
            tracing::warn!(%bad, "skipping malformed record");
        }

        let mut shelves = self.inner.write();
        for draft in batch.entries {
            let existing = shelves
                .store
                .find(&draft.topic, &draft.question)
                .and_then(|id| shelves.store.get(id).ok())
                .map(|current| (current.id, current.same_content(&draft)));
            match existing {
                Some((id, true)) => report.unchanged.push(id),
                Some((id, false)) => {
                    shelves.put(draft.revising(id))?;
                    report.revised.push(id);
                }
                None => report.added.push(shelves.put(draft)?),
            }
        }
        drop(shelves);

        tracing::info!(
            added = report.added.len(),
            revised = report.revised.len(),
            unchanged = report.unchanged.len(),
            malformed = report.malformed.len(),
            "ingest complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Tag {
        Tag::parse(s).unwrap()
    }

    #[test]
    fn put_keeps_index_in_step() {
        let library = Library::in_memory();
        let id = library.put(NewEntry::new(tag("sql-joins"), "Inner vs outer join?", "Outer keeps unmatched rows.")).unwrap();
        assert_eq!(library.lookup(&tag("sql-joins")), vec![id]);

        library
            .put(NewEntry::new(tag("sql"), "Inner vs outer join?", "Outer keeps unmatched rows.").revising(id))
            .unwrap();
        assert!(library.lookup(&tag("sql-joins")).is_empty());
        assert_eq!(library.lookup(&tag("sql")), vec![id]);
        library.verify_index().unwrap();
    }

    #[test]
    fn search_empty_library_is_empty_not_error() {
        let library = Library::in_memory();
        assert!(library.is_empty());
        assert!(library.search(&Query::all()).is_empty());
    }

    #[test]
    fn get_unknown_is_not_found() {
        let library = Library::in_memory();
        assert!(matches!(library.get(EntryId::FIRST), Err(Error::NotFound(_))));
    }
}
