use std::collections::{BTreeMap, BTreeSet};

use qabank_core::traits::{EntrySource, TagLookup};
use qabank_core::types::{Entry, EntryId, Tag};

/// Inverted index from tag to the ids of entries currently carrying it.
///
/// Holds ids only; the store stays authoritative and the index can be thrown
/// away and rebuilt from it at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
	postings: BTreeMap<Tag, BTreeSet<EntryId>>,
}

impl TagIndex {
	pub fn new() -> Self { Self::default() }

	pub fn build<S: EntrySource + ?Sized>(source: &S) -> Self {
		let mut index = Self::new();
		index.rebuild(source);
		index
	}

	/// Clear and repopulate from the current entries of `source`.
	pub fn rebuild<S: EntrySource + ?Sized>(&mut self, source: &S) {
		self.postings.clear();
		for entry in source.current_entries() {
			self.insert(entry);
		}
		tracing::debug!(tags = self.postings.len(), entries = source.entry_count(), "tag index rebuilt");
	}

	/// Apply one store write: `entry` is the newly recorded version and
	/// `previous` the version it replaced, if any.
	pub fn record(&mut self, entry: &Entry, previous: Option<&Entry>) {
		if let Some(previous) = previous {
			for tag in previous.tags.difference(&entry.tags) {
				let drained = match self.postings.get_mut(tag) {
					Some(ids) => { ids.remove(&previous.id); ids.is_empty() }
					None => false,
				};
				if drained { self.postings.remove(tag); }
			}
		}
		self.insert(entry);
	}

	fn insert(&mut self, entry: &Entry) {
		for tag in &entry.tags {
			self.postings.entry(tag.clone()).or_default().insert(entry.id);
		}
	}

	pub fn lookup(&self, tag: &Tag) -> BTreeSet<EntryId> {
		self.postings.get(tag).cloned().unwrap_or_default()
	}

	/// Every tag with the number of entries carrying it, in tag order.
	pub fn tag_counts(&self) -> Vec<(Tag, usize)> {
		self.postings.iter().map(|(tag, ids)| (tag.clone(), ids.len())).collect()
	}

	/// Tags whose postings differ between `self` and `expected`.
	pub fn mismatched_tags(&self, expected: &TagIndex) -> Vec<Tag> {
		let tags: BTreeSet<&Tag> = self.postings.keys().chain(expected.postings.keys()).collect();
		tags.into_iter().filter(|t| self.postings.get(*t) != expected.postings.get(*t)).cloned().collect()
	}
}

impl TagLookup for TagIndex {
	fn lookup(&self, tag: &Tag) -> BTreeSet<EntryId> { TagIndex::lookup(self, tag) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use qabank_core::types::NewEntry;
	use qabank_core::EntryStore;

	fn tag(s: &str) -> Tag { Tag::parse(s).unwrap() }

	fn ids(set: BTreeSet<EntryId>) -> Vec<u64> { set.into_iter().map(EntryId::get).collect() }

	#[test]
	fn lookup_unknown_tag_is_empty() {
		let index = TagIndex::new();
		assert!(index.lookup(&tag("nothing")).is_empty());
	}

	#[test]
	fn record_tracks_retagging() {
		let mut store = EntryStore::in_memory();
		let mut index = TagIndex::new();

		let id = store.put(NewEntry::new(tag("linq"), "Select vs Where?", "Projection vs filter.").with_tag(tag("csharp"))).unwrap();
		index.record(store.get(id).unwrap(), None);
		assert_eq!(ids(index.lookup(&tag("csharp"))), vec![1]);

		store.put(NewEntry::new(tag("linq"), "Select vs Where?", "Projection vs filter.").with_tag(tag("dotnet")).revising(id)).unwrap();
		let history = store.history(id).unwrap();
		index.record(&history[1], Some(&history[0]));

		assert!(index.lookup(&tag("csharp")).is_empty());
		assert_eq!(ids(index.lookup(&tag("dotnet"))), vec![1]);
		assert_eq!(ids(index.lookup(&tag("linq"))), vec![1]);
		assert_eq!(index, TagIndex::build(&store));
	}

	#[test]
	fn rebuild_is_idempotent_and_counts_tags() {
		let mut store = EntryStore::in_memory();
		store.put(NewEntry::new(tag("sql-joins"), "q1", "a").with_tag(tag("sql"))).unwrap();
		store.put(NewEntry::new(tag("sql-indexes"), "q2", "a").with_tag(tag("sql"))).unwrap();
		store.put(NewEntry::new(tag("angular-di"), "q3", "a")).unwrap();

		let mut index = TagIndex::build(&store);
		let before = index.lookup(&tag("sql"));
		index.rebuild(&store);
		assert_eq!(index.lookup(&tag("sql")), before);
		assert_eq!(ids(before), vec![1, 2]);

		let counts: Vec<(String, usize)> = index.tag_counts().into_iter().map(|(t, n)| (t.to_string(), n)).collect();
		assert_eq!(counts, vec![("angular-di".into(), 1), ("sql".into(), 2), ("sql-indexes".into(), 1), ("sql-joins".into(), 1)]);
	}

	#[test]
	fn mismatched_tags_names_the_difference() {
		let mut store = EntryStore::in_memory();
		store.put(NewEntry::new(tag("rxjs"), "q", "a")).unwrap();
		let stale = TagIndex::new();
		let fresh = TagIndex::build(&store);
		assert_eq!(stale.mismatched_tags(&fresh), vec![tag("rxjs")]);
		assert!(fresh.mismatched_tags(&fresh.clone()).is_empty());
	}
}
