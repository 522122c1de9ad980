use std::collections::BTreeSet;

use qabank_core::traits::{EntrySource, TagLookup};
use qabank_core::types::{Entry, Relevance, SearchHit, Tag};

use crate::text_utils::{count_occurrences, normalize, terms};

/// A free-text and/or tag-filtered lookup. The default query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
	pub text: Option<String>,
	pub tags: Vec<Tag>,
	pub limit: Option<usize>,
}

impl Query {
	pub fn all() -> Self { Self::default() }

	pub fn text(text: impl Into<String>) -> Self {
		Self { text: Some(text.into()), ..Self::default() }
	}

	pub fn tagged(tag: Tag) -> Self {
		Self { tags: vec![tag], ..Self::default() }
	}

	pub fn with_text(mut self, text: impl Into<String>) -> Self { self.text = Some(text.into()); self }

	pub fn with_tag(mut self, tag: Tag) -> Self { self.tags.push(tag); self }

	pub fn with_limit(mut self, limit: usize) -> Self { self.limit = Some(limit); self }

	/// Lowercased, whitespace-collapsed text; `None` when blank.
	fn normalized_text(&self) -> Option<String> {
		self.text.as_deref().map(normalize).filter(|t| !t.is_empty())
	}
}

/// Read-only ranked search over a store, narrowed through a tag lookup.
///
/// Ranking: tag matches, then whole-phrase hits, then term hits (all
/// descending), then id ascending. A text whose slug equals one of an
/// entry's tags counts as a tag match.
pub struct QueryEngine<'a, S: EntrySource + ?Sized, L: TagLookup + ?Sized> {
	source: &'a S,
	tags: &'a L,
}

impl<'a, S: EntrySource + ?Sized, L: TagLookup + ?Sized> QueryEngine<'a, S, L> {
	pub fn new(source: &'a S, tags: &'a L) -> Self { Self { source, tags } }

	pub fn search(&self, query: &Query) -> Vec<&'a Entry> {
		self.search_scored(query).into_iter().map(|hit| hit.entry).collect()
	}

	pub fn search_scored(&self, query: &Query) -> Vec<SearchHit<'a>> {
		let wanted: BTreeSet<&Tag> = query.tags.iter().collect();
		let text = query.normalized_text();
		let text_terms = text.as_deref().map(terms).unwrap_or_default();
		let text_tag = text.as_deref().and_then(|t| Tag::parse(t).ok());

		let candidates: Vec<&'a Entry> = if wanted.is_empty() {
			self.source.current_entries().collect()
		} else {
			let mut ids = BTreeSet::new();
			for tag in &wanted { ids.extend(self.tags.lookup(tag)); }
			ids.into_iter().filter_map(|id| self.source.entry(id)).collect()
		};

		let mut hits = Vec::with_capacity(candidates.len());
		for entry in candidates {
			let mut relevance = Relevance {
				tag_matches: wanted.iter().filter(|t| entry.has_tag(t)).count(),
				..Relevance::default()
			};
			if !wanted.is_empty() && relevance.tag_matches == 0 { continue; }

			if let Some(phrase) = text.as_deref() {
				// Fields are matched separately so a phrase never spans question and answer.
				let fields = [normalize(&entry.question), normalize(&entry.answer)];
				for field in &fields {
					relevance.phrase_hits += count_occurrences(field, phrase);
					relevance.term_hits += text_terms.iter().map(|t| count_occurrences(field, t)).sum::<usize>();
				}
				let tag_hit = text_tag.as_ref().is_some_and(|t| entry.has_tag(t));
				if tag_hit { relevance.tag_matches += 1; }
				if relevance.phrase_hits == 0 && relevance.term_hits == 0 && !tag_hit { continue; }
			}
			hits.push(SearchHit { entry, relevance });
		}

		hits.sort_by(|a, b| b.relevance.cmp(&a.relevance).then(a.entry.id.cmp(&b.entry.id)));
		if let Some(limit) = query.limit { hits.truncate(limit); }
		tracing::debug!(hits = hits.len(), text = ?text, tags = wanted.len(), "search finished");
		hits
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TagIndex;
	use qabank_core::types::NewEntry;
	use qabank_core::EntryStore;

	fn tag(s: &str) -> Tag { Tag::parse(s).unwrap() }

	fn fixture() -> EntryStore {
		let mut store = EntryStore::in_memory();
		store.put(NewEntry::new(tag("angular-di"), "How do you inject a service?", "Through the constructor.")).unwrap();
		store.put(NewEntry::new(tag("sql-joins"), "Employees earning more than their manager?", "Self-join on ManagerId and compare salary.")).unwrap();
		store.put(NewEntry::new(tag("sql-queries"), "Write a query to get the second highest salary.", "Use MAX below MAX; the second highest salary is then returned.").with_tag(tag("sql"))).unwrap();
		store.put(NewEntry::new(tag("csharp"), "What does salary have to do with C#?", "Nothing, but salary salary salary.")).unwrap();
		store
	}

	fn ids(entries: &[&Entry]) -> Vec<u64> { entries.iter().map(|e| e.id.get()).collect() }

	#[test]
	fn no_filters_returns_everything_in_id_order() {
		let store = fixture();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		assert_eq!(ids(&engine.search(&Query::all())), vec![1, 2, 3, 4]);
		assert_eq!(ids(&engine.search(&Query::text("   "))), vec![1, 2, 3, 4]);
	}

	#[test]
	fn tag_filter_excludes_other_tags() {
		let store = fixture();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		assert_eq!(ids(&engine.search(&Query::tagged(tag("sql-joins")))), vec![2]);
		assert!(engine.search(&Query::tagged(tag("unknown"))).is_empty());
	}

	#[test]
	fn multiple_tags_rank_by_match_count() {
		let store = fixture();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		let query = Query::tagged(tag("sql")).with_tag(tag("sql-joins")).with_tag(tag("sql-queries"));
		assert_eq!(ids(&engine.search(&query)), vec![3, 2]);
	}

	#[test]
	fn phrase_hits_outrank_scattered_terms() {
		let store = fixture();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		let hits = engine.search_scored(&Query::text("Second Highest   Salary"));
		assert_eq!(hits[0].entry.id.get(), 3);
		assert_eq!(hits[0].relevance.phrase_hits, 2);
		let order: Vec<u64> = hits.iter().map(|h| h.entry.id.get()).collect();
		assert_eq!(order, vec![3, 4, 2]);
	}

	#[test]
	fn phrase_does_not_span_question_and_answer() {
		let mut store = EntryStore::in_memory();
		store.put(NewEntry::new(tag("sql"), "What is the second", "highest salary rule?")).unwrap();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		let hits = engine.search_scored(&Query::text("second highest"));
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].relevance.phrase_hits, 0);
		assert_eq!(hits[0].relevance.term_hits, 2);
	}

	#[test]
	fn text_equal_to_tag_counts_as_tag_match() {
		let store = fixture();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		let hits = engine.search_scored(&Query::text("csharp"));
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].relevance.tag_matches, 1);
	}

	#[test]
	fn text_and_tags_must_both_match() {
		let store = fixture();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		let query = Query::text("salary").with_tag(tag("sql-joins"));
		assert_eq!(ids(&engine.search(&query)), vec![2]);
		assert!(engine.search(&Query::text("constructor").with_tag(tag("sql-joins"))).is_empty());
	}

	#[test]
	fn limit_truncates_after_ranking() {
		let store = fixture();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		assert_eq!(ids(&engine.search(&Query::text("salary").with_limit(1))), vec![4]);
	}

	#[test]
	fn empty_store_yields_nothing() {
		let store = EntryStore::in_memory();
		let index = TagIndex::build(&store);
		let engine = QueryEngine::new(&store, &index);
		assert!(engine.search(&Query::all()).is_empty());
		assert!(engine.search(&Query::text("anything")).is_empty());
	}
}
