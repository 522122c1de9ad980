//! Domain types shared by the store, the tag index and the query engine.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Stable entry identifier. Issued by the store, strictly increasing from 1,
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub const FIRST: EntryId = EntryId(1);

    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .ok()
            .and_then(EntryId::new)
            .ok_or_else(|| Error::InvalidEntry(format!("not an entry id: {s:?}")))
    }
}

/// Lowercase slug used for tags and topics.
///
/// Runs of anything other than ASCII alphanumerics, `#` and `+` collapse into a
/// single `-`; leading and trailing separators are dropped. `"C# Memory"`
/// becomes `"c#-memory"`, `".NET Core"` becomes `"net-core"`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_sep = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '#' || ch == '+' {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// A normalized topical label, e.g. `sql-joins` or `angular-di`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    pub fn parse(label: &str) -> Result<Self, Error> {
        let slug = slugify(label);
        if slug.is_empty() {
            return Err(Error::InvalidTag(label.to_string()));
        }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::parse(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Tag::parse(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

/// Illustrative code attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub code: String,
}

impl CodeSample {
    pub fn new(language: Option<&str>, code: impl Into<String>) -> Self {
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_lowercase);
        Self { language, code: code.into() }
    }
}

/// One recorded version of a question/answer entry.
///
/// - `id`: stable identity shared by every version of the entry
/// - `version`: 1 for the first recording, incremented on every edit
/// - `topic`: primary tag; always contained in `tags`
/// - `recorded_at`: when this version was written to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub version: u32,
    pub topic: Tag,
    pub tags: BTreeSet<Tag>,
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_sample: Option<CodeSample>,
    pub recorded_at: DateTime<Utc>,
}

impl Entry {
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// True when `draft` would record exactly this content again.
    pub fn same_content(&self, draft: &NewEntry) -> bool {
        self.topic == draft.topic
            && self.tags == draft.all_tags()
            && self.question == draft.question
            && self.answer == draft.answer
            && self.code_sample == draft.code_sample
    }
}

/// Caller-supplied content for `EntryStore::put`.
///
/// Leave `id` empty to create a new entry; set it (see [`NewEntry::revising`])
/// to record a new version of an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub id: Option<EntryId>,
    pub topic: Tag,
    pub tags: BTreeSet<Tag>,
    pub question: String,
    pub answer: String,
    pub code_sample: Option<CodeSample>,
}

impl NewEntry {
    pub fn new(topic: Tag, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: None,
            topic,
            tags: BTreeSet::new(),
            question: question.into(),
            answer: answer.into(),
            code_sample: None,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn with_code_sample(mut self, sample: CodeSample) -> Self {
        self.code_sample = Some(sample);
        self
    }

    pub fn revising(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Extra tags plus the topic.
    pub fn all_tags(&self) -> BTreeSet<Tag> {
        let mut tags = self.tags.clone();
        tags.insert(self.topic.clone());
        tags
    }
}

/// How well an entry matched a query. Higher is better; compares
/// `tag_matches`, then `phrase_hits`, then `term_hits`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relevance {
    pub tag_matches: usize,
    pub phrase_hits: usize,
    pub term_hits: usize,
}

impl Relevance {
    pub fn is_match(&self) -> bool {
        self.tag_matches + self.phrase_hits + self.term_hits > 0
    }
}

impl Ord for Relevance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tag_matches
            .cmp(&other.tag_matches)
            .then(self.phrase_hits.cmp(&other.phrase_hits))
            .then(self.term_hits.cmp(&other.term_hits))
    }
}

impl PartialOrd for Relevance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A ranked search result borrowing the entry from the store.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub entry: &'a Entry,
    pub relevance: Relevance,
}
