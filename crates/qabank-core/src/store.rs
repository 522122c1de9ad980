//! Append-only entry store.
//!
//! Every `put` records a new immutable [`Entry`] version. The newest version
//! of an id is its current one; older versions stay reachable through
//! [`EntryStore::history`]. A store opened on a path mirrors each version as
//! one JSON line in an append-only log and replays that log on open.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::traits::EntrySource;
use crate::types::{Entry, EntryId, NewEntry, Tag};

#[derive(Debug)]
pub struct EntryStore {
    versions: BTreeMap<EntryId, Vec<Entry>>,
    next_id: EntryId,
    log_path: Option<PathBuf>,
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl EntryStore {
    /// A store that lives only as long as the value.
    pub fn in_memory() -> Self {
        Self { versions: BTreeMap::new(), next_id: EntryId::FIRST, log_path: None }
    }

    /// Open (or lazily create) the log at `path` and replay it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut store = Self { log_path: Some(path.to_path_buf()), ..Self::in_memory() };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no entry log yet, starting empty");
            return Ok(store);
        }

        let reader = BufReader::new(File::open(path)?);
        let mut recorded = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: Entry = serde_json::from_str(&line)
                .map_err(|e| Error::corrupt_log(index + 1, e.to_string()))?;
            store.replay(entry).map_err(|reason| Error::corrupt_log(index + 1, reason))?;
            recorded += 1;
        }
        tracing::info!(
            path = %path.display(),
            entries = store.len(),
            versions = recorded,
            "entry log replayed"
        );
        Ok(store)
    }

    fn replay(&mut self, entry: Entry) -> std::result::Result<(), String> {
        if !entry.tags.contains(&entry.topic) {
            return Err(format!("entry {} is missing its topic tag {}", entry.id, entry.topic));
        }
        match self.versions.get_mut(&entry.id) {
            Some(history) => {
                let last = history.last().map_or(0, |e| e.version);
                if entry.version != last + 1 {
                    return Err(format!(
                        "entry {} jumps from version {} to {}",
                        entry.id, last, entry.version
                    ));
                }
                history.push(entry);
            }
            None => {
                if entry.id < self.next_id {
                    return Err(format!("entry id {} was already issued", entry.id));
                }
                if entry.version != 1 {
                    return Err(format!(
                        "entry {} starts at version {} instead of 1",
                        entry.id, entry.version
                    ));
                }
                self.next_id = entry.id.next();
                self.versions.insert(entry.id, vec![entry]);
            }
        }
        Ok(())
    }

    /// Record `draft` and return its id.
    ///
    /// Without an id a fresh one is issued. With an id of an existing entry a
    /// new version is appended; the previous one stays in history. An id the
    /// store never issued is `NotFound`.
    pub fn put(&mut self, draft: NewEntry) -> Result<EntryId> {
        if draft.question.trim().is_empty() {
            return Err(Error::InvalidEntry("question is empty".into()));
        }
        if draft.answer.trim().is_empty() {
            return Err(Error::InvalidEntry("answer is empty".into()));
        }

        let (id, version) = match draft.id {
            Some(id) => {
                let current = self.get(id)?;
                (id, current.version + 1)
            }
            None => (self.next_id, 1),
        };
        let tags = draft.all_tags();
        let entry = Entry {
            id,
            version,
            topic: draft.topic,
            tags,
            question: draft.question,
            answer: draft.answer,
            code_sample: draft.code_sample,
            recorded_at: Utc::now(),
        };

        if let Some(path) = &self.log_path {
            append_line(path, &entry)?;
        }

        tracing::debug!(%id, version, topic = %entry.topic, "entry recorded");
        if version == 1 {
            self.next_id = id.next();
        }
        self.versions.entry(id).or_default().push(entry);
        Ok(id)
    }

    /// Current version of `id`.
    pub fn get(&self, id: EntryId) -> Result<&Entry> {
        self.versions
            .get(&id)
            .and_then(|history| history.last())
            .ok_or_else(|| Error::not_found(format!("entry {id}")))
    }

    pub fn get_version(&self, id: EntryId, version: u32) -> Result<&Entry> {
        self.history(id)?
            .iter()
            .find(|e| e.version == version)
            .ok_or_else(|| Error::not_found(format!("entry {id} version {version}")))
    }

    /// Every recorded version of `id`, oldest first.
    pub fn history(&self, id: EntryId) -> Result<&[Entry]> {
        self.versions
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::not_found(format!("entry {id}")))
    }

    /// Current versions in id order, optionally only those whose topic is `topic`.
    pub fn list(&self, topic: Option<&Tag>) -> Vec<&Entry> {
        self.current()
            .filter(|e| topic.map_or(true, |t| &e.topic == t))
            .collect()
    }

    /// Id of the current entry with this topic and question, comparing
    /// questions case- and whitespace-insensitively.
    pub fn find(&self, topic: &Tag, question: &str) -> Option<EntryId> {
        let wanted = normalize_question(question);
        self.current()
            .find(|e| &e.topic == topic && normalize_question(&e.question) == wanted)
            .map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn current(&self) -> impl Iterator<Item = &Entry> {
        self.versions.values().filter_map(|history| history.last())
    }
}

impl EntrySource for EntryStore {
    fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.get(id).ok()
    }

    fn current_entries(&self) -> Box<dyn Iterator<Item = &Entry> + '_> {
        Box::new(self.current())
    }

    fn entry_count(&self) -> usize {
        self.len()
    }
}

fn append_line(path: &Path, entry: &Entry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
}

fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
