//! Turns note files into [`NewEntry`] drafts.
//!
//! Two formats are understood:
//!
//! - `.qa` record files: `---`-separated blocks of `topic:`, `tags:`,
//!   `question:` and `answer:` fields with an optional fenced code sample.
//! - `.md` study notes: headings set the topic, numbered `**Q:**` items and
//!   numbered or `?`-terminated headings start questions, and the prose that
//!   follows is the answer.
//!
//! Records that break the schema become [`MalformedRecord`]s; the rest of the
//! input is still parsed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, MalformedRecord, Result};
use crate::types::{CodeSample, NewEntry, Tag};

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(topic|tags|question|answer)\s*:\s?(.*)$").expect("field regex must compile")
});
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("heading regex must compile"));
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.\s+(.+)$").expect("numbered regex must compile"));
static Q_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+\.\s+\*\*Q:\s*(.*)$").expect("question item regex must compile")
});
static ANSWER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*\*)?(?:A|Answer):(?:\*\*)?\s*").expect("answer prefix regex must compile")
});

/// Drafts and schema violations parsed from one or more inputs.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub entries: Vec<NewEntry>,
    pub malformed: Vec<MalformedRecord>,
}

impl ParsedBatch {
    pub fn merge(&mut self, other: ParsedBatch) {
        self.entries.extend(other.entries);
        self.malformed.extend(other.malformed);
    }

    /// Fail on the first malformed record instead of skipping it.
    pub fn into_strict(self) -> Result<Vec<NewEntry>> {
        match self.malformed.into_iter().next() {
            Some(record) => Err(Error::MalformedRecord(record)),
            None => Ok(self.entries),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteFormat {
    Records,
    Markdown,
}

impl NoteFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("qa") => Some(Self::Records),
            Some("md" | "markdown") => Some(Self::Markdown),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct Loader;

impl Loader {
    pub fn new() -> Self {
        Self
    }

    /// Load a single note file, or every `.qa`/`.md` file under a directory
    /// in path order.
    pub fn load_path(&self, path: &Path) -> Result<ParsedBatch> {
        if !path.exists() {
            return Err(Error::not_found(path.display()));
        }
        if path.is_file() {
            // An explicitly named file without a known extension is read as records.
            let format = NoteFormat::from_path(path).unwrap_or(NoteFormat::Records);
            return self.load_file(path, format);
        }

        let files = self.list_note_files(path);
        if files.is_empty() {
            tracing::warn!(dir = %path.display(), "no .qa or .md files found");
            return Ok(ParsedBatch::default());
        }
        let mut batch = ParsedBatch::default();
        for (file_index, (file_path, format)) in files.iter().enumerate() {
            tracing::info!(
                "Processing file {}/{}: {}",
                file_index + 1,
                files.len(),
                file_path.display()
            );
            batch.merge(self.load_file(file_path, *format)?);
        }
        tracing::info!(
            files = files.len(),
            entries = batch.entries.len(),
            malformed = batch.malformed.len(),
            "notes loaded"
        );
        Ok(batch)
    }

    fn load_file(&self, path: &Path, format: NoteFormat) -> Result<ParsedBatch> {
        let content = read_file_content(path)?;
        let source = path.display().to_string();
        Ok(match format {
            NoteFormat::Records => self.parse_records(&source, &content),
            NoteFormat::Markdown => {
                let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
                self.parse_markdown(&source, &stem, &content)
            }
        })
    }

    /// Parse `---`-separated record blocks.
    pub fn parse_records(&self, source: &str, text: &str) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        let mut block: Vec<(usize, &str)> = Vec::new();
        let mut in_fence = false;
        let mut record_no = 0;

        let mut flush = |block: &mut Vec<(usize, &str)>, batch: &mut ParsedBatch| {
            if block.iter().all(|(_, l)| l.trim().is_empty()) {
                block.clear();
                return;
            }
            record_no += 1;
            match parse_record_block(source, record_no, block) {
                Ok(entry) => batch.entries.push(entry),
                Err(bad) => batch.malformed.push(bad),
            }
            block.clear();
        };

        for (index, line) in text.lines().enumerate() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
            }
            if !in_fence && line.trim() == "---" {
                flush(&mut block, &mut batch);
                continue;
            }
            block.push((index + 1, line));
        }
        flush(&mut block, &mut batch);
        batch
    }

    /// Parse markdown study notes. `file_topic` names the file; it becomes an
    /// extra tag on every entry and the topic until a heading sets one.
    pub fn parse_markdown(&self, source: &str, file_topic: &str, text: &str) -> ParsedBatch {
        let mut notes = MarkdownNotes::new(source, file_topic);
        for (index, line) in text.lines().enumerate() {
            notes.feed(index + 1, line);
        }
        notes.finish()
    }

    fn list_note_files(&self, root: &Path) -> Vec<(PathBuf, NoteFormat)> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Some(format) = NoteFormat::from_path(entry.path()) {
                files.push((entry.path().to_path_buf(), format));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

#[derive(Default)]
struct RecordFields {
    topic: Option<String>,
    tags: Option<String>,
    question: Option<String>,
    answer: Option<String>,
}

impl RecordFields {
    fn slot(&mut self, key: &str) -> &mut Option<String> {
        match key {
            "topic" => &mut self.topic,
            "tags" => &mut self.tags,
            "question" => &mut self.question,
            _ => &mut self.answer,
        }
    }
}

fn parse_record_block(
    source: &str,
    record: usize,
    block: &[(usize, &str)],
) -> std::result::Result<NewEntry, MalformedRecord> {
    let start_line = block
        .iter()
        .find(|(_, l)| !l.trim().is_empty())
        .map_or(0, |(n, _)| *n);
    let malformed = |reason: String| MalformedRecord {
        source: source.to_string(),
        record,
        line: start_line,
        reason,
    };

    let mut fields = RecordFields::default();
    let mut current: Option<String> = None;
    let mut code: Option<CodeSample> = None;
    let mut fence: Option<(Option<String>, Vec<&str>)> = None;

    for &(line_no, line) in block {
        if let Some((lang, body)) = fence.as_mut() {
            if line.trim_start().starts_with("```") {
                let sample = CodeSample::new(lang.as_deref(), body.join("\n"));
                fence = None;
                if code.is_none() {
                    code = Some(sample);
                } else if let Some(key) = &current {
                    let slot = fields.slot(key).get_or_insert_with(String::new);
                    slot.push_str(&format!(
                        "\n```{}\n{}\n```",
                        sample.language.unwrap_or_default(),
                        sample.code
                    ));
                }
            } else {
                body.push(line);
            }
            continue;
        }

        let trimmed = line.trim_start();
        if let Some(info) = trimmed.strip_prefix("```") {
            let lang = Some(info.trim().to_string()).filter(|l| !l.is_empty());
            fence = Some((lang, Vec::new()));
            continue;
        }

        if let Some(caps) = FIELD_LINE.captures(line) {
            let key = caps[1].to_lowercase();
            let slot = fields.slot(&key);
            if slot.is_some() {
                return Err(malformed(format!("duplicate field `{key}` on line {line_no}")));
            }
            *slot = Some(caps[2].to_string());
            current = Some(key);
            continue;
        }

        match &current {
            Some(key) => {
                let slot = fields.slot(key).get_or_insert_with(String::new);
                slot.push('\n');
                slot.push_str(line);
            }
            None if line.trim().is_empty() || trimmed.starts_with('#') => {}
            None => {
                return Err(malformed(format!("text outside any field on line {line_no}")));
            }
        }
    }

    if fence.is_some() {
        return Err(malformed("unterminated code fence".into()));
    }

    let required = |value: Option<String>, name: &str| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| malformed(format!("missing field `{name}`")))
    };
    let topic_label = required(fields.topic, "topic")?;
    let question = required(fields.question, "question")?;
    let answer = required(fields.answer, "answer")?;
    let topic = Tag::parse(&topic_label).map_err(|e| malformed(e.to_string()))?;

    let mut entry = NewEntry::new(topic, question, answer);
    for label in fields.tags.iter().flat_map(|t| t.split(',')) {
        if label.trim().is_empty() {
            continue;
        }
        let tag = Tag::parse(label).map_err(|e| malformed(e.to_string()))?;
        entry = entry.with_tag(tag);
    }
    if let Some(sample) = code {
        entry = entry.with_code_sample(sample);
    }
    Ok(entry)
}

struct PendingQuestion {
    line: usize,
    question: String,
    body: Vec<String>,
    code: Option<CodeSample>,
}

struct OpenFence {
    line: usize,
    indent: usize,
    lang: Option<String>,
    body: Vec<String>,
}

struct MarkdownNotes<'a> {
    source: &'a str,
    file_tag: Option<Tag>,
    topic: Option<Tag>,
    pending: Option<PendingQuestion>,
    fence: Option<OpenFence>,
    record_no: usize,
    batch: ParsedBatch,
}

impl<'a> MarkdownNotes<'a> {
    fn new(source: &'a str, file_topic: &str) -> Self {
        let file_tag = Tag::parse(file_topic).ok();
        Self {
            source,
            topic: file_tag.clone(),
            file_tag,
            pending: None,
            fence: None,
            record_no: 0,
            batch: ParsedBatch::default(),
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();

        if let Some(fence) = self.fence.as_mut() {
            if trimmed.starts_with("```") {
                let sample = CodeSample::new(fence.lang.as_deref(), fence.body.join("\n"));
                self.fence = None;
                self.attach_code(sample);
                return;
            }
            // A fence opened inside a list item ends with the item.
            if indent_of(line) >= fence.indent || !ends_list_item(line) {
                fence.body.push(line.to_string());
                return;
            }
            let fence_line = fence.line;
            self.fence = None;
            self.unterminated_fence(fence_line);
        }

        if let Some(info) = trimmed.strip_prefix("```") {
            let lang = Some(info.trim().to_string()).filter(|l| !l.is_empty());
            self.fence = Some(OpenFence { line: line_no, indent: indent_of(line), lang, body: Vec::new() });
            return;
        }

        if trimmed == "---" {
            self.finish_pending();
            return;
        }

        if let Some(caps) = Q_ITEM.captures(line) {
            self.finish_pending();
            self.start_question(line_no, &caps[1]);
            return;
        }

        if let Some(caps) = HEADING.captures(trimmed) {
            let level = caps[1].len();
            let text = clean_heading(&caps[2]);
            if let Some(numbered) = NUMBERED.captures(&text) {
                self.finish_pending();
                self.start_question(line_no, &numbered[2]);
            } else if text.ends_with('?') {
                self.finish_pending();
                self.start_question(line_no, &text);
            } else if text.ends_with(':') {
                // `### ❌ Bad:` style labels belong to the surrounding answer.
                if let Some(pending) = self.pending.as_mut() {
                    pending.body.push(text);
                }
            } else if level <= 3 {
                self.finish_pending();
                if let Ok(topic) = Tag::parse(&text) {
                    self.topic = Some(topic);
                }
            } else if let Some(pending) = self.pending.as_mut() {
                pending.body.push(text);
            }
            return;
        }

        if let Some(pending) = self.pending.as_mut() {
            pending.body.push(ANSWER_PREFIX.replace(trimmed, "").into_owned());
        }
    }

    fn start_question(&mut self, line: usize, raw: &str) {
        let question = raw.replace("**", "").trim().to_string();
        self.pending = Some(PendingQuestion { line, question, body: Vec::new(), code: None });
    }

    fn attach_code(&mut self, sample: CodeSample) {
        let Some(pending) = self.pending.as_mut() else { return };
        if pending.code.is_none() {
            pending.code = Some(sample);
        } else {
            pending.body.extend(sample.code.lines().map(str::to_string));
        }
    }

    /// The open fence never closed: whatever question owns it is dropped
    /// and reported at the fence line.
    fn unterminated_fence(&mut self, fence_line: usize) {
        let question = self.pending.take().map(|p| p.question);
        self.record_no += 1;
        let record = MalformedRecord {
            source: self.source.to_string(),
            record: self.record_no,
            line: fence_line,
            reason: "unterminated code fence".to_string(),
        };
        tracing::warn!(question = question.as_deref().unwrap_or(""), "{record}");
        self.batch.malformed.push(record);
    }

    fn finish_pending(&mut self) {
        let Some(pending) = self.pending.take() else { return };
        self.record_no += 1;
        let (source, record, line) = (self.source, self.record_no, pending.line);
        let malformed = |reason: &str| MalformedRecord {
            source: source.to_string(),
            record,
            line,
            reason: reason.to_string(),
        };

        let Some(topic) = self.topic.clone() else {
            self.batch.malformed.push(malformed("no topic heading and no usable file name"));
            return;
        };
        if pending.question.trim().is_empty() {
            self.batch.malformed.push(malformed("empty question"));
            return;
        }
        let mut answer = collapse_blank_lines(&pending.body);
        if answer.is_empty() {
            match &pending.code {
                Some(sample) => answer = sample.code.trim().to_string(),
                None => {
                    self.batch.malformed.push(malformed("question has no answer"));
                    return;
                }
            }
        }

        let mut entry = NewEntry::new(topic, pending.question, answer);
        if let Some(file_tag) = &self.file_tag {
            entry = entry.with_tag(file_tag.clone());
        }
        if let Some(sample) = pending.code {
            entry = entry.with_code_sample(sample);
        }
        self.batch.entries.push(entry);
    }

    fn finish(mut self) -> ParsedBatch {
        if let Some(fence) = self.fence.take() {
            self.unterminated_fence(fence.line);
        }
        self.finish_pending();
        self.batch
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn ends_list_item(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == "---" || Q_ITEM.is_match(line) || HEADING.is_match(trimmed)
}

/// Strip emphasis markers and leading decoration (emoji, bullets) from a heading.
fn clean_heading(raw: &str) -> String {
    raw.replace("**", "")
        .trim()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim()
        .to_string()
}

fn collapse_blank_lines(lines: &[String]) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in lines.iter().map(|l| l.trim()) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
