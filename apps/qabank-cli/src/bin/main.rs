//! `qabank` command line: ingest notes, then search, browse and verify them.
//!
//! Results go to stdout one per line; logs go to stderr. Any failure,
//! including searching an empty or unreadable store, exits with status 1.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qabank_core::config::Config;
use qabank_core::loader::{Loader, ParsedBatch};
use qabank_core::types::{Entry, EntryId, Tag};
use qabank_core::Error;
use qabank_library::Library;
use qabank_text::Query;

#[derive(Parser)]
#[command(name = "qabank")]
#[command(about = "Topic-tagged interview Q&A knowledge base")]
#[command(version)]
struct Cli {
    /// Entry log to use instead of the configured data.store_path
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load .qa record files and .md notes (files or directories)
    Ingest {
        /// Defaults to the configured data.notes_dir
        paths: Vec<PathBuf>,
        /// Abort on the first malformed record instead of skipping it
        #[arg(long)]
        strict: bool,
    },
    /// Ranked search by free text and/or tags
    Search {
        #[arg(long)]
        text: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Append the relevance triple (tags/phrase/terms) to each line
        #[arg(long)]
        scores: bool,
    },
    /// Show one entry
    Get {
        id: EntryId,
        /// Show every recorded version, oldest first
        #[arg(long)]
        history: bool,
    },
    /// List current entries in id order
    List {
        #[arg(long)]
        topic: Option<String>,
    },
    /// Tags with the number of entries carrying them
    Tags,
    /// Check the tag index against the store
    Verify,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "qabank=info,qabank_core=info,qabank_text=info,qabank_library=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().context("loading configuration")?;
    run(cli, &config)
}

fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let store_path = match cli.store {
        Some(path) => path,
        None => config.store_path()?,
    };
    let library = Library::open(&store_path)
        .with_context(|| format!("cannot read store {}", store_path.display()))?;

    match cli.command {
        Command::Ingest { paths, strict } => {
            let paths = if paths.is_empty() { vec![config.notes_dir()?] } else { paths };
            let loader = Loader::new();
            let mut batch = ParsedBatch::default();
            for path in &paths {
                batch.merge(loader.load_path(path).with_context(|| format!("loading {}", path.display()))?);
            }
            if strict {
                batch = ParsedBatch { entries: batch.into_strict()?, malformed: Vec::new() };
            }
            let report = library.ingest(batch)?;
            println!(
                "added {}, revised {}, unchanged {}, malformed {}",
                report.added.len(),
                report.revised.len(),
                report.unchanged.len(),
                report.malformed.len()
            );
            for bad in &report.malformed {
                println!("skipped {bad}");
            }
        }
        Command::Search { text, tags, limit, scores } => {
            if library.is_empty() {
                return Err(Error::EmptyStore)
                    .with_context(|| format!("nothing to search in {}", store_path.display()));
            }
            let mut query = Query { text, limit: limit.or(config.search()?.default_limit), ..Query::default() };
            for label in &tags {
                query = query.with_tag(Tag::parse(label)?);
            }
            let lines = library.search_scored(&query, |hit| {
                let line = summary_line(hit.entry);
                if scores {
                    let r = hit.relevance;
                    format!("{line}\t{}/{}/{}", r.tag_matches, r.phrase_hits, r.term_hits)
                } else {
                    line
                }
            });
            tracing::info!(results = lines.len(), "search done");
            for line in lines {
                println!("{line}");
            }
        }
        Command::Get { id, history } => {
            if history {
                for entry in library.history(id)? {
                    println!("{}", render_entry(&entry));
                }
            } else {
                println!("{}", render_entry(&library.get(id)?));
            }
        }
        Command::List { topic } => {
            let topic = topic.as_deref().map(Tag::parse).transpose()?;
            for entry in library.list(topic.as_ref()) {
                println!("{}", summary_line(&entry));
            }
        }
        Command::Tags => {
            for (tag, count) in library.tag_counts() {
                println!("{tag}\t{count}");
            }
        }
        Command::Verify => {
            library.verify_index()?;
            println!("ok: {} entries, {} tags", library.len(), library.tag_counts().len());
        }
    }
    Ok(())
}

/// `<id>\t<topic>\t<question>` with the question folded onto one line.
fn summary_line(entry: &Entry) -> String {
    format!("{}\t{}\t{}", entry.id, entry.topic, one_line(&entry.question))
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render_entry(entry: &Entry) -> String {
    let tags: Vec<&str> = entry.tags.iter().filter(|t| **t != entry.topic).map(Tag::as_str).collect();
    let mut out = format!(
        "#{} v{} [{}]{} recorded {}\nQ: {}\nA: {}",
        entry.id,
        entry.version,
        entry.topic,
        if tags.is_empty() { String::new() } else { format!(" tags: {}", tags.join(", ")) },
        entry.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"),
        entry.question,
        entry.answer
    );
    if let Some(sample) = &entry.code_sample {
        out.push_str(&format!(
            "\n```{}\n{}\n```",
            sample.language.as_deref().unwrap_or_default(),
            sample.code
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qabank_core::types::NewEntry;

    fn search_in(dir: &std::path::Path, store: &std::path::Path) -> anyhow::Result<()> {
        let config = Config::load_from(dir, "test").unwrap();
        let store = store.to_str().unwrap();
        run(Cli::try_parse_from(["qabank", "--store", store, "search", "--text", "salary"]).unwrap(), &config)
    }

    #[test]
    fn parses_search_flags() {
        let cli = Cli::try_parse_from([
            "qabank", "--store", "x.jsonl", "search", "--text", "second highest salary", "--tag", "sql", "--tag", "sql-joins",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("x.jsonl")));
        match cli.command {
            Command::Search { text, tags, limit, scores } => {
                assert_eq!(text.as_deref(), Some("second highest salary"));
                assert_eq!(tags, vec!["sql", "sql-joins"]);
                assert_eq!(limit, None);
                assert!(!scores);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(Cli::try_parse_from(["qabank", "get", "zero"]).is_err());
        assert!(Cli::try_parse_from(["qabank", "get", "0"]).is_err());
        assert!(Cli::try_parse_from(["qabank", "get", "7", "--history"]).is_ok());
    }

    #[test]
    fn summary_folds_whitespace() {
        let library = Library::in_memory();
        let id = library
            .put(NewEntry::new(Tag::parse("sql").unwrap(), "Second\n  highest salary?", "Use OFFSET."))
            .unwrap();
        let entry = library.get(id).unwrap();
        assert_eq!(summary_line(&entry), "1\tsql\tSecond highest salary?");
        assert!(render_entry(&entry).contains("Q: Second\n  highest salary?\nA: Use OFFSET."));
    }

    #[test]
    fn search_on_empty_store_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = search_in(tmp.path(), &tmp.path().join("absent.jsonl")).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyStore)), "{err:#}");
    }

    #[test]
    fn search_on_garbage_log_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("entries.jsonl");
        std::fs::write(&path, "this is not json\n").unwrap();
        let err = search_in(tmp.path(), &path).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CorruptLog { line: 1, .. })), "{err:#}");
    }

    #[test]
    fn search_on_populated_store_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("entries.jsonl");
        Library::open(&path)
            .unwrap()
            .put(NewEntry::new(Tag::parse("sql").unwrap(), "Second highest salary?", "Use OFFSET."))
            .unwrap();
        search_in(tmp.path(), &path).unwrap();
    }
}
