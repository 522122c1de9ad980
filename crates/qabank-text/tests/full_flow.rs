use std::path::PathBuf;

use qabank_core::loader::Loader;
use qabank_core::types::Tag;
use qabank_core::EntryStore;
use qabank_text::{Query, QueryEngine, TagIndex};

fn notes_dir() -> PathBuf {
    // crates/qabank-text -> crates -> repo root
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap().to_path_buf();
    root.join("test_data/notes")
}

fn loaded_store() -> EntryStore {
    let batch = Loader::new().load_path(&notes_dir()).expect("load notes");
    let mut store = EntryStore::in_memory();
    for entry in batch.entries {
        store.put(entry).expect("put");
    }
    store
}

#[test]
fn text_full_flow() {
    let store = loaded_store();
    let index = TagIndex::build(&store);
    eprintln!("indexed {} entries under {} tags", store.len(), index.tag_counts().len());

    for entry in store.list(None) {
        for tag in &entry.tags {
            assert!(index.lookup(tag).contains(&entry.id), "{} missing under {}", entry.id, tag);
        }
    }

    let engine = QueryEngine::new(&store, &index);
    let all = engine.search(&Query::all());
    assert_eq!(all.len(), store.len());
    assert!(all.windows(2).all(|w| w[0].id < w[1].id), "ids ascend");

    let top = engine.search(&Query::text("second highest salary"));
    assert!(top[0].answer.contains("second highest salary"), "got {:?}", top[0].question);

    let sql = engine.search(&Query::tagged(Tag::parse("sql").unwrap()));
    assert_eq!(sql.len(), 3);
    assert!(sql.iter().all(|e| e.has_tag(&Tag::parse("sql").unwrap())));

    let rxjs = engine.search(&Query::text("observable").with_tag(Tag::parse("rxjs").unwrap()));
    assert_eq!(rxjs.len(), 1);
    assert!(rxjs[0].question.starts_with("What is an Observable?"));
}

#[test]
fn rebuild_matches_incremental_index() {
    let mut store = EntryStore::in_memory();
    let mut incremental = TagIndex::new();
    let batch = Loader::new().load_path(&notes_dir()).expect("load notes");
    for entry in batch.entries {
        let id = store.put(entry).expect("put");
        incremental.record(store.get(id).unwrap(), None);
    }

    let before: Vec<_> = incremental.tag_counts();
    incremental.rebuild(&store);
    assert_eq!(incremental.tag_counts(), before);
    assert_eq!(incremental, TagIndex::build(&store));
}
