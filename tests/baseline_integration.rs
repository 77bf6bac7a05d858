//! Integration tests for the hash gate, hermetic by construction.
//!
//! These exercise the full `screenshot` entry point along the paths that
//! never need pixels: when the current platform's hash is already stored,
//! the call returns before a browser is ever launched.

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use spotcheck::baseline::BaselineStore;
use spotcheck::capture::{render_document, screenshot, CaptureOptions, Platform};
use spotcheck::pool::new_pool;

const MARKUP: &str = "<button>Click me</button>";

fn seeded_store(dir: &std::path::Path, name: &str, markup: &str) -> BaselineStore {
    let store = BaselineStore::new(dir);
    let document = render_document(markup, &[]);
    let hash = BaselineStore::content_hash(&document);
    store
        .write_hash(name, Platform::current(), &hash)
        .expect("seed hash");
    store
}

#[test]
fn test_unchanged_content_skips_capture_entirely() {
    let dir = tempdir().unwrap();
    seeded_store(dir.path(), "button", MARKUP);

    let pool = new_pool();
    let options = CaptureOptions::default()
        .output_path(dir.path())
        .force_update(false);

    let outcomes = screenshot(&pool, "button", MARKUP.into(), &spotcheck::FileCssBuilder, &options)
        .expect("gated run should not need a browser");

    // No browser was ever launched
    assert_eq!(pool.live(), 0);

    let current = outcomes
        .iter()
        .find(|o| o.platform == Platform::current())
        .unwrap();
    assert!(!current.changed);
    assert!(!current.updated);
    assert!(current.diffs.is_empty());

    // Other platforms have no stored hash, so they report a change but
    // never an update from this machine
    for outcome in outcomes.iter().filter(|o| o.platform != Platform::current()) {
        assert!(outcome.changed);
        assert!(!outcome.updated);
    }
}

#[test]
fn test_changed_content_without_update_reports_stale() {
    let dir = tempdir().unwrap();
    seeded_store(dir.path(), "button", MARKUP);

    let pool = new_pool();
    let options = CaptureOptions::default()
        .output_path(dir.path())
        .force_update(false);

    // Different markup, same name: the stored hash no longer matches, but
    // without a forced update the baseline stays and no pixels are rendered
    let outcomes = screenshot(
        &pool,
        "button",
        "<button>Changed</button>".into(),
        &spotcheck::FileCssBuilder,
        &options,
    )
    .expect("stale-baseline run should not need a browser");

    assert_eq!(pool.live(), 0);

    let current = outcomes
        .iter()
        .find(|o| o.platform == Platform::current())
        .unwrap();
    assert!(current.changed);
    assert!(!current.updated);

    // The stored hash is untouched
    let store = BaselineStore::new(dir.path());
    let original = BaselineStore::content_hash(&render_document(MARKUP, &[]));
    assert_eq!(
        store.read_hash("button", Platform::current()).unwrap(),
        Some(original)
    );
}

#[test]
fn test_hash_is_state_independent() {
    // The gate hashes the assembled document, so the configured state list
    // must not affect it: pre-seed with the document hash, then call with a
    // narrowed state list and observe no change
    let dir = tempdir().unwrap();
    seeded_store(dir.path(), "states", MARKUP);

    let pool = new_pool();
    let options = CaptureOptions::default()
        .output_path(dir.path())
        .force_update(false)
        .states([spotcheck::State::Hover]);

    let outcomes = screenshot(&pool, "states", MARKUP.into(), &spotcheck::FileCssBuilder, &options)
        .expect("gated run");

    let current = outcomes
        .iter()
        .find(|o| o.platform == Platform::current())
        .unwrap();
    assert!(!current.changed);
}

#[test]
fn test_names_are_isolated() {
    let dir = tempdir().unwrap();
    seeded_store(dir.path(), "one", MARKUP);

    let pool = new_pool();
    let options = CaptureOptions::default()
        .output_path(dir.path())
        .force_update(false);

    // A different name has no stored hash, so it reports changed everywhere
    let store = BaselineStore::new(dir.path());
    assert_eq!(store.read_hash("two", Platform::current()).unwrap(), None);

    let outcomes = screenshot(&pool, "one", MARKUP.into(), &spotcheck::FileCssBuilder, &options)
        .expect("gated run");
    assert!(!outcomes
        .iter()
        .find(|o| o.platform == Platform::current())
        .unwrap()
        .changed);
}
