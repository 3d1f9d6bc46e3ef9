//! Dataset cache: keyed by path + content hash, owned by the caller.

use relance_core::{
    cache::{CacheKey, DatasetCache},
    config::{AidColumns, FirmColumns},
    loader::DatasetLoader,
};
use std::path::PathBuf;
use std::sync::Arc;

const FIRMS: &str = "siren,annee,Survie_24m\n1,2020,1\n2,2020,0\n";

fn scratch_file(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("relance-cache-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("firms.csv");
    std::fs::write(&path, content).expect("write temp file");
    path
}

#[test]
fn unchanged_file_is_parsed_once() {
    let loader = DatasetLoader::new(FirmColumns::default(), AidColumns::default());
    let path = scratch_file("unchanged", FIRMS);
    let mut cache = DatasetCache::new();

    let first = cache.firms(&loader, &path).expect("first load");
    let second = cache.firms(&loader, &path).expect("second load");
    assert!(Arc::ptr_eq(&first, &second), "same table shared");
    assert_eq!((cache.hits(), cache.misses()), (1, 1));
    assert_eq!(cache.len(), 1);
}

#[test]
fn edited_file_gets_a_fresh_entry() {
    let loader = DatasetLoader::new(FirmColumns::default(), AidColumns::default());
    let path = scratch_file("edited", FIRMS);
    let mut cache = DatasetCache::new();

    let before = cache.firms(&loader, &path).expect("load");
    std::fs::write(&path, format!("{FIRMS}3,2020,1\n")).expect("rewrite");
    let after = cache.firms(&loader, &path).expect("reload");

    assert_eq!(before.records.len(), 2);
    assert_eq!(after.records.len(), 3);
    assert_eq!(cache.misses(), 2);
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn key_depends_on_content_not_only_path() {
    let path = PathBuf::from("firms.csv");
    assert_eq!(CacheKey::new(&path, b"a"), CacheKey::new(&path, b"a"));
    assert_ne!(CacheKey::new(&path, b"a"), CacheKey::new(&path, b"b"));
}

#[test]
fn missing_file_is_an_io_error() {
    let loader = DatasetLoader::new(FirmColumns::default(), AidColumns::default());
    let mut cache = DatasetCache::new();
    assert!(cache.aid(&loader, &PathBuf::from("/nonexistent/aid.csv")).is_err());
    assert_eq!(cache.misses(), 0, "nothing was parsed");
}
