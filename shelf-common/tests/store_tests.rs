//! Library persistence against a real temp directory

use shelf_common::{BookRecord, BookStore};
use tempfile::TempDir;

#[test]
fn test_saved_library_is_pretty_json_array() {
    let dir = TempDir::new().unwrap();
    let store = BookStore::new(dir.path().join("books.json"));

    let mut record = BookRecord::new("Pride and Prejudice", "Jane Austen");
    record.original_date = Some(1813);
    record.original_location_name = "London, England".to_string();
    record.original_location_latitude = 51.5074;
    record.original_location_longitude = -0.1278;
    record.data_source = "Vision+OpenLibrary".to_string();
    store.save(&mut [record]).unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(raw.starts_with("[\n"), "library should be pretty-printed");

    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let book = &value[0];
    assert_eq!(book["id"], "pride-and-prejudice-jane-austen");
    assert_eq!(book["original_date"], 1813);
    assert!(book["release_date"].is_null());
    assert_eq!(book["original_location_name"], "London, England");
    assert_eq!(book["data_source"], "Vision+OpenLibrary");
}

#[test]
fn test_upsert_appends_new_and_replaces_existing() {
    let dir = TempDir::new().unwrap();
    let store = BookStore::new(dir.path().join("books.json"));

    let mut republic = BookRecord::new("The Republic", "Plato");
    republic.original_date = Some(-375);
    let mut dune = BookRecord::new("Dune", "Frank Herbert");
    dune.original_date = Some(1965);
    assert_eq!(store.upsert([dune, republic]).unwrap(), 2);

    let mut corrected = BookRecord::new("Dune", "Frank Herbert");
    corrected.original_date = Some(1965);
    corrected.publisher = "Chilton Books".to_string();
    let unread = BookRecord::from_image("/covers/IMG_0042.JPG");
    store.upsert([corrected, unread.clone()]).unwrap();
    // Unidentified records are keyed by image path
    store.upsert([unread]).unwrap();

    let books = store.load().unwrap();
    assert_eq!(books.len(), 3);
    assert_eq!(books[0].title(), "The Republic");
    assert_eq!(books[2].publisher, "Chilton Books");
}

#[test]
fn test_load_rejects_corrupt_library() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("books.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(BookStore::new(path).load().is_err());
}
