use bookshelf::catalog::VolumeInfo;
use bookshelf::{
    open, BookshelfConfig, CatalogRecord, EntryPatch, FileBackend, LibraryStore, Rating,
    ReadingStatus, StatusFilter,
};

fn record(id: &str, title: &str, author: &str, pages: u32) -> CatalogRecord {
    CatalogRecord {
        id: id.to_string(),
        volume_info: VolumeInfo {
            title: Some(title.to_string()),
            authors: Some(vec![author.to_string()]),
            page_count: Some(pages),
            ..VolumeInfo::default()
        },
    }
}

fn config_in(dir: &std::path::Path) -> BookshelfConfig {
    BookshelfConfig {
        data_dir: dir.join("data"),
        ..BookshelfConfig::default()
    }
}

#[test]
fn library_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    {
        let shelf = open(&config).unwrap();
        shelf
            .library
            .add_from_catalog(&record("dune", "Dune", "Frank Herbert", 412), ReadingStatus::WantToRead)
            .unwrap();
        assert!(shelf
            .library
            .update("dune", EntryPatch::new().with_rating(Rating::new(5))));
    }

    let shelf = open(&config).unwrap();
    let dune = shelf.library.get_by_id("dune").unwrap();
    assert_eq!(dune.rating, Rating::new(5));
    assert!(config.database_path().exists());
}

#[test]
fn reading_a_book_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let shelf = open(&config_in(dir.path())).unwrap();
    let library = &shelf.library;

    library.add_from_catalog(&record("dune", "Dune", "Frank Herbert", 412), ReadingStatus::WantToRead);
    library.add_from_catalog(&record("found", "Foundation", "Isaac Asimov", 255), ReadingStatus::Read);
    library.add_from_catalog(&record("neuro", "Neuromancer", "William Gibson", 271), ReadingStatus::Read);

    let mut view = shelf.view();
    view.set_filter(ReadingStatus::Read.into());
    view.set_query("neuro");
    let visible: Vec<&str> = view.visible().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(visible, vec!["neuro"]);

    assert!(library.change_status("dune", ReadingStatus::CurrentlyReading));
    assert!(library.update("dune", EntryPatch::new().with_current_page(120)));
    assert_eq!(bookshelf::reading::progress_percent(&library.get_by_id("dune").unwrap()), 29);

    assert!(library.change_status("dune", ReadingStatus::Read));
    let dune = library.get_by_id("dune").unwrap();
    assert_eq!(dune.current_page, Some(412));
    assert!(dune.date_started.is_some());
    assert!(dune.date_finished.is_some());

    view.set_entries(library.get_all());
    view.set_query("");
    assert_eq!(view.visible_len(), 3);
    assert_eq!(view.counts().get(StatusFilter::Only(ReadingStatus::WantToRead)), 0);

    assert!(library.delete("found"));
    assert!(library.get_by_id("found").is_none());
}

#[test]
fn file_backend_keeps_versioned_payload_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = LibraryStore::new(FileBackend::new(dir.path()).unwrap());

    let entry = bookshelf::to_library_book(&record("emma", "Emma", "Jane Austen", 474))
        .into_entry(ReadingStatus::WantToRead, chrono::Utc::now());
    assert!(store.add(entry.clone()));
    assert!(store.add(entry.clone()));

    let raw = std::fs::read_to_string(dir.path().join("bookshelf-books.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["books"].as_array().unwrap().len(), 1);
    assert_eq!(value["books"][0]["status"], "want-to-read");
    assert_eq!(store.get_all(), vec![entry]);
}

#[test]
fn corrupt_file_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bookshelf-books.json"), "definitely not json").unwrap();
    let store = LibraryStore::new(FileBackend::new(dir.path()).unwrap());

    assert!(store.get_all().is_empty());
    assert_eq!(store.status_counts().all, 0);
}
