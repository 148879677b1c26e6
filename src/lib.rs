//! Personal book library core.
//!
//! Search the Google Books catalog, keep a local library of tracked books with reading
//! status, progress, ratings and notes, and derive the filtered list a UI shows.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod models;
pub mod reading;
pub mod search;
pub mod storage;
pub mod view;

pub use catalog::{to_library_book, CatalogClient, CatalogRecord};
pub use config::BookshelfConfig;
pub use db::SqliteBackend;
pub use error::{CatalogError, OpenError, StorageError};
pub use library::{LibraryStore, StoreOperation};
pub use models::{CatalogBook, EntryPatch, LibraryEntry, Rating, ReadingStatus};
pub use search::{SearchOutcome, SearchSession};
pub use storage::{FileBackend, MemoryBackend, RejectedEntry, StorageBackend};
pub use view::{LibraryView, StatusCounts, StatusFilter};

/// Everything a UI needs, wired from one configuration.
#[derive(Debug)]
pub struct Bookshelf {
    pub library: LibraryStore<SqliteBackend>,
    pub catalog: CatalogClient,
    pub search: SearchSession,
}

impl Bookshelf {
    /// Fresh view over the current library contents.
    pub fn view(&self) -> LibraryView {
        LibraryView::new(self.library.get_all())
    }

    /// Searches the catalog; results of searches overtaken by a newer one are dropped.
    pub fn search_catalog(
        &self,
        query: &str,
    ) -> Result<SearchOutcome<Vec<CatalogRecord>>, CatalogError> {
        self.search.search(&self.catalog, query, |records| records)
    }
}

/// Opens the SQLite-backed library under `config.data_dir` and builds the catalog
/// client.
pub fn open(config: &BookshelfConfig) -> Result<Bookshelf, OpenError> {
    let db_path = config.database_path();
    let backend = SqliteBackend::open(&db_path)?;
    log::info!("library opened at {}", db_path.display());

    Ok(Bookshelf {
        library: LibraryStore::with_key(backend, config.storage_key.clone()),
        catalog: CatalogClient::new(config)?,
        search: SearchSession::new(),
    })
}
