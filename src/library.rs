use chrono::Utc;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::catalog::{to_library_book, CatalogRecord};
use crate::config::DEFAULT_STORAGE_KEY;
use crate::error::StorageError;
use crate::models::{EntryPatch, LibraryEntry, ReadingStatus};
use crate::reading::status_change;
use crate::storage::{
    decode_library, encode_library, encode_library_with, StorageBackend, StoredLibrary,
};
use crate::view::StatusCounts;

/// The store call during which a storage failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Load,
    Save,
    Add,
    Update,
    Delete,
    Clear,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::Load => "load",
            StoreOperation::Save => "save",
            StoreOperation::Add => "add",
            StoreOperation::Update => "update",
            StoreOperation::Delete => "delete",
            StoreOperation::Clear => "clear",
        };
        f.write_str(name)
    }
}

type FailureHook = Box<dyn Fn(StoreOperation, &StorageError) + Send + Sync>;

/// Owns the user's library.
///
/// The whole collection lives under one key of the backend and is re-read on every
/// call, so the backend is the only source of truth. Mutations run as
/// read-modify-write under an in-process lock and either persist completely or leave
/// the stored collection untouched.
///
/// Storage failures never reach the caller. Reads fall back to an empty library,
/// mutations report `false`, and the failure goes to the failure hook (which logs by
/// default).
///
/// Stored entries that no longer decode are skipped on read, reported, and written back
/// untouched by later mutations. A payload that does not decode at all is copied to
/// [`LibraryStore::backup_key`] before the first mutation replaces it.
pub struct LibraryStore<B> {
    backend: B,
    key: String,
    write_lock: Mutex<()>,
    on_failure: FailureHook,
}

impl<B> fmt::Debug for LibraryStore<B>
where
    B: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryStore")
            .field("backend", &self.backend)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<B: StorageBackend> LibraryStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(backend: B, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            write_lock: Mutex::new(()),
            on_failure: Box::new(|operation, err| {
                log::error!("library {} failed: {}", operation, err);
            }),
        }
    }

    /// Replaces the default logging hook.
    pub fn with_failure_hook(
        mut self,
        hook: impl Fn(StoreOperation, &StorageError) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Box::new(hook);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Where an undecodable payload is moved before it gets replaced.
    pub fn backup_key(&self) -> String {
        format!("{}.unreadable", self.key)
    }

    /// Full collection in insertion order. Empty when nothing is stored or the stored
    /// payload cannot be read.
    pub fn get_all(&self) -> Vec<LibraryEntry> {
        match self.load() {
            Ok(stored) => {
                self.report_rejected(StoreOperation::Load, &stored);
                stored.books
            }
            Err(err) => {
                self.report(StoreOperation::Load, &err);
                Vec::new()
            }
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<LibraryEntry> {
        self.get_all().into_iter().find(|entry| entry.id == id)
    }

    pub fn get_by_status(&self, status: ReadingStatus) -> Vec<LibraryEntry> {
        self.get_all()
            .into_iter()
            .filter(|entry| entry.status == status)
            .collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::from_entries(&self.get_all())
    }

    /// Inserts `entry`, replacing an existing entry with the same id in place.
    /// Returns whether the result was persisted.
    pub fn add(&self, entry: LibraryEntry) -> bool {
        self.mutate(StoreOperation::Add, |library| {
            match library.books.iter_mut().find(|book| book.id == entry.id) {
                Some(slot) => *slot = entry,
                None => library.books.push(entry),
            }
            true
        })
    }

    /// Converts a catalog record, stamps it as added now with `status`, and stores it.
    /// Returns the stored entry, or `None` if it could not be persisted.
    pub fn add_from_catalog(
        &self,
        record: &CatalogRecord,
        status: ReadingStatus,
    ) -> Option<LibraryEntry> {
        let entry = to_library_book(record).into_entry(status, Utc::now());
        log::info!("adding \"{}\" to library as {}", entry.title, status);
        self.add(entry.clone()).then_some(entry)
    }

    /// Merges `patch` onto the entry with `id`. A missing id is a no-op returning
    /// `false`.
    pub fn update(&self, id: &str, patch: EntryPatch) -> bool {
        self.mutate(StoreOperation::Update, |library| {
            match library.books.iter_mut().find(|book| book.id == id) {
                Some(book) => {
                    patch.apply_to(book);
                    true
                }
                None => false,
            }
        })
    }

    /// Moves the entry with `id` to `status`, stamping start/finish dates as the reading
    /// policy requires.
    pub fn change_status(&self, id: &str, status: ReadingStatus) -> bool {
        let now = Utc::now();
        self.mutate(StoreOperation::Update, |library| {
            match library.books.iter_mut().find(|book| book.id == id) {
                Some(book) => {
                    status_change(book, status, now).apply_to(book);
                    true
                }
                None => false,
            }
        })
    }

    /// Removes the entry with `id`, including one that no longer decodes. A missing id is
    /// a no-op returning `false`.
    pub fn delete(&self, id: &str) -> bool {
        self.mutate(StoreOperation::Delete, |library| {
            let before = library.books.len() + library.rejected.len();
            library.books.retain(|book| book.id != id);
            library.rejected.retain(|rejected| rejected.id() != Some(id));
            library.books.len() + library.rejected.len() != before
        })
    }

    /// Overwrites the stored collection with `books`.
    pub fn save_all(&self, books: &[LibraryEntry]) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.persist(books) {
            Ok(()) => true,
            Err(err) => {
                self.report(StoreOperation::Save, &err);
                false
            }
        }
    }

    pub fn clear(&self) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.backend.remove(&self.key) {
            Ok(()) => true,
            Err(err) => {
                self.report(StoreOperation::Clear, &err);
                false
            }
        }
    }

    fn load(&self) -> Result<StoredLibrary, StorageError> {
        let Some(bytes) = self.backend.read(&self.key)? else {
            return Ok(StoredLibrary::default());
        };
        decode_stored(&bytes)
    }

    fn persist(&self, books: &[LibraryEntry]) -> Result<(), StorageError> {
        let bytes = encode_library(books)?;
        self.backend.write(&self.key, &bytes)
    }

    /// Runs one read-modify-write cycle. `apply` returns whether it changed anything;
    /// unchanged collections are not written back.
    ///
    /// Entries that failed to decode are carried into the write unless `apply` dropped
    /// them or a decoded entry now uses their id. A payload that does not decode at all
    /// is copied to the backup key first and the library starts over from empty; if the
    /// copy fails nothing is written. Backend read errors and payloads from a newer
    /// format abort the mutation.
    fn mutate<F>(&self, operation: StoreOperation, apply: F) -> bool
    where
        F: FnOnce(&mut StoredLibrary) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let bytes = match self.backend.read(&self.key) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.report(operation, &err);
                return false;
            }
        };
        let mut library = match bytes.as_deref().map(decode_stored) {
            None => StoredLibrary::default(),
            Some(Ok(stored)) => {
                self.report_rejected(operation, &stored);
                stored
            }
            Some(Err(err @ StorageError::Decode(_))) => {
                self.report(operation, &err);
                let raw = bytes.as_deref().unwrap_or_default();
                if !self.back_up(operation, raw) {
                    return false;
                }
                StoredLibrary::default()
            }
            Some(Err(err)) => {
                self.report(operation, &err);
                return false;
            }
        };

        if !apply(&mut library) {
            return false;
        }

        let carried: Vec<_> = library
            .rejected
            .into_iter()
            .filter(|rejected| {
                rejected
                    .id()
                    .map_or(true, |id| library.books.iter().all(|book| book.id != id))
            })
            .map(|rejected| rejected.raw)
            .collect();

        match encode_library_with(&library.books, &carried)
            .and_then(|bytes| self.backend.write(&self.key, &bytes))
        {
            Ok(()) => true,
            Err(err) => {
                self.report(operation, &err);
                false
            }
        }
    }

    fn back_up(&self, operation: StoreOperation, raw: &[u8]) -> bool {
        let backup_key = self.backup_key();
        match self.backend.write(&backup_key, raw) {
            Ok(()) => {
                log::warn!(
                    "unreadable library payload moved to \"{}\" ({} bytes)",
                    backup_key,
                    raw.len()
                );
                true
            }
            Err(err) => {
                self.report(operation, &err);
                false
            }
        }
    }

    fn report_rejected(&self, operation: StoreOperation, stored: &StoredLibrary) {
        for rejected in &stored.rejected {
            self.report(operation, &rejected.to_error());
        }
    }

    fn report(&self, operation: StoreOperation, err: &StorageError) {
        (self.on_failure)(operation, err);
    }
}

fn decode_stored(bytes: &[u8]) -> Result<StoredLibrary, StorageError> {
    let stored = decode_library(bytes)?;
    if stored.version == 0 {
        log::debug!("library payload is unversioned, upgrading on next write");
    }
    Ok(stored)
}
