use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StorageError;
use crate::models::LibraryEntry;

/// Current layout of the persisted library payload.
pub const FORMAT_VERSION: u32 = 1;

/// Raw byte storage addressed by key. The library store keeps its whole collection under
/// a single key, so backends only need whole-value reads and writes.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write(key, bytes)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-process backend. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with a raw payload, e.g. one written by an older release.
    pub fn with_raw(key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let backend = Self::new();
        if let Ok(mut values) = backend.values.lock() {
            values.insert(key.to_string(), bytes.into());
        }
        backend
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside `root`. Writes go to a sibling temp file first and are
/// renamed into place, so a crash mid-write keeps the previous payload.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are percent-encoded into the file name, so distinct keys never share a file
    /// and separators cannot leave `root`.
    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let temp = target.with_extension("json.tmp");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    books: &'a [T],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    #[serde(default)]
    books: Vec<Value>,
}

/// A stored entry that no longer matches [`LibraryEntry`], kept verbatim so it can be
/// written back instead of lost.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEntry {
    /// Position in the stored payload.
    pub index: usize,
    pub raw: Value,
    pub reason: String,
}

impl RejectedEntry {
    /// The `id` the raw entry carries, if it has a string one.
    pub fn id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    pub fn to_error(&self) -> StorageError {
        StorageError::InvalidEntry {
            index: self.index,
            reason: self.reason.clone(),
        }
    }
}

/// A decoded payload together with the layout version it was read from.
/// Version 0 is the unversioned bare-array layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredLibrary {
    pub version: u32,
    pub books: Vec<LibraryEntry>,
    pub rejected: Vec<RejectedEntry>,
}

pub fn encode_library(books: &[LibraryEntry]) -> Result<Vec<u8>, StorageError> {
    encode_library_with(books, &[])
}

/// Encodes `books` followed by raw entries carried over from an earlier payload.
pub fn encode_library_with(
    books: &[LibraryEntry],
    carried: &[Value],
) -> Result<Vec<u8>, StorageError> {
    if carried.is_empty() {
        return serde_json::to_vec(&EnvelopeRef {
            version: FORMAT_VERSION,
            books,
        })
        .map_err(StorageError::Encode);
    }

    let mut values = books
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()
        .map_err(StorageError::Encode)?;
    values.extend(carried.iter().cloned());
    serde_json::to_vec(&EnvelopeRef {
        version: FORMAT_VERSION,
        books: &values,
    })
    .map_err(StorageError::Encode)
}

/// Decodes a stored payload. Entries are decoded one at a time; an entry that does not
/// fit [`LibraryEntry`] lands in `rejected` and the rest of the library still loads.
pub fn decode_library(bytes: &[u8]) -> Result<StoredLibrary, StorageError> {
    let value: Value = serde_json::from_slice(bytes).map_err(StorageError::Decode)?;
    let (version, entries) = match value {
        Value::Array(entries) => (0, entries),
        other => {
            let envelope: Envelope = serde_json::from_value(other).map_err(StorageError::Decode)?;
            if envelope.version != FORMAT_VERSION {
                return Err(StorageError::UnsupportedVersion(envelope.version));
            }
            (envelope.version, envelope.books)
        }
    };

    let mut books = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();
    for (index, raw) in entries.into_iter().enumerate() {
        match LibraryEntry::deserialize(&raw) {
            Ok(book) => books.push(book),
            Err(err) => rejected.push(RejectedEntry {
                index,
                raw,
                reason: err.to_string(),
            }),
        }
    }
    Ok(StoredLibrary {
        version,
        books,
        rejected,
    })
}
