/// Failures raised by the catalog client. These propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("catalog returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("catalog payload could not be decoded: {0}")]
    Parse(#[source] serde_json::Error),
}

impl CatalogError {
    /// True for both transport failures and non-2xx responses.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// Failures inside the persistence layer. The library store never returns these to its
/// callers; they are handed to the store's failure hook instead.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode library: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode library: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("library entry {index} could not be decoded: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("unsupported library format version {0}")]
    UnsupportedVersion(u32),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Failures while wiring up a [`crate::Bookshelf`] from configuration.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
