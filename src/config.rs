use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CATALOG_BASE: &str = "https://www.googleapis.com/books/v1";
pub const DEFAULT_MAX_RESULTS: u32 = 20;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 6;
pub const DEFAULT_USER_AGENT: &str = "Bookshelf/0.1";
pub const DEFAULT_STORAGE_KEY: &str = "bookshelf-books";
pub const DEFAULT_DATA_DIR: &str = ".bookshelf";
pub const DB_FILE_NAME: &str = "bookshelf.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookshelfConfig {
    pub catalog_base_url: String,
    pub max_results: u32,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub storage_key: String,
    pub data_dir: PathBuf,
}

impl Default for BookshelfConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: DEFAULT_CATALOG_BASE.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl BookshelfConfig {
    /// Defaults overlaid with `BOOKSHELF_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`. Unparseable numbers are logged and skipped.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = lookup("BOOKSHELF_CATALOG_URL") {
            self.catalog_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("BOOKSHELF_MAX_RESULTS") {
            match raw.parse::<u32>() {
                Ok(value) if value > 0 => self.max_results = value,
                _ => log::warn!("ignoring BOOKSHELF_MAX_RESULTS={}", raw),
            }
        }
        if let Some(raw) = lookup("BOOKSHELF_HTTP_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(value) if value > 0 => self.http_timeout_secs = value,
                _ => log::warn!("ignoring BOOKSHELF_HTTP_TIMEOUT_SECS={}", raw),
            }
        }
        if let Some(key) = lookup("BOOKSHELF_STORAGE_KEY") {
            self.storage_key = key;
        }
        if let Some(dir) = lookup("BOOKSHELF_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

/// Reads an opt-in flag such as `BOOKSHELF_CATALOG_DEBUG=1`.
pub(crate) fn env_flag_enabled(name: &str) -> bool {
    std::env::var(name)
        .map(|value| {
            let lowered = value.trim().to_ascii_lowercase();
            lowered == "1" || lowered == "true" || lowered == "yes" || lowered == "on"
        })
        .unwrap_or(false)
}
