use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::{env_flag_enabled, BookshelfConfig};
use crate::error::CatalogError;
use crate::models::{strip_html, CatalogBook, UNKNOWN_AUTHOR, UNKNOWN_TITLE};

/// Upper bound Google Books accepts for `maxResults`.
pub const MAX_RESULTS_LIMIT: u32 = 40;

static CATALOG_DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// One volume as returned by the catalog. Every descriptive field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub description: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub categories: Option<Vec<String>>,
    pub image_links: Option<ImageLinks>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    total_items: u64,
}

impl CatalogRecord {
    pub fn plain_description(&self) -> Option<String> {
        self.volume_info.description.as_deref().map(strip_html)
    }

    /// Decodes one record without letting a single bad field sink it. A record whose
    /// `volumeInfo` does not fit keeps its id and a string title, and everything else
    /// falls back to placeholders in [`to_library_book`]. Only a record without a string
    /// id is rejected.
    pub fn from_value_lenient(value: &Value) -> Result<Self, serde_json::Error> {
        let err = match CatalogRecord::deserialize(value) {
            Ok(record) => return Ok(record),
            Err(err) => err,
        };
        let Some(id) = value.get("id").and_then(Value::as_str) else {
            return Err(err);
        };
        log::warn!("catalog record {} partly malformed: {}", id, err);
        Ok(CatalogRecord {
            id: id.to_string(),
            volume_info: VolumeInfo {
                title: value
                    .pointer("/volumeInfo/title")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                ..VolumeInfo::default()
            },
        })
    }
}

/// Maps a catalog record into the library shape. Missing title and authors become
/// placeholders; everything else stays absent.
pub fn to_library_book(record: &CatalogRecord) -> CatalogBook {
    let info = &record.volume_info;
    let title = info
        .title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let authors = info
        .authors
        .clone()
        .filter(|authors| !authors.is_empty())
        .unwrap_or_else(|| vec![UNKNOWN_AUTHOR.to_string()]);

    CatalogBook {
        id: record.id.clone(),
        title,
        authors,
        description: info.description.clone(),
        published_date: info.published_date.clone(),
        page_count: info.page_count,
        categories: info.categories.clone(),
        thumbnail: info
            .image_links
            .as_ref()
            .and_then(|links| links.thumbnail.clone()),
        preview_link: info.preview_link.clone(),
        info_link: info.info_link.clone(),
    }
}

/// Blocking client for the Google Books volumes API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
    max_results: u32,
}

impl CatalogClient {
    pub fn new(config: &BookshelfConfig) -> Result<Self, CatalogError> {
        let base_url = config.catalog_base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| CatalogError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self {
            http,
            base_url,
            max_results: config.max_results,
        })
    }

    /// Uses a caller-built HTTP client, e.g. one with custom proxy or TLS settings.
    pub fn with_http(http: Client, config: &BookshelfConfig) -> Self {
        Self {
            http,
            base_url: config.catalog_base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Searches with the configured result limit.
    pub fn search(&self, query: &str) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.search_with_limit(query, self.max_results)
    }

    /// Free-text search. The caller is expected to skip empty queries.
    pub fn search_with_limit(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<CatalogRecord>, CatalogError> {
        let url = format!(
            "{}/volumes?q={}&maxResults={}",
            self.base_url,
            urlencoding::encode(query),
            max_results.clamp(1, MAX_RESULTS_LIMIT)
        );
        let response: SearchResponse = self.fetch_json(&url)?;
        let items: Vec<CatalogRecord> = response
            .items
            .unwrap_or_default()
            .iter()
            .filter_map(|value| match CatalogRecord::from_value_lenient(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    log::warn!("skipping catalog record without id: {}", err);
                    None
                }
            })
            .collect();
        if catalog_debug_enabled() {
            log::info!(
                "[catalog-debug] search done query=\"{}\" items={} total={}",
                query,
                items.len(),
                response.total_items
            );
        }
        Ok(items)
    }

    /// Fetches a single volume by its catalog id.
    pub fn get_volume(&self, id: &str) -> Result<CatalogRecord, CatalogError> {
        let url = format!("{}/volumes/{}", self.base_url, urlencoding::encode(id));
        let value: Value = self.fetch_json(&url)?;
        CatalogRecord::from_value_lenient(&value).map_err(CatalogError::Parse)
    }

    fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let debug_enabled = catalog_debug_enabled();
        if debug_enabled {
            log::info!("[catalog-debug] http start url={}", url);
        }

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|source| {
                log::warn!("catalog request failed url={} error={}", url, source);
                CatalogError::Transport {
                    url: url.to_string(),
                    source,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("catalog request failed url={} status={}", url, status.as_u16());
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(|source| CatalogError::Transport {
            url: url.to_string(),
            source,
        })?;
        if debug_enabled {
            log::info!("[catalog-debug] http ok url={} bytes={}", url, body.len());
        }

        serde_json::from_slice(&body).map_err(|err| {
            log::warn!("catalog payload rejected url={} error={}", url, err);
            CatalogError::Parse(err)
        })
    }
}

fn catalog_debug_enabled() -> bool {
    *CATALOG_DEBUG_ENABLED.get_or_init(|| env_flag_enabled("BOOKSHELF_CATALOG_DEBUG"))
}
