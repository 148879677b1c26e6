use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

static HTML_TAG_RE: OnceLock<Option<Regex>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingStatus {
    WantToRead,
    CurrentlyReading,
    Read,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 3] = [
        ReadingStatus::WantToRead,
        ReadingStatus::CurrentlyReading,
        ReadingStatus::Read,
    ];

    /// Wire value, as stored in the persisted payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::WantToRead => "want-to-read",
            ReadingStatus::CurrentlyReading => "currently-reading",
            ReadingStatus::Read => "read",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadingStatus::WantToRead => "Want to Read",
            ReadingStatus::CurrentlyReading => "Currently Reading",
            ReadingStatus::Read => "Read",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reading status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ReadingStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ReadingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct InvalidRating(pub u8);

/// A star rating, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = InvalidRating;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidRating(value))
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// One user-tracked book, as persisted in the library payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub id: String, // catalog volume id
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_link: Option<String>,
    pub status: ReadingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    pub date_added: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_finished: Option<DateTime<Utc>>,
}

impl LibraryEntry {
    pub fn plain_description(&self) -> Option<String> {
        self.description.as_deref().map(strip_html)
    }
}

/// A catalog record mapped into the library shape, before the user picks a status.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogBook {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub categories: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
}

impl CatalogBook {
    /// Completes the book into a library entry added at `now`.
    ///
    /// The initial status goes through the same transition policy as a later status
    /// change, so a book added straight to `read` starts out finished.
    pub fn into_entry(self, status: ReadingStatus, now: DateTime<Utc>) -> LibraryEntry {
        let mut entry = LibraryEntry {
            id: self.id,
            title: self.title,
            authors: self.authors,
            description: self.description,
            published_date: self.published_date,
            page_count: self.page_count,
            categories: self.categories,
            thumbnail: self.thumbnail,
            preview_link: self.preview_link,
            info_link: self.info_link,
            status: ReadingStatus::WantToRead,
            rating: None,
            notes: None,
            current_page: None,
            date_added: now,
            date_started: None,
            date_finished: None,
        };
        crate::reading::status_change(&entry, status, now).apply_to(&mut entry);
        entry
    }
}

/// Partial update for a [`LibraryEntry`].
///
/// Outer `None` leaves a field untouched. For optional fields, `Some(None)` clears the
/// value. `id` and `date_added` are not patchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub description: Option<Option<String>>,
    pub published_date: Option<Option<String>>,
    pub page_count: Option<Option<u32>>,
    pub categories: Option<Option<Vec<String>>>,
    pub thumbnail: Option<Option<String>>,
    pub preview_link: Option<Option<String>>,
    pub info_link: Option<Option<String>>,
    pub status: Option<ReadingStatus>,
    pub rating: Option<Option<Rating>>,
    pub notes: Option<Option<String>>,
    pub current_page: Option<Option<u32>>,
    pub date_started: Option<Option<DateTime<Utc>>>,
    pub date_finished: Option<Option<DateTime<Utc>>>,
}

impl EntryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ReadingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_rating(mut self, rating: Option<Rating>) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(Some(notes.into()));
        self
    }

    pub fn clear_notes(mut self) -> Self {
        self.notes = Some(None);
        self
    }

    pub fn with_current_page(mut self, page: u32) -> Self {
        self.current_page = Some(Some(page));
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the patch onto `entry`, then re-establishes the entry invariants: authors
    /// stay non-empty, and a patch touching `current_page` or `page_count` leaves
    /// `current_page` within a known `page_count`. Other patches never move the page.
    pub fn apply_to(self, entry: &mut LibraryEntry) {
        let touches_pages = self.current_page.is_some() || self.page_count.is_some();
        if let Some(title) = self.title {
            entry.title = title;
        }
        if let Some(authors) = self.authors {
            entry.authors = authors;
        }
        merge(&mut entry.description, self.description);
        merge(&mut entry.published_date, self.published_date);
        merge(&mut entry.page_count, self.page_count);
        merge(&mut entry.categories, self.categories);
        merge(&mut entry.thumbnail, self.thumbnail);
        merge(&mut entry.preview_link, self.preview_link);
        merge(&mut entry.info_link, self.info_link);
        if let Some(status) = self.status {
            entry.status = status;
        }
        merge(&mut entry.rating, self.rating);
        merge(&mut entry.notes, self.notes);
        merge(&mut entry.current_page, self.current_page);
        merge(&mut entry.date_started, self.date_started);
        merge(&mut entry.date_finished, self.date_finished);

        if entry.authors.is_empty() {
            entry.authors = vec![UNKNOWN_AUTHOR.to_string()];
        }
        if touches_pages {
            if let (Some(current), Some(total)) = (entry.current_page, entry.page_count) {
                if current > total {
                    entry.current_page = Some(total);
                }
            }
        }
    }
}

fn merge<T>(slot: &mut Option<T>, update: Option<Option<T>>) {
    if let Some(value) = update {
        *slot = value;
    }
}

/// Removes markup from catalog descriptions, which often carry `<p>`/`<b>` tags.
pub fn strip_html(text: &str) -> String {
    let re = HTML_TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").ok());
    match re {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_entry() -> LibraryEntry {
        LibraryEntry {
            id: "zyTCAlFPjgYC".to_string(),
            title: "The Google Story".to_string(),
            authors: vec!["David A. Vise".to_string(), "Mark Malseed".to_string()],
            description: Some("<p>Inside the <b>hottest</b> company.</p>".to_string()),
            published_date: Some("2005-11-15".to_string()),
            page_count: Some(207),
            categories: Some(vec!["Browsers (Computer programs)".to_string()]),
            thumbnail: None,
            preview_link: None,
            info_link: None,
            status: ReadingStatus::CurrentlyReading,
            rating: Rating::new(4),
            notes: None,
            current_page: Some(50),
            date_added: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            date_started: Some(Utc.with_ymd_and_hms(2024, 3, 2, 20, 0, 0).unwrap()),
            date_finished: None,
        }
    }

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&ReadingStatus::CurrentlyReading).unwrap();
        assert_eq!(json, "\"currently-reading\"");
        assert_eq!(
            "want-to-read".parse::<ReadingStatus>().unwrap(),
            ReadingStatus::WantToRead
        );
        assert!("finished".parse::<ReadingStatus>().is_err());
    }

    #[test]
    fn entry_serializes_with_camel_case_and_omits_empty_fields() {
        let value = serde_json::to_value(sample_entry()).unwrap();
        assert_eq!(value["pageCount"], 207);
        assert_eq!(value["currentPage"], 50);
        assert_eq!(value["rating"], 4);
        assert_eq!(value["dateAdded"], "2024-03-01T09:30:00Z");
        assert!(value.get("notes").is_none());
        assert!(value.get("dateFinished").is_none());
    }

    #[test]
    fn rating_rejects_out_of_range_values() {
        assert!(Rating::new(0).is_none());
        assert!(Rating::new(6).is_none());
        assert_eq!(Rating::new(5).map(Rating::get), Some(5));

        let raw = r#"{"id":"a","title":"t","authors":["x"],"status":"read","rating":9,"dateAdded":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<LibraryEntry>(raw).is_err());
    }

    #[test]
    fn patch_changes_only_the_named_fields() {
        let before = sample_entry();
        let mut after = before.clone();
        EntryPatch::new().with_notes("x").apply_to(&mut after);

        assert_eq!(after.notes.as_deref(), Some("x"));
        after.notes = None;
        assert_eq!(after, before);
    }

    #[test]
    fn patch_can_clear_optional_fields() {
        let mut entry = sample_entry();
        EntryPatch::new().with_rating(None).apply_to(&mut entry);
        assert!(entry.rating.is_none());
    }

    #[test]
    fn patch_clamps_current_page_to_page_count() {
        let mut entry = sample_entry();
        EntryPatch::new().with_current_page(900).apply_to(&mut entry);
        assert_eq!(entry.current_page, Some(207));
    }

    #[test]
    fn patch_clamps_when_page_count_shrinks() {
        let mut entry = sample_entry();
        entry.current_page = Some(150);
        EntryPatch {
            page_count: Some(Some(100)),
            ..EntryPatch::default()
        }
        .apply_to(&mut entry);
        assert_eq!(entry.current_page, Some(100));
    }

    #[test]
    fn notes_patch_leaves_out_of_range_page_alone() {
        let mut entry = sample_entry();
        entry.current_page = Some(500);
        EntryPatch::new().with_notes("x").apply_to(&mut entry);
        assert_eq!(entry.current_page, Some(500));
        assert_eq!(entry.notes.as_deref(), Some("x"));
    }

    #[test]
    fn patch_keeps_authors_non_empty() {
        let mut entry = sample_entry();
        EntryPatch {
            authors: Some(vec![]),
            ..EntryPatch::default()
        }
        .apply_to(&mut entry);
        assert_eq!(entry.authors, vec![UNKNOWN_AUTHOR.to_string()]);
    }

    #[test]
    fn strips_markup_from_descriptions() {
        assert_eq!(
            sample_entry().plain_description().as_deref(),
            Some("Inside the hottest company.")
        );
    }
}
