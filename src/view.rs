use std::fmt;
use std::str::FromStr;

use crate::models::{LibraryEntry, ReadingStatus, UnknownStatus};

/// Which shelf the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ReadingStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: ReadingStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl From<ReadingStatus> for StatusFilter {
    fn from(status: ReadingStatus) -> Self {
        StatusFilter::Only(status)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => fmt::Display::fmt(status, f),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim() == "all" {
            return Ok(StatusFilter::All);
        }
        value.parse().map(StatusFilter::Only)
    }
}

/// True when `entry` passes both the status filter and the free-text query.
///
/// The query is trimmed; a blank query matches everything. Otherwise the title or any
/// author has to contain it, ignoring case.
pub fn matches(entry: &LibraryEntry, filter: StatusFilter, query: &str) -> bool {
    if !filter.matches(entry.status) {
        return false;
    }
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    entry.title.to_lowercase().contains(&needle)
        || entry
            .authors
            .iter()
            .any(|author| author.to_lowercase().contains(&needle))
}

/// Stable filter over `entries`: order is preserved, nothing is re-sorted.
///
/// Leading and trailing whitespace in `query` is ignored, so `"  "` shows the whole shelf
/// and `" dune "` matches "Dune".
pub fn project<'a>(
    entries: &'a [LibraryEntry],
    filter: StatusFilter,
    query: &str,
) -> Vec<&'a LibraryEntry> {
    entries
        .iter()
        .filter(|entry| matches(entry, filter, query))
        .collect()
}

/// Shelf sizes over the whole collection, independent of the active filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub all: usize,
    pub want_to_read: usize,
    pub currently_reading: usize,
    pub read: usize,
}

impl StatusCounts {
    pub fn from_entries(entries: &[LibraryEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut counts, entry| {
            counts.all += 1;
            match entry.status {
                ReadingStatus::WantToRead => counts.want_to_read += 1,
                ReadingStatus::CurrentlyReading => counts.currently_reading += 1,
                ReadingStatus::Read => counts.read += 1,
            }
            counts
        })
    }

    pub fn get(&self, filter: StatusFilter) -> usize {
        match filter {
            StatusFilter::All => self.all,
            StatusFilter::Only(ReadingStatus::WantToRead) => self.want_to_read,
            StatusFilter::Only(ReadingStatus::CurrentlyReading) => self.currently_reading,
            StatusFilter::Only(ReadingStatus::Read) => self.read,
        }
    }
}

/// The library as the user currently sees it. Holds the three inputs and keeps the
/// visible subset up to date whenever one of them changes.
#[derive(Debug, Clone, Default)]
pub struct LibraryView {
    entries: Vec<LibraryEntry>,
    filter: StatusFilter,
    query: String,
    visible: Vec<usize>,
}

impl LibraryView {
    pub fn new(entries: Vec<LibraryEntry>) -> Self {
        let mut view = Self {
            entries,
            ..Self::default()
        };
        view.recompute();
        view
    }

    pub fn set_entries(&mut self, entries: Vec<LibraryEntry>) {
        self.entries = entries;
        self.recompute();
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        if self.filter != filter {
            self.filter = filter;
            self.recompute();
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if self.query != query {
            self.query = query;
            self.recompute();
        }
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn visible(&self) -> Vec<&LibraryEntry> {
        self.visible.iter().map(|&index| &self.entries[index]).collect()
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::from_entries(&self.entries)
    }

    /// Distinguishes an empty library from one where the filters hide everything.
    pub fn is_library_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn recompute(&mut self) {
        let filter = self.filter;
        let query = self.query.as_str();
        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches(entry, filter, query))
            .map(|(index, _)| index)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(id: &str, title: &str, authors: &[&str], status: ReadingStatus) -> LibraryEntry {
        LibraryEntry {
            id: id.to_string(),
            title: title.to_string(),
            authors: authors.iter().map(|author| author.to_string()).collect(),
            description: None,
            published_date: None,
            page_count: None,
            categories: None,
            thumbnail: None,
            preview_link: None,
            info_link: None,
            status,
            rating: None,
            notes: None,
            current_page: None,
            date_added: Utc::now(),
            date_started: None,
            date_finished: None,
        }
    }

    fn shelf() -> Vec<LibraryEntry> {
        vec![
            book("1", "Dune", &["Frank Herbert"], ReadingStatus::WantToRead),
            book("2", "Foundation", &["Isaac Asimov"], ReadingStatus::Read),
            book("3", "Neuromancer", &["William Gibson"], ReadingStatus::Read),
        ]
    }

    fn ids(entries: Vec<&LibraryEntry>) -> Vec<&str> {
        entries.into_iter().map(|entry| entry.id.as_str()).collect()
    }

    #[test]
    fn status_and_query_compose() {
        let entries = shelf();
        let visible = project(&entries, ReadingStatus::Read.into(), "neuro");
        assert_eq!(ids(visible), vec!["3"]);
    }

    #[test]
    fn padded_query_matches_title() {
        let entries = shelf();
        assert_eq!(ids(project(&entries, StatusFilter::All, " dune ")), vec!["1"]);
    }

    #[test]
    fn query_matches_authors_case_insensitively() {
        let entries = shelf();
        assert_eq!(ids(project(&entries, StatusFilter::All, "ASIMOV")), vec!["2"]);
        assert_eq!(ids(project(&entries, StatusFilter::All, "  gibson ")), vec!["3"]);
    }

    #[test]
    fn blank_query_and_all_filter_keep_input_order() {
        let entries = shelf();
        assert_eq!(ids(project(&entries, StatusFilter::All, "")), vec!["1", "2", "3"]);
        assert_eq!(ids(project(&entries, StatusFilter::All, "   ")), vec!["1", "2", "3"]);
        assert_eq!(
            ids(project(&entries, ReadingStatus::Read.into(), "")),
            vec!["2", "3"]
        );
    }

    #[test]
    fn filter_parses_tab_values() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "currently-reading".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(ReadingStatus::CurrentlyReading)
        );
        assert!("everything".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::Only(ReadingStatus::Read).to_string(), "read");
    }

    #[test]
    fn view_recomputes_on_every_input_change() {
        let mut view = LibraryView::new(shelf());
        assert_eq!(view.visible_len(), 3);

        view.set_filter(ReadingStatus::Read.into());
        assert_eq!(ids(view.visible()), vec!["2", "3"]);

        view.set_query("found");
        assert_eq!(ids(view.visible()), vec!["2"]);

        let mut entries = shelf();
        entries[1].status = ReadingStatus::CurrentlyReading;
        view.set_entries(entries);
        assert!(view.visible().is_empty());
        assert!(!view.is_library_empty());

        view.set_filter(StatusFilter::All);
        assert_eq!(ids(view.visible()), vec!["2"]);
    }

    #[test]
    fn counts_ignore_active_filter() {
        let mut view = LibraryView::new(shelf());
        view.set_filter(ReadingStatus::WantToRead.into());
        view.set_query("dune");

        let counts = view.counts();
        assert_eq!(counts.all, 3);
        assert_eq!(counts.get(ReadingStatus::Read.into()), 2);
        assert_eq!(counts.get(ReadingStatus::CurrentlyReading.into()), 0);
    }
}
