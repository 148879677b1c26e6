use chrono::{DateTime, Utc};

use crate::models::{EntryPatch, LibraryEntry, ReadingStatus};

/// Builds the patch for moving `entry` to `next` at time `now`.
///
/// Entering `CurrentlyReading` stamps `date_started`; entering `Read` stamps
/// `date_finished` and jumps `current_page` to the last page when the page count is
/// known. Each fresh transition overwrites the previous stamp. Re-selecting the current
/// status writes the status alone.
pub fn status_change(entry: &LibraryEntry, next: ReadingStatus, now: DateTime<Utc>) -> EntryPatch {
    let mut patch = EntryPatch::new().with_status(next);
    if entry.status == next {
        return patch;
    }

    match next {
        ReadingStatus::CurrentlyReading => {
            patch.date_started = Some(Some(now));
        }
        ReadingStatus::Read => {
            patch.date_finished = Some(Some(now));
            if let Some(total) = entry.page_count {
                patch.current_page = Some(Some(total));
            }
        }
        ReadingStatus::WantToRead => {}
    }
    patch
}

/// Rounded reading progress in percent. Zero unless the book is being read and both
/// page numbers are known.
pub fn progress_percent(entry: &LibraryEntry) -> u8 {
    if entry.status != ReadingStatus::CurrentlyReading {
        return 0;
    }
    let (Some(current), Some(total)) = (entry.current_page, entry.page_count) else {
        return 0;
    };
    if current == 0 || total == 0 {
        return 0;
    }
    let percent = (f64::from(current) / f64::from(total) * 100.0).round();
    percent.min(100.0) as u8
}
