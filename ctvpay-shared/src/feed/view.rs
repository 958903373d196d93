/// Client-side model of a salary feed
///
/// Holds the live window (kept current by snapshots) and the older pages the
/// user loaded below it. Consumers render [`FeedView::records`] and drive the
/// load-more control from [`FeedView::load_more_cursor`] and
/// [`FeedView::show_load_more`].

use std::collections::HashSet;

use uuid::Uuid;

use super::window::{apply_changes, FeedCursor, FeedSnapshot, SalaryPage};
use crate::models::salary::Salary;

#[derive(Debug, Clone, Default)]
pub struct FeedView {
    live: Vec<Salary>,
    live_cursor: Option<FeedCursor>,
    live_has_more: bool,
    older: Vec<Salary>,
    older_cursor: Option<FeedCursor>,
    older_has_more: bool,
    pages_loaded: usize,
}

impl FeedView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a live-window snapshot; an empty change list is fine
    pub fn apply(&mut self, snapshot: &FeedSnapshot) {
        apply_changes(&mut self.live, &snapshot.changes);
        self.live_cursor = snapshot.cursor;
        self.live_has_more = snapshot.has_more;
    }

    /// Appends a load-more page below everything already shown
    pub fn append_page(&mut self, page: SalaryPage) {
        self.older.extend(page.records);
        self.older_cursor = page.next_cursor;
        self.older_has_more = page.has_more;
        self.pages_loaded += 1;
    }

    /// Cursor for the next load-more request
    ///
    /// Follows the live window until a page has been appended, then the last
    /// appended page.
    pub fn load_more_cursor(&self) -> Option<FeedCursor> {
        if self.pages_loaded == 0 {
            self.live_cursor
        } else {
            self.older_cursor
        }
    }

    /// Whether the load-more control should be visible
    pub fn show_load_more(&self) -> bool {
        if self.pages_loaded == 0 {
            self.live_has_more
        } else {
            self.older_has_more
        }
    }

    /// Live window followed by loaded pages, without repeats
    pub fn records(&self) -> Vec<&Salary> {
        let live_ids: HashSet<Uuid> = self.live.iter().map(|r| r.id).collect();

        self.live
            .iter()
            .chain(self.older.iter().filter(|r| !live_ids.contains(&r.id)))
            .collect()
    }

    pub fn live(&self) -> &[Salary] {
        &self.live
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }
}
