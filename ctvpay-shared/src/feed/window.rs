/// Live-window diffs, cursors and load-more pages
///
/// A feed window is the caller's newest records ordered by `(created_at, id)`
/// descending. When the window is re-queried, [`diff_window`] describes how to
/// turn the previous window into the new one:
///
/// 1. `removed` entries, highest old index first, so each index is valid at the
///    moment it is applied
/// 2. `modified` entries, matched by id and replaced in place
/// 3. `added` entries, lowest new index first; inserting each at its index
///    rebuilds the new window exactly
///
/// A brand-new record lands at index 0.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::FeedError;
use crate::models::salary::Salary;

/// Records in the live window
pub const WINDOW_SIZE: usize = 20;

/// Records per load-more page
pub const PAGE_SIZE: usize = 20;

/// One row-level change between two windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedChange {
    Removed { id: Uuid, old_index: usize },
    Modified { index: usize, record: Salary },
    Added { new_index: usize, record: Salary },
}

/// Position of a record in feed order, `{created_at_micros}_{id}` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl FeedCursor {
    pub fn of(record: &Salary) -> Self {
        Self {
            created_at: record.created_at,
            id: record.id,
        }
    }
}

impl fmt::Display for FeedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.created_at.timestamp_micros(), self.id)
    }
}

impl FromStr for FeedCursor {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FeedError::InvalidCursor(s.to_string());

        let (micros, id) = s.split_once('_').ok_or_else(invalid)?;
        let micros: i64 = micros.parse().map_err(|_| invalid())?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        let secs = micros.div_euclid(1_000_000);
        let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
        let created_at = Utc.timestamp_opt(secs, nanos).single().ok_or_else(invalid)?;

        Ok(Self { created_at, id })
    }
}

impl Serialize for FeedCursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeedCursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One live-window update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSnapshot {
    pub changes: Vec<FeedChange>,

    /// Records in the window after applying `changes`
    pub size: usize,

    /// Cursor of the last record in the window
    pub cursor: Option<FeedCursor>,

    /// False when the window is not full, meaning there is nothing to load
    pub has_more: bool,
}

impl FeedSnapshot {
    /// Builds a snapshot for the transition `previous` -> `current`
    pub fn between(previous: &[Salary], current: &[Salary], window_size: usize) -> Self {
        Self {
            changes: diff_window(previous, current),
            size: current.len(),
            cursor: current.last().map(FeedCursor::of),
            has_more: current.len() >= window_size,
        }
    }
}

/// One load-more page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryPage {
    pub records: Vec<Salary>,
    pub next_cursor: Option<FeedCursor>,
    pub has_more: bool,
}

impl SalaryPage {
    pub fn new(records: Vec<Salary>, page_size: usize) -> Self {
        Self {
            next_cursor: records.last().map(FeedCursor::of),
            has_more: records.len() >= page_size,
            records,
        }
    }
}

/// Computes the ordered changes that turn `old` into `new`
pub fn diff_window(old: &[Salary], new: &[Salary]) -> Vec<FeedChange> {
    let new_by_id: HashMap<Uuid, &Salary> = new.iter().map(|r| (r.id, r)).collect();
    let old_by_id: HashMap<Uuid, &Salary> = old.iter().map(|r| (r.id, r)).collect();

    let mut changes = Vec::new();

    for (old_index, record) in old.iter().enumerate().rev() {
        if !new_by_id.contains_key(&record.id) {
            changes.push(FeedChange::Removed {
                id: record.id,
                old_index,
            });
        }
    }

    for (index, record) in new.iter().enumerate() {
        if let Some(previous) = old_by_id.get(&record.id) {
            if *previous != record {
                changes.push(FeedChange::Modified {
                    index,
                    record: record.clone(),
                });
            }
        }
    }

    for (new_index, record) in new.iter().enumerate() {
        if !old_by_id.contains_key(&record.id) {
            changes.push(FeedChange::Added {
                new_index,
                record: record.clone(),
            });
        }
    }

    changes
}

/// Applies changes produced by [`diff_window`] to a window in place
pub fn apply_changes(window: &mut Vec<Salary>, changes: &[FeedChange]) {
    for change in changes {
        match change {
            FeedChange::Removed { id, old_index } => {
                if window.get(*old_index).map(|r| r.id) == Some(*id) {
                    window.remove(*old_index);
                } else if let Some(pos) = window.iter().position(|r| r.id == *id) {
                    window.remove(pos);
                }
            }
            FeedChange::Modified { record, .. } => {
                if let Some(existing) = window.iter_mut().find(|r| r.id == record.id) {
                    *existing = record.clone();
                }
            }
            FeedChange::Added { new_index, record } => {
                let at = (*new_index).min(window.len());
                window.insert(at, record.clone());
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::salary::{SalaryMethod, SalaryStatus};
    use chrono::{Duration, NaiveDate};

    /// Record created `seq` seconds after a fixed origin
    pub(crate) fn record(owner: Uuid, seq: i64) -> Salary {
        let origin = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        Salary {
            id: Uuid::new_v4(),
            user_id: owner,
            user_name: "Vo Van E".to_string(),
            external_id: "@vovane".to_string(),
            amount: 100_000 + seq,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            status: SalaryStatus::Pending,
            method: SalaryMethod::Manual,
            added_by: Uuid::nil(),
            created_at: origin + Duration::seconds(seq) + Duration::microseconds(7),
        }
    }

    /// Newest-first list of `n` records
    pub(crate) fn records(owner: Uuid, n: i64) -> Vec<Salary> {
        (0..n).rev().map(|seq| record(owner, seq)).collect()
    }

    #[test]
    fn test_initial_snapshot_is_all_additions() {
        let window = records(Uuid::new_v4(), 3);
        let changes = diff_window(&[], &window);

        assert_eq!(changes.len(), 3);
        for (i, change) in changes.iter().enumerate() {
            assert!(matches!(change, FeedChange::Added { new_index, .. } if *new_index == i));
        }
    }

    #[test]
    fn test_empty_window_snapshot() {
        let snapshot = FeedSnapshot::between(&[], &[], WINDOW_SIZE);
        assert!(snapshot.changes.is_empty());
        assert_eq!(snapshot.size, 0);
        assert!(snapshot.cursor.is_none());
        assert!(!snapshot.has_more);
    }

    #[test]
    fn test_new_record_lands_on_top_of_full_window() {
        let owner = Uuid::new_v4();
        let all = records(owner, 21);
        let newest = record(owner, 100);
        let old = all[..WINDOW_SIZE].to_vec();
        let mut new = vec![newest.clone()];
        new.extend_from_slice(&all[..WINDOW_SIZE - 1]);

        let changes = diff_window(&old, &new);
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], FeedChange::Removed { old_index: 19, .. }));
        assert!(matches!(&changes[1], FeedChange::Added { new_index: 0, record } if record.id == newest.id));

        let mut applied = old.clone();
        apply_changes(&mut applied, &changes);
        assert_eq!(applied, new);
        assert!(applied
            .windows(2)
            .all(|w| (w[0].created_at, w[0].id) > (w[1].created_at, w[1].id)));
    }

    #[test]
    fn test_status_change_is_modification() {
        let old = records(Uuid::new_v4(), 4);
        let mut new = old.clone();
        new[2].status = SalaryStatus::Paid;

        let changes = diff_window(&old, &new);
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], FeedChange::Modified { index: 2, record } if record.status == SalaryStatus::Paid));

        let mut applied = old;
        apply_changes(&mut applied, &changes);
        assert_eq!(applied, new);
    }

    #[test]
    fn test_mixed_changes_rebuild_window() {
        let owner = Uuid::new_v4();
        let base = records(owner, 10);
        let old = base[..6].to_vec();

        let mut new: Vec<Salary> = base.iter().filter(|r| r.amount % 2 == 0).cloned().collect();
        new.insert(0, record(owner, 50));
        new.insert(0, record(owner, 51));
        new[3].status = SalaryStatus::Cancelled;

        let mut applied = old.clone();
        apply_changes(&mut applied, &diff_window(&old, &new));
        assert_eq!(applied, new);
    }

    #[test]
    fn test_identical_windows_have_no_changes() {
        let window = records(Uuid::new_v4(), 5);
        assert!(diff_window(&window, &window).is_empty());
    }

    #[test]
    fn test_cursor_text_form() {
        let r = record(Uuid::new_v4(), 3);
        let cursor = FeedCursor::of(&r);
        let text = cursor.to_string();

        assert_eq!(text, format!("{}_{}", r.created_at.timestamp_micros(), r.id));
        assert_eq!(text.parse::<FeedCursor>().unwrap(), cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(matches!("nope".parse::<FeedCursor>(), Err(FeedError::InvalidCursor(_))));
        assert!("12_not-a-uuid".parse::<FeedCursor>().is_err());
        assert!(format!("x_{}", Uuid::new_v4()).parse::<FeedCursor>().is_err());
    }

    #[test]
    fn test_page_has_more() {
        let owner = Uuid::new_v4();
        let full = SalaryPage::new(records(owner, 20), PAGE_SIZE);
        assert!(full.has_more);
        assert!(full.next_cursor.is_some());

        let empty = SalaryPage::new(Vec::new(), PAGE_SIZE);
        assert!(!empty.has_more);
        assert!(empty.next_cursor.is_none());
    }

    #[test]
    fn test_snapshot_wire_format() {
        let window = records(Uuid::new_v4(), 1);
        let json = serde_json::to_value(FeedSnapshot::between(&[], &window, WINDOW_SIZE)).unwrap();

        assert_eq!(json["size"], 1);
        assert_eq!(json["has_more"], false);
        assert_eq!(json["changes"][0]["type"], "added");
        assert_eq!(json["changes"][0]["new_index"], 0);
        assert!(json["cursor"].as_str().unwrap().contains('_'));
    }
}
