/// Real-time salary feed
///
/// - [`window`]: window diffs, cursors and pages
/// - [`view`]: `FeedView`, the consumer-side model that applies snapshots and pages
/// - [`subscription`]: live subscriptions and the per-(user, view) registry
///
/// Records come from a [`WindowSource`]; the API uses the Postgres pool, tests use
/// an in-memory fake.

pub mod subscription;
pub mod view;
pub mod window;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::changes::ChangeStreamError;
use crate::models::salary::Salary;
use window::{FeedCursor, SalaryPage, PAGE_SIZE};

pub use subscription::{subscribe, FeedConfig, FeedEvent, FeedRegistry, FeedSubscription};
pub use view::FeedView;
pub use window::{diff_window, FeedChange, FeedSnapshot};

/// Feed errors
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Change stream error: {0}")]
    ChangeStream(#[from] ChangeStreamError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Reads a user's records in feed order
#[async_trait]
pub trait WindowSource: Send + Sync {
    /// The newest `limit` records
    async fn latest(&self, user_id: Uuid, limit: usize) -> Result<Vec<Salary>, sqlx::Error>;

    /// Up to `limit` records strictly older than `cursor`
    async fn after(
        &self,
        user_id: Uuid,
        cursor: &FeedCursor,
        limit: usize,
    ) -> Result<Vec<Salary>, sqlx::Error>;
}

#[async_trait]
impl WindowSource for PgPool {
    async fn latest(&self, user_id: Uuid, limit: usize) -> Result<Vec<Salary>, sqlx::Error> {
        Salary::list_latest_for_user(self, user_id, limit as i64).await
    }

    async fn after(
        &self,
        user_id: Uuid,
        cursor: &FeedCursor,
        limit: usize,
    ) -> Result<Vec<Salary>, sqlx::Error> {
        Salary::list_after(self, user_id, cursor.created_at, cursor.id, limit as i64).await
    }
}

/// One-shot load-more query
///
/// Without a cursor this returns the first page, which matches the live window.
pub async fn load_page(
    source: &dyn WindowSource,
    user_id: Uuid,
    after: Option<&FeedCursor>,
) -> Result<SalaryPage, FeedError> {
    let records = match after {
        Some(cursor) => source.after(user_id, cursor, PAGE_SIZE).await?,
        None => source.latest(user_id, PAGE_SIZE).await?,
    };

    Ok(SalaryPage::new(records, PAGE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::window::tests::records;
    use std::sync::Mutex;

    struct VecSource(Mutex<Vec<Salary>>);

    #[async_trait]
    impl WindowSource for VecSource {
        async fn latest(&self, _: Uuid, limit: usize) -> Result<Vec<Salary>, sqlx::Error> {
            Ok(self.0.lock().unwrap().iter().take(limit).cloned().collect())
        }

        async fn after(&self, _: Uuid, cursor: &FeedCursor, limit: usize) -> Result<Vec<Salary>, sqlx::Error> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|r| (r.created_at, r.id) < (cursor.created_at, cursor.id))
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_load_more_exactly_twenty_remaining() {
        let owner = Uuid::new_v4();
        let all = records(owner, 40);
        let source = VecSource(Mutex::new(all.clone()));

        let window_cursor = FeedCursor::of(&all[19]);
        let page = load_page(&source, owner, Some(&window_cursor)).await.unwrap();
        assert_eq!(page.records.len(), 20);
        assert!(page.has_more);
        assert_eq!(page.records[0].id, all[20].id);

        let next = page.next_cursor.unwrap();
        let last = load_page(&source, owner, Some(&next)).await.unwrap();
        assert!(last.records.is_empty());
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_first_page_without_cursor() {
        let owner = Uuid::new_v4();
        let source = VecSource(Mutex::new(records(owner, 5)));

        let page = load_page(&source, owner, None).await.unwrap();
        assert_eq!(page.records.len(), 5);
        assert!(!page.has_more);
    }
}
