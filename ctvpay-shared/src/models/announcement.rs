/// Announcement model
///
/// Announcements are read-only from the portal's point of view; they are
/// authored directly in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Announcement {
    /// Returns the most recently created announcement, if any
    pub async fn find_latest(pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        let announcement = sqlx::query_as::<_, Announcement>(
            r#"
            SELECT id, title, content, created_at
            FROM announcements
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await?;

        Ok(announcement)
    }

    /// Lists recent announcements, newest first
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let announcements = sqlx::query_as::<_, Announcement>(
            r#"
            SELECT id, title, content, created_at
            FROM announcements
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(announcements)
    }

    /// Whether the caller has an unseen announcement
    ///
    /// True when this announcement exists and its ID differs from the last one
    /// the caller acknowledged.
    pub fn is_unread_for(&self, last_seen: Option<Uuid>) -> bool {
        last_seen != Some(self.id)
    }

    /// Content shortened for previews
    ///
    /// Cut to `max_chars` characters, with `...` appended only when something
    /// was cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}
