//! Dashboard aggregation
//!
//! The caller's profile is passed in explicitly; admins get directory-wide
//! totals, everyone else gets their own totals plus the latest announcement.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::announcement::Announcement;
use crate::models::salary::{Salary, SalaryStatus, StatusTotal};
use crate::models::user::User;

/// Announcement preview length, in characters
pub const PREVIEW_CHARS: usize = 200;

/// Queries the dashboard needs
#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn sum_on(&self, user_id: Uuid, date: NaiveDate) -> Result<i64, sqlx::Error>;
    async fn sum_since(&self, user_id: Uuid, from: NaiveDate) -> Result<i64, sqlx::Error>;
    async fn latest_announcement(&self) -> Result<Option<Announcement>, sqlx::Error>;
    async fn user_count(&self) -> Result<i64, sqlx::Error>;
    async fn totals_by_status(&self) -> Result<Vec<StatusTotal>, sqlx::Error>;
}

#[async_trait]
impl DashboardSource for PgPool {
    async fn sum_on(&self, user_id: Uuid, date: NaiveDate) -> Result<i64, sqlx::Error> {
        Salary::sum_for_user_on(self, user_id, date).await
    }

    async fn sum_since(&self, user_id: Uuid, from: NaiveDate) -> Result<i64, sqlx::Error> {
        Salary::sum_for_user_since(self, user_id, from).await
    }

    async fn latest_announcement(&self) -> Result<Option<Announcement>, sqlx::Error> {
        Announcement::find_latest(self).await
    }

    async fn user_count(&self) -> Result<i64, sqlx::Error> {
        User::count(self).await
    }

    async fn totals_by_status(&self) -> Result<Vec<StatusTotal>, sqlx::Error> {
        Salary::totals_by_status(self).await
    }
}

/// Shortened latest announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncementPreview {
    pub id: Uuid,
    pub title: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Announcement> for AnnouncementPreview {
    fn from(a: &Announcement) -> Self {
        Self {
            id: a.id,
            title: a.title.clone(),
            preview: a.preview(PREVIEW_CHARS),
            created_at: a.created_at,
        }
    }
}

/// Dashboard payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum Dashboard {
    Admin {
        total_users: i64,
        total_paid: i64,
        total_pending: i64,
    },
    User {
        today_total: i64,
        month_total: i64,
        latest_announcement: Option<AnnouncementPreview>,
    },
}

/// The ledger's calendar
///
/// "Today" and "this month" are evaluated at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct LedgerClock {
    offset: FixedOffset,
}

impl Default for LedgerClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl LedgerClock {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Clock at `minutes` east of UTC; out-of-range offsets fall back to UTC
    pub fn with_offset_minutes(minutes: i32) -> Self {
        match FixedOffset::east_opt(minutes * 60) {
            Some(offset) => Self { offset },
            None => {
                tracing::warn!(minutes, "Ledger UTC offset out of range, using UTC");
                Self::utc()
            }
        }
    }

    /// Calendar day of `now` at this clock's offset
    pub fn day_of(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.day_of(Utc::now())
    }
}

/// First day of the month containing `day`
pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// Builds the dashboard for `profile` as of calendar day `today`
pub async fn build_dashboard(
    source: &dyn DashboardSource,
    profile: &User,
    today: NaiveDate,
) -> Result<Dashboard, sqlx::Error> {
    if profile.role.is_admin() {
        let total_users = source.user_count().await?;
        let totals = source.totals_by_status().await?;
        let total_for = |status: SalaryStatus| {
            totals
                .iter()
                .filter(|t| t.status == status)
                .map(|t| t.total)
                .sum::<i64>()
        };

        return Ok(Dashboard::Admin {
            total_users,
            total_paid: total_for(SalaryStatus::Paid),
            total_pending: total_for(SalaryStatus::Pending),
        });
    }

    let today_total = source.sum_on(profile.id, today).await?;
    let month_total = source.sum_since(profile.id, month_start(today)).await?;
    let latest_announcement = source
        .latest_announcement()
        .await?
        .as_ref()
        .map(AnnouncementPreview::from);

    Ok(Dashboard::User {
        today_total,
        month_total,
        latest_announcement,
    })
}
