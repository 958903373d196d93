/// Salary record model and database operations
///
/// Salary records are created exclusively by admins, either one at a time or as a
/// spreadsheet import batch. The owning user can only read them. After creation the
/// only mutation is a status change.
///
/// # Ordering
///
/// Feeds are ordered by `(created_at, id)` descending. `created_at` defaults to
/// `clock_timestamp()`, so rows inserted by one batch transaction keep the order
/// they were written in.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE salary_status AS ENUM ('pending', 'paid', 'cancelled');
/// CREATE TYPE salary_method AS ENUM ('manual', 'spreadsheet_import');
///
/// CREATE TABLE salaries (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id),
///     user_name VARCHAR(255) NOT NULL DEFAULT '',
///     external_id VARCHAR(255) NOT NULL DEFAULT '',
///     amount BIGINT NOT NULL CHECK (amount >= 0),
///     date DATE NOT NULL,
///     status salary_status NOT NULL DEFAULT 'pending',
///     method salary_method NOT NULL,
///     added_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Payment status of a salary record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "salary_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SalaryStatus {
    /// Recorded, not yet paid
    Pending,

    /// Paid out
    Paid,

    /// Voided by an admin
    Cancelled,
}

impl SalaryStatus {
    /// Converts status to string
    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryStatus::Pending => "pending",
            SalaryStatus::Paid => "paid",
            SalaryStatus::Cancelled => "cancelled",
        }
    }
}

/// How a salary record was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "salary_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SalaryMethod {
    /// Single entry from the admin form
    Manual,

    /// Row of a bulk spreadsheet import
    SpreadsheetImport,
}

/// Salary record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Salary {
    /// Record ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Owner's full name at creation time
    pub user_name: String,

    /// Owner's external messaging ID at creation time
    pub external_id: String,

    /// Amount in the smallest currency unit
    pub amount: i64,

    /// Calendar day the salary belongs to
    pub date: NaiveDate,

    /// Payment status
    pub status: SalaryStatus,

    /// Creation method
    pub method: SalaryMethod,

    /// Admin who created the record
    pub added_by: Uuid,

    /// Creation timestamp (microsecond precision)
    pub created_at: DateTime<Utc>,
}

/// Input for creating a salary record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSalary {
    pub user_id: Uuid,
    pub user_name: String,
    pub external_id: String,
    pub amount: i64,
    pub date: NaiveDate,
    pub status: SalaryStatus,
    pub method: SalaryMethod,
    pub added_by: Uuid,
}

/// Sum of amounts for one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct StatusTotal {
    pub status: SalaryStatus,
    pub total: i64,
}

impl Salary {
    /// Creates a single salary record
    pub async fn create(pool: &PgPool, data: NewSalary) -> Result<Self, sqlx::Error> {
        let salary = sqlx::query_as::<_, Salary>(
            r#"
            INSERT INTO salaries (user_id, user_name, external_id, amount, date, status, method, added_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, user_name, external_id, amount, date, status, method,
                      added_by, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.user_name)
        .bind(data.external_id)
        .bind(data.amount)
        .bind(data.date)
        .bind(data.status)
        .bind(data.method)
        .bind(data.added_by)
        .fetch_one(pool)
        .await?;

        Ok(salary)
    }

    /// Inserts a batch of salary records in a single transaction
    ///
    /// Either every record is written or none is. Records are inserted in slice
    /// order, so later entries get later creation timestamps.
    pub async fn insert_batch(pool: &PgPool, batch: &[NewSalary]) -> Result<Vec<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut inserted = Vec::with_capacity(batch.len());

        for data in batch {
            let salary = sqlx::query_as::<_, Salary>(
                r#"
                INSERT INTO salaries (user_id, user_name, external_id, amount, date, status, method, added_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id, user_id, user_name, external_id, amount, date, status, method,
                          added_by, created_at
                "#,
            )
            .bind(data.user_id)
            .bind(&data.user_name)
            .bind(&data.external_id)
            .bind(data.amount)
            .bind(data.date)
            .bind(data.status)
            .bind(data.method)
            .bind(data.added_by)
            .fetch_one(&mut *tx)
            .await?;

            inserted.push(salary);
        }

        tx.commit().await?;

        Ok(inserted)
    }

    /// Finds a salary record by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let salary = sqlx::query_as::<_, Salary>(
            r#"
            SELECT id, user_id, user_name, external_id, amount, date, status, method,
                   added_by, created_at
            FROM salaries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(salary)
    }

    /// Changes the status of a salary record
    ///
    /// # Returns
    ///
    /// The updated record, or None if it doesn't exist
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: SalaryStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let salary = sqlx::query_as::<_, Salary>(
            r#"
            UPDATE salaries
            SET status = $2
            WHERE id = $1
            RETURNING id, user_id, user_name, external_id, amount, date, status, method,
                      added_by, created_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(salary)
    }

    /// Lists a user's most recent records, newest first
    pub async fn list_latest_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let salaries = sqlx::query_as::<_, Salary>(
            r#"
            SELECT id, user_id, user_name, external_id, amount, date, status, method,
                   added_by, created_at
            FROM salaries
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(salaries)
    }

    /// Lists a user's records strictly older than the `(created_at, id)` position
    pub async fn list_after(
        pool: &PgPool,
        user_id: Uuid,
        created_at: DateTime<Utc>,
        id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let salaries = sqlx::query_as::<_, Salary>(
            r#"
            SELECT id, user_id, user_name, external_id, amount, date, status, method,
                   added_by, created_at
            FROM salaries
            WHERE user_id = $1 AND (created_at, id) < ($2, $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(created_at)
        .bind(id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(salaries)
    }

    /// Sums a user's amounts for one calendar day
    pub async fn sum_for_user_on(
        pool: &PgPool,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM salaries WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    /// Sums a user's amounts on or after a calendar day
    pub async fn sum_for_user_since(
        pool: &PgPool,
        user_id: Uuid,
        from: NaiveDate,
    ) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM salaries WHERE user_id = $1 AND date >= $2",
        )
        .bind(user_id)
        .bind(from)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    /// Sums every record grouped by status
    ///
    /// Statuses with no records are absent from the result.
    pub async fn totals_by_status(pool: &PgPool) -> Result<Vec<StatusTotal>, sqlx::Error> {
        let totals = sqlx::query_as::<_, StatusTotal>(
            r#"
            SELECT status, COALESCE(SUM(amount), 0)::BIGINT AS total
            FROM salaries
            GROUP BY status
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&SalaryStatus::Cancelled).unwrap(), "\"cancelled\"");
        let status: SalaryStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(status, SalaryStatus::Paid);
        assert!(serde_json::from_str::<SalaryStatus>("\"refunded\"").is_err());
    }

    #[test]
    fn test_method_serde() {
        assert_eq!(
            serde_json::to_string(&SalaryMethod::SpreadsheetImport).unwrap(),
            "\"spreadsheet_import\""
        );
        assert_eq!(serde_json::to_string(&SalaryMethod::Manual).unwrap(), "\"manual\"");
    }

    #[test]
    fn test_date_wire_format() {
        let salary = Salary {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Le Van C".to_string(),
            external_id: "@levanc".to_string(),
            amount: 150_500,
            date: NaiveDate::from_ymd_opt(2025, 1, 9).unwrap(),
            status: SalaryStatus::Pending,
            method: SalaryMethod::Manual,
            added_by: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&salary).unwrap();
        assert_eq!(json["date"], "2025-01-09");
        assert_eq!(json["amount"], 150_500);
        assert_eq!(json["status"], "pending");
    }
}
