/// Database models for CTV Pay
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: Collaborator and admin accounts with their profile fields
/// - `salary`: Salary ledger records
/// - `announcement`: Read-only announcements
///
/// # Example
///
/// ```no_run
/// use ctvpay_shared::models::salary::Salary;
/// use ctvpay_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let latest = Salary::list_latest_for_user(&pool, Uuid::new_v4(), 20).await?;
/// # Ok(())
/// # }
/// ```

pub mod announcement;
pub mod salary;
pub mod user;
