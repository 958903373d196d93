/// Per-user change streams
///
/// Writers publish a [`ChangeNotice`] on the owner's stream after a salary record
/// is created or changed. Live feed subscriptions hold a [`ChangeListener`] and
/// re-query their window whenever it reports a change.
///
/// Two backends implement [`ChangeNotifier`]:
///
/// - [`crate::redis::change_stream::RedisChangeStream`]: Redis Streams, one
///   stream per user (`salary_changes:{user_id}`), shared by every API instance
/// - [`local::LocalChangeStream`]: in-process watch channels for a single instance
///
/// A listener records the stream position when it is created. Anything published
/// after that point is reported by the next [`ChangeListener::changed`] call, even
/// if it happened before the call started.

pub mod local;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::redis::client::RedisClientError;

/// Why a user's records changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    SalaryCreated,
    SalaryImported,
    SalaryStatusChanged,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::SalaryCreated => "salary_created",
            ChangeReason::SalaryImported => "salary_imported",
            ChangeReason::SalaryStatusChanged => "salary_status_changed",
        }
    }
}

/// A record on a user's change stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub user_id: Uuid,
    pub reason: ChangeReason,
    pub at: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn new(user_id: Uuid, reason: ChangeReason) -> Self {
        Self {
            user_id,
            reason,
            at: Utc::now(),
        }
    }
}

/// Change stream errors
#[derive(Debug, thiserror::Error)]
pub enum ChangeStreamError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Client(#[from] RedisClientError),

    /// The stream was shut down while a listener was waiting
    #[error("Change stream closed")]
    Closed,
}

/// Publishes change notices and opens listeners
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Appends a notice to the owner's stream
    async fn publish(&self, notice: &ChangeNotice) -> Result<(), ChangeStreamError>;

    /// Opens a listener positioned at the current end of the user's stream
    async fn listen(&self, user_id: Uuid) -> Result<Box<dyn ChangeListener>, ChangeStreamError>;

    /// Verifies the backend is reachable
    async fn health_check(&self) -> Result<(), ChangeStreamError>;

    /// Backend name for logs and `/health`
    fn backend(&self) -> &'static str;
}

/// Waits for changes on one user's stream
#[async_trait]
pub trait ChangeListener: Send {
    /// Waits up to `timeout` for a notice newer than the last one observed
    ///
    /// Returns `Ok(true)` when at least one notice arrived and `Ok(false)` on
    /// timeout. Several notices published between calls are reported once.
    async fn changed(&mut self, timeout: Duration) -> Result<bool, ChangeStreamError>;
}

/// Publishes a notice per owner after a committed write
///
/// Failures are logged at warn and swallowed: the write already succeeded and
/// the feed catches up on its next change.
pub async fn notify_owners(
    notifier: &Arc<dyn ChangeNotifier>,
    owners: &[Uuid],
    reason: ChangeReason,
) {
    let mut seen = std::collections::HashSet::new();

    for &user_id in owners {
        if !seen.insert(user_id) {
            continue;
        }

        let notice = ChangeNotice::new(user_id, reason);
        if let Err(e) = notifier.publish(&notice).await {
            tracing::warn!(
                user_id = %user_id,
                reason = reason.as_str(),
                backend = notifier.backend(),
                error = %e,
                "Failed to publish change notice"
            );
        }
    }
}
