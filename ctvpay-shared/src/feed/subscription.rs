/// Live feed subscriptions
///
/// Each subscription is one background task that owns a change listener and the
/// last window it sent. The task ends when its cancellation token fires, which
/// happens when:
///
/// - the [`FeedSubscription`] handle is dropped (the client disconnected), or
/// - the same user activates the same view again ([`FeedRegistry::activate`])
///
/// ```text
/// subscribe() ── listen (position captured) ── query window ── snapshot #1
///                      │
///                      └─ loop: changed? ── re-query ── diff ── snapshot #n
/// ```

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use super::window::{FeedSnapshot, WINDOW_SIZE};
use super::{FeedError, WindowSource};
use crate::changes::ChangeNotifier;
use crate::models::salary::Salary;

/// Tuning for subscriptions
#[derive(Debug, Clone, Copy)]
pub struct FeedConfig {
    /// Records in the live window
    pub window_size: usize,

    /// Longest single wait on the change stream before waiting again
    pub poll_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            poll_interval: Duration::from_secs(20),
        }
    }
}

/// Message delivered to the subscriber
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Snapshot(FeedSnapshot),

    /// The subscription failed and has ended
    Error(String),
}

/// Active subscriptions keyed by (user, view id)
#[derive(Default)]
pub struct FeedRegistry {
    active: Mutex<HashMap<(Uuid, String), CancellationToken>>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any subscription for the key and registers a fresh token
    pub fn activate(&self, user_id: Uuid, view: &str) -> CancellationToken {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());

        active.retain(|_, token| !token.is_cancelled());

        let token = CancellationToken::new();
        if let Some(previous) = active.insert((user_id, view.to_string()), token.clone()) {
            tracing::debug!(user_id = %user_id, view, "Cancelling previous feed subscription");
            previous.cancel();
        }

        token
    }

    /// Subscriptions that have not been cancelled
    pub fn active_count(&self) -> usize {
        let active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        active.values().filter(|t| !t.is_cancelled()).count()
    }

    /// Cancels every subscription; used on shutdown
    pub fn cancel_all(&self) {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        for token in active.values() {
            token.cancel();
        }
        active.clear();
    }
}

/// Handle to a running subscription
///
/// A stream of [`FeedEvent`]s. Dropping it stops the background task.
pub struct FeedSubscription {
    events: mpsc::Receiver<FeedEvent>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl FeedSubscription {
    /// Whether the subscription has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stream for FeedSubscription {
    type Item = FeedEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Starts a live subscription for one user's feed
///
/// Must be called from within a Tokio runtime.
pub fn subscribe(
    registry: &FeedRegistry,
    notifier: Arc<dyn ChangeNotifier>,
    source: Arc<dyn WindowSource>,
    user_id: Uuid,
    view: &str,
    config: FeedConfig,
) -> FeedSubscription {
    let token = registry.activate(user_id, view);
    let (tx, rx) = mpsc::channel(8);

    let task_token = token.clone();
    let view_id = view.to_string();
    tokio::spawn(async move {
        tracing::debug!(user_id = %user_id, view = %view_id, "Feed subscription started");

        if let Err(e) = run_feed(notifier, source, user_id, config, &task_token, &tx).await {
            tracing::warn!(user_id = %user_id, view = %view_id, error = %e, "Feed subscription failed");
            let _ = tx.send(FeedEvent::Error(e.to_string())).await;
        }

        tracing::debug!(user_id = %user_id, view = %view_id, "Feed subscription ended");
    });

    FeedSubscription {
        events: rx,
        _guard: token.clone().drop_guard(),
        token,
    }
}

async fn run_feed(
    notifier: Arc<dyn ChangeNotifier>,
    source: Arc<dyn WindowSource>,
    user_id: Uuid,
    config: FeedConfig,
    token: &CancellationToken,
    tx: &mpsc::Sender<FeedEvent>,
) -> Result<(), FeedError> {
    let mut listener = notifier.listen(user_id).await?;

    let mut window: Vec<Salary> = source.latest(user_id, config.window_size).await?;
    let first = FeedSnapshot::between(&[], &window, config.window_size);
    if tx.send(FeedEvent::Snapshot(first)).await.is_err() {
        return Ok(());
    }

    loop {
        let changed = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            changed = listener.changed(config.poll_interval) => changed?,
        };

        if !changed {
            continue;
        }

        let next = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            next = source.latest(user_id, config.window_size) => next?,
        };

        let snapshot = FeedSnapshot::between(&window, &next, config.window_size);
        window = next;

        if snapshot.changes.is_empty() {
            continue;
        }

        tracing::debug!(
            user_id = %user_id,
            changes = snapshot.changes.len(),
            size = snapshot.size,
            "Sending feed snapshot"
        );

        if tx.send(FeedEvent::Snapshot(snapshot)).await.is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::local::LocalChangeStream;
    use crate::changes::{ChangeNotice, ChangeReason};
    use crate::feed::window::tests::{record, records};
    use crate::feed::window::{FeedChange, FeedCursor};
    use async_trait::async_trait;
    use futures::StreamExt;

    #[derive(Default)]
    struct FakeSource {
        rows: Mutex<Vec<Salary>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl FakeSource {
        fn with(rows: Vec<Salary>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Default::default()
            }
        }

        fn push_newest(&self, row: Salary) {
            self.rows.lock().unwrap().insert(0, row);
        }
    }

    #[async_trait]
    impl WindowSource for FakeSource {
        async fn latest(&self, _user_id: Uuid, limit: usize) -> Result<Vec<Salary>, sqlx::Error> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(sqlx::Error::Protocol("query failed".into()));
            }
            Ok(self.rows.lock().unwrap().iter().take(limit).cloned().collect())
        }

        async fn after(
            &self,
            _user_id: Uuid,
            cursor: &FeedCursor,
            limit: usize,
        ) -> Result<Vec<Salary>, sqlx::Error> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| (r.created_at, r.id) < (cursor.created_at, cursor.id))
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn fast() -> FeedConfig {
        FeedConfig {
            window_size: WINDOW_SIZE,
            poll_interval: Duration::from_millis(20),
        }
    }

    async fn next_snapshot(sub: &mut FeedSubscription) -> FeedSnapshot {
        match tokio::time::timeout(Duration::from_secs(2), sub.next()).await {
            Ok(Some(FeedEvent::Snapshot(s))) => s,
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_snapshot_sent_even_when_empty() {
        let registry = FeedRegistry::new();
        let stream = Arc::new(LocalChangeStream::new());
        let source = Arc::new(FakeSource::default());

        let mut sub = subscribe(&registry, stream, source, Uuid::new_v4(), "home", fast());
        let snapshot = next_snapshot(&mut sub).await;

        assert!(snapshot.changes.is_empty());
        assert_eq!(snapshot.size, 0);
        assert!(!snapshot.has_more);
    }

    #[tokio::test]
    async fn test_change_notice_produces_diff() {
        let owner = Uuid::new_v4();
        let registry = FeedRegistry::new();
        let stream = Arc::new(LocalChangeStream::new());
        let source = Arc::new(FakeSource::with(records(owner, 20)));

        let mut sub = subscribe(&registry, stream.clone(), source.clone(), owner, "home", fast());
        let first = next_snapshot(&mut sub).await;
        assert_eq!(first.changes.len(), 20);
        assert!(first.has_more);

        let newest = record(owner, 500);
        source.push_newest(newest.clone());
        stream
            .publish(&ChangeNotice::new(owner, ChangeReason::SalaryCreated))
            .await
            .unwrap();

        let second = next_snapshot(&mut sub).await;
        assert_eq!(second.size, 20);
        assert!(second
            .changes
            .iter()
            .any(|c| matches!(c, FeedChange::Added { new_index: 0, record } if record.id == newest.id)));
        assert!(second
            .changes
            .iter()
            .any(|c| matches!(c, FeedChange::Removed { old_index: 19, .. })));
    }

    #[tokio::test]
    async fn test_reactivating_view_cancels_previous() {
        let owner = Uuid::new_v4();
        let registry = FeedRegistry::new();
        let stream = Arc::new(LocalChangeStream::new());
        let source = Arc::new(FakeSource::default());

        let mut first = subscribe(&registry, stream.clone(), source.clone(), owner, "home", fast());
        next_snapshot(&mut first).await;

        let mut second = subscribe(&registry, stream.clone(), source.clone(), owner, "home", fast());
        next_snapshot(&mut second).await;

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        let ended = tokio::time::timeout(Duration::from_secs(2), first.next()).await.unwrap();
        assert!(ended.is_none());
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn test_different_views_coexist() {
        let owner = Uuid::new_v4();
        let registry = FeedRegistry::new();
        let stream = Arc::new(LocalChangeStream::new());
        let source = Arc::new(FakeSource::default());

        let a = subscribe(&registry, stream.clone(), source.clone(), owner, "tab-a", fast());
        let b = subscribe(&registry, stream, source, owner, "tab-b", fast());

        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());
        assert_eq!(registry.active_count(), 2);
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels() {
        let registry = FeedRegistry::new();
        let stream = Arc::new(LocalChangeStream::new());
        let source = Arc::new(FakeSource::default());

        let sub = subscribe(&registry, stream, source, Uuid::new_v4(), "home", fast());
        assert_eq!(registry.active_count(), 1);

        drop(sub);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_query_failure_sends_error_and_ends() {
        let owner = Uuid::new_v4();
        let registry = FeedRegistry::new();
        let stream = Arc::new(LocalChangeStream::new());
        let source = Arc::new(FakeSource::default());

        let mut sub = subscribe(&registry, stream.clone(), source.clone(), owner, "home", fast());
        next_snapshot(&mut sub).await;

        source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        stream
            .publish(&ChangeNotice::new(owner, ChangeReason::SalaryCreated))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), sub.next()).await.unwrap();
        assert!(matches!(event, Some(FeedEvent::Error(_))));
        let end = tokio::time::timeout(Duration::from_secs(2), sub.next()).await.unwrap();
        assert!(end.is_none());
    }
}
