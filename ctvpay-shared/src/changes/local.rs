/// In-process change stream
///
/// One `tokio::sync::watch` channel per user carries a version counter. Publishing
/// bumps the counter; a listener subscribed before the bump sees it as changed.
/// Only usable when a single API instance serves every request.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use super::{ChangeListener, ChangeNotice, ChangeNotifier, ChangeStreamError};

/// Watch-channel change stream
#[derive(Default)]
pub struct LocalChangeStream {
    channels: Mutex<HashMap<Uuid, watch::Sender<u64>>>,
}

impl LocalChangeStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sender<R>(&self, user_id: Uuid, f: impl FnOnce(&watch::Sender<u64>) -> R) -> R {
        let mut channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        let sender = channels
            .entry(user_id)
            .or_insert_with(|| watch::channel(0).0);
        f(sender)
    }

    /// Number of notices published for a user so far
    pub fn version(&self, user_id: Uuid) -> u64 {
        self.with_sender(user_id, |tx| *tx.borrow())
    }
}

#[async_trait]
impl ChangeNotifier for LocalChangeStream {
    async fn publish(&self, notice: &ChangeNotice) -> Result<(), ChangeStreamError> {
        self.with_sender(notice.user_id, |tx| tx.send_modify(|v| *v += 1));

        tracing::debug!(
            user_id = %notice.user_id,
            reason = notice.reason.as_str(),
            "Published local change notice"
        );
        Ok(())
    }

    async fn listen(&self, user_id: Uuid) -> Result<Box<dyn ChangeListener>, ChangeStreamError> {
        let receiver = self.with_sender(user_id, |tx| tx.subscribe());
        Ok(Box::new(LocalListener { receiver }))
    }

    async fn health_check(&self) -> Result<(), ChangeStreamError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

struct LocalListener {
    receiver: watch::Receiver<u64>,
}

#[async_trait]
impl ChangeListener for LocalListener {
    async fn changed(&mut self, timeout: Duration) -> Result<bool, ChangeStreamError> {
        match tokio::time::timeout(timeout, self.receiver.changed()).await {
            Ok(Ok(())) => {
                self.receiver.borrow_and_update();
                Ok(true)
            }
            Ok(Err(_)) => Err(ChangeStreamError::Closed),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeReason;

    #[tokio::test]
    async fn test_change_before_wait_is_not_lost() {
        let stream = LocalChangeStream::new();
        let user = Uuid::new_v4();

        let mut listener = stream.listen(user).await.unwrap();
        stream
            .publish(&ChangeNotice::new(user, ChangeReason::SalaryCreated))
            .await
            .unwrap();

        assert!(listener.changed(Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_timeout_without_change() {
        let stream = LocalChangeStream::new();
        let mut listener = stream.listen(Uuid::new_v4()).await.unwrap();

        assert!(!listener.changed(Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_users_do_not_wake_listener() {
        let stream = LocalChangeStream::new();
        let mut listener = stream.listen(Uuid::new_v4()).await.unwrap();

        stream
            .publish(&ChangeNotice::new(Uuid::new_v4(), ChangeReason::SalaryCreated))
            .await
            .unwrap();

        assert!(!listener.changed(Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_burst_reported_once() {
        let stream = LocalChangeStream::new();
        let user = Uuid::new_v4();
        let mut listener = stream.listen(user).await.unwrap();

        for _ in 0..3 {
            stream
                .publish(&ChangeNotice::new(user, ChangeReason::SalaryImported))
                .await
                .unwrap();
        }

        assert!(listener.changed(Duration::from_millis(10)).await.unwrap());
        assert!(!listener.changed(Duration::from_millis(10)).await.unwrap());
        assert_eq!(stream.version(user), 3);
    }
}
