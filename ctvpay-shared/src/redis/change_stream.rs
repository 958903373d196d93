/// Redis Streams backend for per-user change notices
///
/// ```text
/// admin write ──XADD MAXLEN ~ 100──> salary_changes:{user_id}
///                                        │
///                 XREVRANGE + - COUNT 1  │  (listener start position)
///                 XREAD BLOCK ... id     ▼
///                               feed subscription (dedicated connection)
/// ```
///
/// Publishing uses the shared connection manager with a short retry/backoff loop.
/// Each listener opens its own connection because `XREAD BLOCK` occupies the
/// connection for the whole wait.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use uuid::Uuid;

use super::client::RedisClient;
use crate::changes::{ChangeListener, ChangeNotice, ChangeNotifier, ChangeStreamError};

/// Entries kept per user stream (approximate trim)
pub const DEFAULT_MAX_LEN: usize = 100;

const MAX_PUBLISH_RETRIES: u32 = 2;
const BASE_RETRY_DELAY_MS: u64 = 50;

/// Stream key for a user's change notices
pub fn change_stream_key(user_id: Uuid) -> String {
    format!("salary_changes:{user_id}")
}

/// Change notifier backed by Redis Streams
#[derive(Clone)]
pub struct RedisChangeStream {
    client: RedisClient,
    max_len: usize,
}

impl RedisChangeStream {
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    pub fn with_max_len(client: RedisClient, max_len: usize) -> Self {
        Self { client, max_len }
    }

    async fn xadd(&self, key: &str, notice: &ChangeNotice) -> Result<String, redis::RedisError> {
        let at = notice.at.to_rfc3339();
        let fields = [("reason", notice.reason.as_str()), ("at", at.as_str())];

        let mut attempt = 0;
        loop {
            let mut conn = self.client.connection();
            match conn
                .xadd_maxlen(key, StreamMaxlen::Approx(self.max_len), "*", &fields[..])
                .await
            {
                Ok(id) => return Ok(id),
                Err(e) if attempt < MAX_PUBLISH_RETRIES => {
                    attempt += 1;
                    let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
                    tracing::warn!(
                        stream_key = %key,
                        attempt,
                        delay_ms,
                        error = %e,
                        "XADD failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ChangeNotifier for RedisChangeStream {
    async fn publish(&self, notice: &ChangeNotice) -> Result<(), ChangeStreamError> {
        let key = change_stream_key(notice.user_id);
        let stream_id = self.xadd(&key, notice).await?;

        tracing::debug!(
            user_id = %notice.user_id,
            reason = notice.reason.as_str(),
            stream_id = %stream_id,
            "Published change notice"
        );
        Ok(())
    }

    async fn listen(&self, user_id: Uuid) -> Result<Box<dyn ChangeListener>, ChangeStreamError> {
        let key = change_stream_key(user_id);

        let mut conn = self.client.connection();
        let newest: StreamRangeReply = conn.xrevrange_count(&key, "+", "-", 1).await?;
        let last_id = newest
            .ids
            .first()
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| "0-0".to_string());

        let conn = self.client.dedicated_connection().await?;

        Ok(Box::new(RedisListener { conn, key, last_id }))
    }

    async fn health_check(&self) -> Result<(), ChangeStreamError> {
        if self.client.ping().await? {
            Ok(())
        } else {
            Err(ChangeStreamError::Closed)
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

struct RedisListener {
    conn: MultiplexedConnection,
    key: String,
    last_id: String,
}

#[async_trait]
impl ChangeListener for RedisListener {
    async fn changed(&mut self, timeout: Duration) -> Result<bool, ChangeStreamError> {
        let block_ms = timeout.as_millis().clamp(1, usize::MAX as u128) as usize;
        let opts = StreamReadOptions::default().count(DEFAULT_MAX_LEN).block(block_ms);

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[self.key.as_str()][..], &[self.last_id.as_str()][..], &opts)
            .await?;

        let newest = reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .last();

        match newest {
            Some(entry) => {
                self.last_id = entry.id;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeReason;
    use crate::redis::client::RedisConfig;

    #[test]
    fn test_change_stream_key() {
        let id = Uuid::nil();
        assert_eq!(
            change_stream_key(id),
            "salary_changes:00000000-0000-0000-0000-000000000000"
        );
    }

    async fn stream() -> RedisChangeStream {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        RedisChangeStream::new(RedisClient::new(RedisConfig::new(url)).await.unwrap())
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_listener_sees_notice_published_after_listen() {
        let stream = stream().await;
        let user = Uuid::new_v4();

        let mut listener = stream.listen(user).await.unwrap();
        stream
            .publish(&ChangeNotice::new(user, ChangeReason::SalaryCreated))
            .await
            .unwrap();

        assert!(listener.changed(Duration::from_millis(500)).await.unwrap());
        assert!(!listener.changed(Duration::from_millis(50)).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_listener_ignores_history() {
        let stream = stream().await;
        let user = Uuid::new_v4();

        stream
            .publish(&ChangeNotice::new(user, ChangeReason::SalaryCreated))
            .await
            .unwrap();

        let mut listener = stream.listen(user).await.unwrap();
        assert!(!listener.changed(Duration::from_millis(50)).await.unwrap());
    }
}
