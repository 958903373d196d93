/// Redis integration
///
/// - `client`: connection manager wrapper with health check
/// - `change_stream`: per-user change notices on Redis Streams
///
/// Redis is optional. Without `REDIS_URL` the API falls back to
/// [`crate::changes::local::LocalChangeStream`].

pub mod change_stream;
pub mod client;

pub use change_stream::{change_stream_key, RedisChangeStream};
pub use client::{RedisClient, RedisClientError, RedisConfig};
