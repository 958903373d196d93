//! # CTV Pay Shared Library
//!
//! Domain types and business logic for the collaborator salary portal, used by
//! the `ctvpay-api` server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their queries
//! - `db`: Connection pool and migrations
//! - `auth`: Passwords, tokens, session loading, admin checks, navigation guard
//! - `import`: Spreadsheet salary import
//! - `export`: User directory export
//! - `feed`: Live salary window and load-more pagination
//! - `changes`: Per-user change notices (in-process or Redis)
//! - `redis`: Redis client and the stream-backed change notifier
//! - `dashboard`: Dashboard totals

pub mod auth;
pub mod changes;
pub mod dashboard;
pub mod db;
pub mod export;
pub mod feed;
pub mod import;
pub mod models;
pub mod redis;

/// Current version of the CTV Pay shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
