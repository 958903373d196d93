/// Database layer for CTV Pay
///
/// - `pool`: PostgreSQL connection pool with a health check
/// - `migrations`: embedded sqlx migrations from the workspace `migrations/` directory
///
/// Models live in the `models` module at crate root level.

pub mod migrations;
pub mod pool;
