/// Configuration management for the API server
///
/// Configuration is read from environment variables (a `.env` file is loaded
/// first when present).
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `RUN_MIGRATIONS`: Apply embedded migrations on startup (default: true)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `REDIS_URL`: Redis for change notices; in-process notices when unset
/// - `IMPORT_ID_COLUMN`, `IMPORT_AMOUNT_COLUMN`: Import header names
/// - `IMPORT_AMOUNT_SCALE`: Multiplier for imported amounts (default: 1000)
/// - `LOGIN_PATH`, `HOME_PATH`: Navigation guard targets
/// - `LEDGER_UTC_OFFSET_MINUTES`: Offset used for "today" (default: 0)
///
/// # Example
///
/// ```no_run
/// use ctvpay_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use ctvpay_shared::import::amount::DEFAULT_AMOUNT_SCALE;
use ctvpay_shared::import::spreadsheet::{DEFAULT_AMOUNT_COLUMN, DEFAULT_ID_COLUMN};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Redis URL for the change stream
    pub redis_url: Option<String>,

    pub import: ImportConfig,
    pub portal: PortalConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 characters. Generate with `openssl rand -hex 32`.
    #[serde(skip_serializing)]
    pub secret: String,
}

/// Spreadsheet import settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub id_column: String,
    pub amount_column: String,
    pub amount_scale: i64,
}

/// Navigation and calendar settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub login_path: String,
    pub home_path: String,
    pub ledger_utc_offset_minutes: i32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            amount_column: DEFAULT_AMOUNT_COLUMN.to_string(),
            amount_scale: DEFAULT_AMOUNT_SCALE,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_path: "/login/".to_string(),
            home_path: "/home/".to_string(),
            ledger_utc_offset_minutes: 0,
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        _ => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the JWT secret is too short.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let amount_scale = parse_var("IMPORT_AMOUNT_SCALE", DEFAULT_AMOUNT_SCALE)?;
        if amount_scale <= 0 {
            anyhow::bail!("IMPORT_AMOUNT_SCALE must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port: parse_var("API_PORT", 8080u16)?,
                cors_origins: parse_origins(&var_or("CORS_ORIGINS", "*")),
                production: parse_var("PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10u32)?,
                run_migrations: parse_var("RUN_MIGRATIONS", true)?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            import: ImportConfig {
                id_column: var_or("IMPORT_ID_COLUMN", DEFAULT_ID_COLUMN),
                amount_column: var_or("IMPORT_AMOUNT_COLUMN", DEFAULT_AMOUNT_COLUMN),
                amount_scale,
            },
            portal: PortalConfig {
                login_path: var_or("LOGIN_PATH", "/login/"),
                home_path: var_or("HOME_PATH", "/home/"),
                ledger_utc_offset_minutes: parse_var("LEDGER_UTC_OFFSET_MINUTES", 0i32)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin is allowed
    pub fn cors_allows_any(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
                run_migrations: false,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            },
            redis_url: None,
            import: ImportConfig::default(),
            portal: PortalConfig::default(),
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(sample().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://a.example , ,https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(sample().cors_allows_any());
    }

    #[test]
    fn test_import_defaults() {
        let import = ImportConfig::default();
        assert_eq!(import.id_column, "Row Labels");
        assert_eq!(import.amount_column, "Sum of LƯƠNG");
        assert_eq!(import.amount_scale, 1000);
    }

    #[test]
    fn test_secret_not_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json["jwt"].get("secret").is_none());
    }
}
