//! Database connection settings.
//!
//! Loaded from a JSON file shaped like:
//! ```json
//! {
//!   "database": {
//!     "host": "localhost",
//!     "port": 5432,
//!     "user": "transit",
//!     "password": "p@ss word",
//!     "database": "gtfs"
//!   }
//! }
//! ```
//! or from `GTFS_DB_*` environment variables.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Deserialize)]
struct ConfigFile {
    database: DatabaseConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl DatabaseConfig {
    /// Loads the `database` section of a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(content)?;
        Ok(file.database)
    }

    /// Reads `GTFS_DB_HOST`, `GTFS_DB_PORT`, `GTFS_DB_USER`, `GTFS_DB_PASSWORD`
    /// and `GTFS_DB_NAME`. Host and port have defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |key: &'static str| lookup(key).ok_or(ConfigError::MissingEnv(key));

        let port = match lookup("GTFS_DB_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: lookup("GTFS_DB_HOST").unwrap_or_else(default_host),
            port,
            user: require("GTFS_DB_USER")?,
            password: require("GTFS_DB_PASSWORD")?,
            database: require("GTFS_DB_NAME")?,
        })
    }

    /// `postgresql://` locator with the password percent-encoded.
    pub fn connection_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user,
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            self.database
        )
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}
