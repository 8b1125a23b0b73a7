//! Connection settings for a [`Server`](crate::server::Server).
//!
//! | Option            | Default     |
//! |-------------------|-------------|
//! | `host`            | `localhost` |
//! | `port`            | `5984`      |
//! | `username`        | none        |
//! | `password`        | none        |
//! | `tls`             | `false`     |
//! | `uuid_cache_size` | `100`       |
//!
//! The struct deserializes with these defaults, so a partial JSON or TOML table is
//! enough:
//!
//! ```ignore
//! let config: ServerConfig = serde_json::from_str(r#"{"host": "couch", "tls": true}"#)?;
//! assert_eq!(config.port, 5984);
//! ```

use serde::Deserialize;

use crate::error::{LoveseatError, LoveseatResult};

/// Settings for reaching one database server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Selects the `https` scheme.
    pub tls: bool,
    /// Number of identifiers fetched from `/_uuids` per refill.
    pub uuid_cache_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5984,
            username: None,
            password: None,
            tls: false,
            uuid_cache_size: 100,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_uuid_cache_size(mut self, size: usize) -> Self {
        self.uuid_cache_size = size;
        self
    }

    /// Returns `scheme://host:port` without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };

        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Checks the settings before any request is made.
    ///
    /// # Errors
    ///
    /// Returns [`LoveseatError::Configuration`] for an empty host or a zero cache size.
    pub fn validate(&self) -> LoveseatResult<()> {
        if self.host.trim().is_empty() {
            return Err(LoveseatError::Configuration("host must not be empty".into()));
        }
        if self.uuid_cache_size == 0 {
            return Err(LoveseatError::Configuration(
                "uuid_cache_size must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
