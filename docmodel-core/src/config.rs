//! Connection settings for a document store.
//!
//! [`StoreConfig`] is plain data: it can be built in code with the setter methods or
//! deserialized from whatever configuration source the host application uses.
//!
//! ```ignore
//! use docmodel::config::StoreConfig;
//!
//! let config = StoreConfig::default()
//!     .host("db.internal")
//!     .database("shop")
//!     .credentials("app", "secret");
//!
//! assert_eq!(config.connection_uri(), "mongodb://db.internal:27017");
//! ```

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DATABASE: &str = "docmodel";

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Server host (default: `localhost`).
    pub host: String,
    /// Server port (default: `27017`).
    pub port: u16,
    /// Database holding the collections (default: `docmodel`).
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Full connection string; when set, `host` and `port` are ignored.
    pub uri: Option<String>,
    /// Application name reported to the server.
    pub app_name: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            username: None,
            password: None,
            uri: None,
            app_name: None,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets both username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Returns the connection string: the explicit `uri` if set, otherwise one built from
    /// host and port.
    pub fn connection_uri(&self) -> String {
        match &self.uri {
            Some(uri) => uri.clone(),
            None => format!("mongodb://{}:{}", self.host, self.port),
        }
    }

    /// Returns `(username, password)` only when both are present.
    ///
    /// A lone username or a lone password is ignored and the connection is unauthenticated.
    pub fn login(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 27017);
        assert_eq!(config.database, "docmodel");
        assert_eq!(config.connection_uri(), "mongodb://localhost:27017");
        assert_eq!(config.login(), None);
    }

    #[test]
    fn test_uri_overrides_host_and_port() {
        let config = StoreConfig::new()
            .host("ignored")
            .port(1)
            .uri("mongodb://replica-a,replica-b/?replicaSet=rs0");

        assert_eq!(
            config.connection_uri(),
            "mongodb://replica-a,replica-b/?replicaSet=rs0"
        );
    }

    #[test]
    fn test_login_requires_both_parts() {
        let mut config = StoreConfig::new();
        config.username = Some("app".to_string());
        assert_eq!(config.login(), None);

        config.username = None;
        config.password = Some("secret".to_string());
        assert_eq!(config.login(), None);

        let config = StoreConfig::new().credentials("app", "secret");
        assert_eq!(config.login(), Some(("app", "secret")));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: StoreConfig = bson::de::deserialize_from_document(bson::doc! {
            "host": "db.internal",
            "database": "shop",
        })
        .unwrap();

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 27017);
        assert_eq!(config.database, "shop");
        assert_eq!(config.uri, None);
    }
}
