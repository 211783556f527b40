//! Connection configuration
//!
//! Sourced from the environment with defaults. The URI scheme selects the
//! backend: `neo4j://`, `neo4j+s://`, `bolt://` and `bolt+s://` go to Neo4j,
//! `sqlite://<path>` and `sqlite::memory:` to the embedded SQLite store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_URI: &str = "neo4j://localhost:7687";
pub const DEFAULT_USER: &str = "neo4j";
pub const DEFAULT_PASSWORD: &str = "neo4j";
pub const DEFAULT_DATABASE: &str = "neo4j";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported connection URI '{0}'")]
    UnsupportedUri(String),
    #[error("connection URI '{0}' needs the `neo4j` feature")]
    FeatureDisabled(String),
}

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

/// Backend selected by a connection URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Neo4j,
    Sqlite(PathBuf),
    SqliteMemory,
}

impl GraphConfig {
    /// Read `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD` and `NEO4J_DATABASE`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            uri: lookup("NEO4J_URI").unwrap_or(defaults.uri),
            user: lookup("NEO4J_USER").unwrap_or(defaults.user),
            password: lookup("NEO4J_PASSWORD").unwrap_or(defaults.password),
            database: lookup("NEO4J_DATABASE").unwrap_or(defaults.database),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Resolve the backend from the URI scheme
    pub fn backend(&self) -> Result<Backend, ConfigError> {
        let uri = self.uri.trim();
        if uri == "sqlite::memory:" {
            return Ok(Backend::SqliteMemory);
        }
        if let Some(path) = uri.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(ConfigError::UnsupportedUri(self.uri.clone()));
            }
            return Ok(Backend::Sqlite(PathBuf::from(path)));
        }

        let scheme = uri.split("://").next().unwrap_or_default();
        match scheme {
            "neo4j" | "neo4j+s" | "neo4j+ssc" | "bolt" | "bolt+s" | "bolt+ssc" if uri.contains("://") => {
                Ok(Backend::Neo4j)
            }
            _ => Err(ConfigError::UnsupportedUri(self.uri.clone())),
        }
    }

    /// URI with any embedded credentials removed, for logs
    pub fn redacted_uri(&self) -> String {
        match self.uri.split_once("://") {
            Some((scheme, rest)) => match rest.rsplit_once('@') {
                Some((_, host)) => format!("{}://{}", scheme, host),
                None => self.uri.clone(),
            },
            None => self.uri.clone(),
        }
    }
}
