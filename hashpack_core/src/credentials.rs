//! Resolving logical server names to login credentials.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// A username/password pair for a remote host.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field(
                "password",
                &if self.password.is_empty() { "NO" } else { "YES" },
            )
            .finish()
    }
}

/// Anything that can look up credentials by server name.
pub trait CredentialSource {
    fn credentials_for(&self, server: &str) -> Option<Credentials>;
}

impl CredentialSource for HashMap<String, Credentials> {
    fn credentials_for(&self, server: &str) -> Option<Credentials> {
        self.get(server).cloned()
    }
}

/// Look up `server`, failing with a configuration error when it is unknown.
pub fn resolve<S: CredentialSource + ?Sized>(source: &S, server: &str) -> Result<Credentials> {
    source
        .credentials_for(server)
        .ok_or_else(|| Error::missing_credentials(server))
}

/// A server entry in the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub id: String,
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// User-level settings holding server credentials.
///
/// ```toml
/// [[servers]]
/// id = "assets"
/// username = "deploy"
/// password = "secret"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load settings from a file. A missing file yields empty settings.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        Self::parse(&content).map_err(|e| Error::invalid_settings(path, e.to_string()))
    }
}

impl CredentialSource for Settings {
    fn credentials_for(&self, server: &str) -> Option<Credentials> {
        self.servers
            .iter()
            .find(|entry| entry.id == server)
            .map(|entry| entry.credentials.clone())
    }
}
