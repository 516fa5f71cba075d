//! Project configuration (`hashpack.toml`) and its layering with CLI flags.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "hashpack.toml";

/// Default output root.
pub const DEFAULT_OUTPUT: &str = "target/assets";

/// Default hash algorithm name.
pub const DEFAULT_ALGORITHM: &str = "sha1";

/// Contents of `hashpack.toml`. Every field is optional; flags win.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Logical asset id written to the manifest.
    pub id: Option<String>,
    /// Source roots, in order.
    pub sources: Vec<PathBuf>,
    /// Output root (wiped on every build).
    pub output: Option<PathBuf>,
    /// Object subdirectory inside the output root.
    pub data_dir: Option<String>,
    /// Hash algorithm name.
    pub algorithm: Option<String>,
    /// Archive destination.
    pub archive: Option<PathBuf>,
    /// Compare bytes when two files hash the same.
    pub verify_collisions: Option<bool>,
    /// Credentials file.
    pub settings: Option<PathBuf>,
    pub remote: Option<RemoteConfig>,
}

/// `[remote]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Host, optionally with `:port`.
    pub host: Option<String>,
    /// Logical server name looked up in the settings file.
    pub server: Option<String>,
}

impl ProjectConfig {
    /// Load the config file.
    ///
    /// An explicit path must exist. Without one, `./hashpack.toml` is used if
    /// present, otherwise an empty config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        // Relative paths in the file are relative to the file itself.
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.rebase(base))
    }

    /// Parse config text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn rebase(mut self, base: &Path) -> Self {
        if base.as_os_str().is_empty() {
            return self;
        }
        let join = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        self.sources = self.sources.into_iter().map(join).collect();
        self.output = self.output.map(join);
        self.archive = self.archive.map(join);
        self.settings = self.settings.map(join);
        self
    }

    /// Output root: flag, then file, then default.
    pub fn output(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }

    /// Algorithm name: flag, then file, then default.
    pub fn algorithm(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.algorithm.clone())
            .unwrap_or_else(|| DEFAULT_ALGORITHM.to_string())
    }

    /// Data directory name: flag, then file, then default.
    pub fn data_dir(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.data_dir.clone())
            .unwrap_or_else(|| hashpack_core::DEFAULT_DATA_DIR.to_string())
    }

    /// Source roots: flags replace the file's list entirely.
    pub fn sources(&self, flags: Vec<PathBuf>) -> Vec<PathBuf> {
        if flags.is_empty() {
            self.sources.clone()
        } else {
            flags
        }
    }

    /// Asset id: flag, then file. There is no default.
    pub fn id(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.id.clone())
    }

    /// Archive path: flag, then file, then `<output parent>/<id>-assets.tar.zst`.
    pub fn archive(&self, flag: Option<PathBuf>, output: &Path, id: &str) -> PathBuf {
        flag.or_else(|| self.archive.clone()).unwrap_or_else(|| {
            let parent = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            parent.join(format!(
                "{}-assets.{}",
                id,
                hashpack_core::ARCHIVE_EXTENSION
            ))
        })
    }

    /// Remote host: flag, then `[remote]`.
    pub fn host(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.remote.as_ref().and_then(|r| r.host.clone()))
    }

    /// Logical server name: flag, then `[remote]`.
    pub fn server(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.remote.as_ref().and_then(|r| r.server.clone()))
    }

    /// Settings file: flag, then file, then `~/.hashpack/settings.toml`.
    pub fn settings(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.settings.clone())
            .or_else(|| dirs::home_dir().map(|home| home.join(".hashpack").join("settings.toml")))
    }
}
