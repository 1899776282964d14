//! Store configuration.
//!
//! Names the database file and the connection settings applied to every
//! connection the engine opens.
//!
//! # Example YAML
//!
//! ```yaml
//! directory: /var/lib/app
//! name: inventory
//! busy_timeout_ms: 5000
//! foreign_keys: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OrmError, Result};

static DATABASE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("static regex must compile"));

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_foreign_keys() -> bool {
    true
}

/// Location and connection settings of a store.
///
/// # Examples
///
/// ```
/// use tablemap_sqlite::StoreConfig;
///
/// let config = StoreConfig::new("/tmp/data", "inventory");
/// assert!(config.database_path().ends_with("inventory.sqlite"));
/// assert_eq!(config.busy_timeout_ms, 5000);
/// assert!(config.validate().is_ok());
///
/// assert!(StoreConfig::new("/tmp/data", "no-dashes").validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the database file. Created on open.
    pub directory: PathBuf,
    /// Database name; the file is `<directory>/<name>.sqlite`.
    pub name: String,
    /// How long a connection waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Enforce foreign keys on every connection. Table rebuilds always
    /// disable enforcement for their duration.
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
}

impl StoreConfig {
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            foreign_keys: default_foreign_keys(),
        }
    }

    /// Path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.directory.join(format!("{}.sqlite", self.name))
    }

    /// Checks the database name.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidDatabaseName`] unless the name is made of
    /// ASCII alphanumerics and underscores only.
    pub fn validate(&self) -> Result<()> {
        if !DATABASE_NAME.is_match(&self.name) {
            return Err(OrmError::InvalidDatabaseName(self.name.clone()));
        }
        Ok(())
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](OrmError::IoError) if the file cannot be read,
    /// or [`YamlError`](OrmError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
