use petkeeper_persist::{FileStoreConfig, SqlStoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("command name must not be empty")]
    EmptyCommand,
    #[error("at least one storage backend must be enabled")]
    NoBackend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub check: bool,
    pub auto_download: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check: true,
            auto_download: false,
        }
    }
}

/// Service configuration, read from `config.yml`.
///
/// Every option has a default so partial files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetConfig {
    /// Base command name; the admin command appends `admin`.
    pub command: String,
    pub file: FileStoreConfig,
    pub sql: SqlStoreConfig,
    pub updates: UpdateConfig,
    /// Re-key name-keyed records under unique ids.
    pub migrate_legacy_identity: bool,
    /// Name to unique id directory used by identity migration.
    pub players: PathBuf,
}

impl Default for PetConfig {
    fn default() -> Self {
        Self {
            command: "pet".to_string(),
            file: FileStoreConfig::default(),
            sql: SqlStoreConfig::default(),
            updates: UpdateConfig::default(),
            migrate_legacy_identity: true,
            players: PathBuf::from("players.yml"),
        }
    }
}

impl PetConfig {
    /// Load and validate. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Self::default(),
            Ok(text) => serde_yaml::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if !self.file.enabled && !self.sql.enabled {
            return Err(ConfigError::NoBackend);
        }
        Ok(())
    }

    pub fn admin_command(&self) -> String {
        format!("{}admin", self.command)
    }

    /// Resolve relative store paths against `dir`.
    pub fn rooted_at(mut self, dir: &Path) -> Self {
        for path in [&mut self.file.path, &mut self.sql.path, &mut self.players] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
        self
    }
}
