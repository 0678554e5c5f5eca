use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const API_URL_ENV: &str = "DBMAKER_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub api_url: String,
    pub sql_sync_delay_ms: u64,
    pub autosave_delay_ms: u64,
    pub saved_reset_ms: u64,
    pub error_reset_ms: u64,
    pub state_path: PathBuf,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            sql_sync_delay_ms: 1000,
            autosave_delay_ms: 3000,
            saved_reset_ms: 2000,
            error_reset_ms: 3000,
            state_path: PathBuf::from(".dbmaker").join("state.toml"),
        }
    }
}

impl EditorConfig {
    pub fn sql_sync_delay(&self) -> Duration {
        Duration::from_millis(self.sql_sync_delay_ms)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn saved_reset(&self) -> Duration {
        Duration::from_millis(self.saved_reset_ms)
    }

    pub fn error_reset(&self) -> Duration {
        Duration::from_millis(self.error_reset_ms)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("dbmaker.toml")
}

/// Read the config file (defaults when absent), then apply `DBMAKER_API_URL`.
pub fn load_config(path: Option<&Path>) -> Result<EditorConfig, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    let mut config = if path.exists() {
        let contents = read(&path)?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?
    } else {
        EditorConfig::default()
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            config.api_url = url;
        }
    }
    Ok(config)
}

/// Small persistent record kept between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalState {
    pub last_opened_schema_id: Option<String>,
}

impl LocalState {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = read(path)?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(io_err)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbmaker.toml");
        std::fs::write(&path, "autosave_delay_ms = 500\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.autosave_delay(), Duration::from_millis(500));
        assert_eq!(config.sql_sync_delay(), Duration::from_millis(1000));
        assert_eq!(config.saved_reset_ms, 2000);
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();

        assert_eq!(config.autosave_delay_ms, 3000);
        assert_eq!(config.error_reset_ms, 3000);
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbmaker.toml");
        std::fs::write(&path, "autosave_delay_ms = \"soon\"").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_local_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        assert_eq!(LocalState::load(&path).unwrap(), LocalState::default());

        let state = LocalState {
            last_opened_schema_id: Some("abc".to_string()),
        };
        state.save(&path).unwrap();
        assert_eq!(LocalState::load(&path).unwrap(), state);
    }
}
