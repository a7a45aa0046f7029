use crate::models::Priority;
use crate::view::{SortKey, ViewParams};
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "homework-tui";
const CONFIG_ENV: &str = "HOMEWORK_TUI_CONFIG";
const DATA_DIR_ENV: &str = "HOMEWORK_TUI_DATA_DIR";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SUBJECT: &str = "Other";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no data directory found; set {}", DATA_DIR_ENV)]
    NoDataDir,
}

// Shape of config.toml; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    data_dir: Option<PathBuf>,
    log_level: Option<String>,
    sort: Option<SortKey>,
    show_completed: Option<bool>,
    default_priority: Option<Priority>,
    default_subject: Option<String>,
}

// Startup settings: TOML file, then env overrides
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub sort: SortKey,
    pub show_completed: bool,
    pub default_priority: Priority,
    pub default_subject: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml")));
        let file = match path {
            Some(path) => read_config_file(&path)?,
            None => FileConfig::default(),
        };

        Self::from_parts(
            file,
            env::var_os(DATA_DIR_ENV).map(PathBuf::from),
            env::var("RUST_LOG").ok(),
            dirs::data_dir(),
        )
    }

    pub(crate) fn from_parts(
        file: FileConfig,
        data_dir_env: Option<PathBuf>,
        rust_log: Option<String>,
        platform_data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let data_dir = data_dir_env
            .or(file.data_dir)
            .or_else(|| platform_data_dir.map(|dir| dir.join(APP_DIR)))
            .ok_or(ConfigError::NoDataDir)?;

        let log_level = rust_log
            .filter(|level| !level.trim().is_empty())
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let default_subject = file
            .default_subject
            .filter(|subject| !subject.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

        Ok(Config {
            data_dir,
            log_level,
            sort: file.sort.unwrap_or_default(),
            show_completed: file.show_completed.unwrap_or(true),
            default_priority: file.default_priority.unwrap_or_default(),
            default_subject,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn view_params(&self) -> ViewParams {
        ViewParams {
            show_completed: self.show_completed,
            sort_key: self.sort,
            ..ViewParams::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
