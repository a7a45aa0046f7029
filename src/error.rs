use crate::config::ConfigError;
use std::io;
use thiserror::Error;

/// Errors that stop the application at startup or shutdown.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging could not be initialised: {0}")]
    Logging(String),
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}
