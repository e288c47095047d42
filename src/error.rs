use crate::adapters::transport::TransportError;
use crate::config::SettingsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Media reference has no file name: {0:?}")]
    NoFileName(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
