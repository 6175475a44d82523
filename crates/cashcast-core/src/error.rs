//! Error types for cashcast
//!
//! Every variant maps to a closed [`ErrorKind`]. Recovery is keyed on the
//! kind, never on message text.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid provider type: {0}")]
    InvalidProviderType(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("No active provider connection")]
    NotConnected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Data processing error: {0}")]
    DataProcessing(String),

    #[error("Model has not been trained")]
    NotTrained,

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("Insight error: {0}")]
    Insight(String),

    #[error("Knowledge store update error: {0}")]
    Update(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::DataProcessing(format!("Malformed provider response: {}", e))
        } else {
            Error::Connectivity(e.to_string())
        }
    }
}

/// Closed classification of [`Error`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidProviderType,
    InvalidCredentials,
    NotConnected,
    InvalidInput,
    Connectivity,
    DataProcessing,
    NotTrained,
    Prediction,
    Insight,
    Update,
    Config,
    Io,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidProviderType => "invalid_provider_type",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::DataProcessing => "data_processing",
            ErrorKind::NotTrained => "not_trained",
            ErrorKind::Prediction => "prediction",
            ErrorKind::Insight => "insight",
            ErrorKind::Update => "update",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
        }
    }

    /// Usage errors that must never be handed to the recovery state machine
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidProviderType
                | ErrorKind::InvalidCredentials
                | ErrorKind::NotConnected
                | ErrorKind::InvalidInput
                | ErrorKind::NotTrained
                | ErrorKind::Config
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidProviderType(_) => ErrorKind::InvalidProviderType,
            Error::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Connectivity(_) => ErrorKind::Connectivity,
            Error::DataProcessing(_) => ErrorKind::DataProcessing,
            Error::NotTrained => ErrorKind::NotTrained,
            Error::Prediction(_) => ErrorKind::Prediction,
            Error::Insight(_) => ErrorKind::Insight,
            Error::Update(_) => ErrorKind::Update,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Serialization,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
