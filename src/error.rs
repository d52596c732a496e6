use std::{io::Error as IO_ERROR, string::FromUtf8Error as FROM_UTF8_ERROR};

use csv::Error as CSV_ERROR;
use reqwest::Error as REQWEST_ERROR;
use serde_json::Error as JSON_ERROR;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;

/// Failure of one call against the remote computation service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Transport(#[from] REQWEST_ERROR),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Service responded with status {0}")]
    Status(u16),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] JSON_ERROR),
}

impl ServiceError {
    /// Error text the service itself put in the response, if any.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            ServiceError::Rejected { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    Csv(#[from] CSV_ERROR),

    #[error("{0}")]
    JsonError(#[from] JSON_ERROR),

    #[error("{0}")]
    FromUtf8Error(#[from] FROM_UTF8_ERROR),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] REQWEST_ERROR),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),
}
