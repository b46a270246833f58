use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppError {
    MissingFile,
    InvalidFileType(String),
    FileTooLarge(u64),
    EmptySheet,
    InternalParseError(String),
    ConfigError(String),
    Internal(String),
    IoError(String),
}

impl AppError {
    /// Errors caused by what the client sent, as opposed to failures on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingFile
                | AppError::InvalidFileType(_)
                | AppError::FileTooLarge(_)
                | AppError::EmptySheet
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingFile => write!(f, "No file uploaded"),
            AppError::InvalidFileType(name) => write!(
                f,
                "Invalid file type: {} (only .xlsx, .xls and .csv are accepted)",
                name
            ),
            AppError::FileTooLarge(limit) => {
                write!(f, "File too large: the limit is {} bytes", limit)
            }
            AppError::EmptySheet => write!(f, "The spreadsheet is empty"),
            AppError::InternalParseError(msg) => write!(f, "Failed to parse spreadsheet: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
