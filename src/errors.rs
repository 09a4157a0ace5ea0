//! All errors that can occur in the driftsim library.

use std::fmt;

pub type Result<T> = std::result::Result<T, DriftError>;

#[derive(Debug)]
pub enum DriftError {
    ImplementationError(String),
    InitializationError(String),
    ReadError(String),
    CheckpointError(String),
    ExtinctionError { date: i32, date_string: String },
    IoError(std::io::Error),
}

impl fmt::Display for DriftError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DriftError::ImplementationError(message) => {
                write!(f, "ImplementationError: {}", message)
            }
            DriftError::InitializationError(message) => {
                write!(f, "InitializationError: {}", message)
            }
            DriftError::ReadError(message) => write!(f, "ReadError: {}", message),
            DriftError::CheckpointError(message) => write!(f, "CheckpointError: {}", message),
            DriftError::ExtinctionError { date, date_string } => write!(
                f,
                "ExtinctionError: the virus has gone extinct! Date: {} ({})",
                date_string, date
            ),
            DriftError::IoError(error) => write!(f, "IoError: {}", error),
        }
    }
}

impl std::error::Error for DriftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DriftError::IoError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DriftError {
    fn from(error: std::io::Error) -> Self {
        DriftError::IoError(error)
    }
}
