//! Error handling for the Plantation Management engine
//!
//! Every fallible operation returns [`AppResult`]. The HTTP layer maps
//! errors to responses through [`AppError::detail`].

use serde::Serialize;
use thiserror::Error;

use crate::services::cascade::CascadeEvent;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Cascade errors
    #[error("Cascade handler #{handler_index} failed on {event}: {source}")]
    CascadeHandler {
        event: Box<CascadeEvent>,
        handler_index: usize,
        source: Box<AppError>,
    },

    // Persistence errors
    #[error("Storage error: {0}")]
    StorageError(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

/// Error detail handed to the transport layer
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Validation failure on a specific input field
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::CascadeHandler { .. } => "CASCADE_HANDLER_ERROR",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// The innermost error, looking through cascade handler wrappers
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::CascadeHandler { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        let field = match self {
            AppError::Validation { field, .. } => Some(field.clone()),
            AppError::Conflict { resource, .. } => Some(resource.clone()),
            _ => None,
        };
        let message = match self {
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::InternalError(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        ErrorDetail {
            code: self.code().to_string(),
            message,
            field,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;
