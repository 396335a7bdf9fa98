use crate::{models::file::UploadedFile, services::storage_engine::StorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{error::Error as StdError, fmt};
use thiserror::Error;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Upload failures never leak their message to the client; the details go to
/// the log and the response is a plain 500.
impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        tracing::error!(
            code = err.code().unwrap_or("-"),
            field = err.field().unwrap_or("-"),
            storage_errors = err.storage_errors().len(),
            "upload failed: {}",
            err
        );
        AppError::internal("Internal Server Error")
    }
}

/// Machine-readable reasons for rejecting a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    LimitPartCount,
    LimitFileSize,
    LimitFileCount,
    LimitFieldKey,
    LimitFieldValue,
    LimitFieldCount,
    LimitUnexpectedFile,
    MissingFieldName,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::LimitPartCount => "LIMIT_PART_COUNT",
            ErrorCode::LimitFileSize => "LIMIT_FILE_SIZE",
            ErrorCode::LimitFileCount => "LIMIT_FILE_COUNT",
            ErrorCode::LimitFieldKey => "LIMIT_FIELD_KEY",
            ErrorCode::LimitFieldValue => "LIMIT_FIELD_VALUE",
            ErrorCode::LimitFieldCount => "LIMIT_FIELD_COUNT",
            ErrorCode::LimitUnexpectedFile => "LIMIT_UNEXPECTED_FILE",
            ErrorCode::MissingFieldName => "MISSING_FIELD_NAME",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorCode::LimitPartCount => "Too many parts",
            ErrorCode::LimitFileSize => "File too large",
            ErrorCode::LimitFileCount => "Too many files",
            ErrorCode::LimitFieldKey => "Field name too long",
            ErrorCode::LimitFieldValue => "Field value too long",
            ErrorCode::LimitFieldCount => "Too many fields",
            ErrorCode::LimitUnexpectedFile => "Unexpected field",
            ErrorCode::MissingFieldName => "Field name missing",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Error)]
pub enum UploadErrorKind {
    /// A configured limit or the selector's file expectations were violated.
    #[error("{code}")]
    Limit { code: ErrorCode, field: Option<String> },

    /// The body is not well-formed multipart data.
    #[error(transparent)]
    Multipart(#[from] multer::Error),

    /// The storage engine failed while storing a file.
    #[error("{error}")]
    Storage {
        field: String,
        #[source]
        error: StorageError,
    },

    /// The file filter rejected a file with an error.
    #[error("{error}")]
    Filter {
        field: String,
        #[source]
        error: Box<dyn StdError + Send + Sync>,
    },
}

/// A file that storage could not remove while an upload was being aborted.
#[derive(Debug)]
pub struct StorageFailure {
    pub field: String,
    pub file: UploadedFile,
    pub error: StorageError,
}

/// Error surfaced by an extractor, and by every adapted middleware unchanged.
#[derive(Debug)]
pub struct UploadError {
    kind: UploadErrorKind,
    storage_errors: Vec<StorageFailure>,
}

impl UploadError {
    pub fn new(kind: UploadErrorKind) -> Self {
        Self {
            kind,
            storage_errors: Vec::new(),
        }
    }

    pub fn limit(code: ErrorCode, field: Option<&str>) -> Self {
        Self::new(UploadErrorKind::Limit {
            code,
            field: field.map(str::to_string),
        })
    }

    pub(crate) fn with_storage_errors(mut self, storage_errors: Vec<StorageFailure>) -> Self {
        self.storage_errors = storage_errors;
        self
    }

    pub fn kind(&self) -> &UploadErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> UploadErrorKind {
        self.kind
    }

    /// `LIMIT_*` codes for limit errors, the storage code (`ENOENT`, ...) for
    /// storage errors, `None` otherwise.
    pub fn code(&self) -> Option<&str> {
        match &self.kind {
            UploadErrorKind::Limit { code, .. } => Some(code.as_str()),
            UploadErrorKind::Storage { error, .. } => Some(error.code()),
            UploadErrorKind::Multipart(_) | UploadErrorKind::Filter { .. } => None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.kind {
            UploadErrorKind::Limit { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The form field the failure is attributed to, if any.
    pub fn field(&self) -> Option<&str> {
        match &self.kind {
            UploadErrorKind::Limit { field, .. } => field.as_deref(),
            UploadErrorKind::Storage { field, .. } | UploadErrorKind::Filter { field, .. } => {
                Some(field)
            }
            UploadErrorKind::Multipart(_) => None,
        }
    }

    /// Files stored before the failure that could not be cleaned up.
    pub fn storage_errors(&self) -> &[StorageFailure] {
        &self.storage_errors
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl StdError for UploadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.kind.source()
    }
}

impl From<UploadErrorKind> for UploadError {
    fn from(kind: UploadErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<multer::Error> for UploadError {
    fn from(err: multer::Error) -> Self {
        Self::new(UploadErrorKind::Multipart(err))
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn limit_errors_expose_code_field_and_message() {
        let err = UploadError::limit(ErrorCode::LimitFileSize, Some("avatar"));
        assert_eq!(err.code(), Some("LIMIT_FILE_SIZE"));
        assert_eq!(err.field(), Some("avatar"));
        assert_eq!(err.to_string(), "File too large");
        assert!(err.storage_errors().is_empty());
    }

    #[test]
    fn storage_errors_report_io_codes() {
        let err = UploadError::new(UploadErrorKind::Storage {
            field: "tiny0".into(),
            error: StorageError::Path {
                path: "/nowhere/file".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        });
        assert_eq!(err.code(), Some("ENOENT"));
        assert_eq!(err.field(), Some("tiny0"));
        assert!(err.source().is_some());
    }

    #[test]
    fn filter_errors_keep_their_message() {
        let err = UploadError::new(UploadErrorKind::Filter {
            field: "test".into(),
            error: "Fake error".into(),
        });
        assert_eq!(err.to_string(), "Fake error");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn upload_errors_become_opaque_500s() {
        let app: AppError = UploadError::limit(ErrorCode::LimitUnexpectedFile, Some("x")).into();
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.message, "Internal Server Error");
    }
}
