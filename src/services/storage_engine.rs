//! The storage seam: where accepted file parts are written.

use crate::models::file::{FileMeta, UploadedFile};
use async_trait::async_trait;
use axum::http::request::Parts;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;

/// Body of one file part. Fails with `ErrorKind::FileTooLarge` once the
/// configured `file_size` limit is crossed.
pub type FileStream<'a> = BoxStream<'a, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not store `{}`: {source}", .path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Failure raised by a custom engine, carrying its own code.
    #[error("{message}")]
    Engine { code: String, message: String },
}

impl StorageError {
    pub fn engine(code: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Engine {
            code: code.into(),
            message: message.into(),
        }
    }

    /// POSIX-style code for I/O failures, the engine's own code otherwise.
    pub fn code(&self) -> &str {
        match self {
            StorageError::Path { source, .. } | StorageError::Io(source) => io_code(source),
            StorageError::Engine { code, .. } => code.as_str(),
        }
    }

    /// Path the failure happened at, when known.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            StorageError::Path { path, .. } => Some(path),
            _ => None,
        }
    }
}

fn io_code(err: &io::Error) -> &'static str {
    match err.kind() {
        ErrorKind::NotFound => "ENOENT",
        ErrorKind::PermissionDenied => "EACCES",
        ErrorKind::AlreadyExists => "EEXIST",
        ErrorKind::DirectoryNotEmpty => "ENOTEMPTY",
        ErrorKind::StorageFull => "ENOSPC",
        ErrorKind::FileTooLarge => "EFBIG",
        _ => "EIO",
    }
}

/// What a storage engine reports for a stored file.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub size: u64,
    pub destination: Option<PathBuf>,
    pub filename: Option<String>,
    pub path: Option<PathBuf>,
    pub buffer: Option<Bytes>,
}

impl FileInfo {
    pub fn on_disk(destination: PathBuf, filename: String, size: u64) -> Self {
        let path = destination.join(&filename);
        Self {
            size,
            destination: Some(destination),
            filename: Some(filename),
            path: Some(path),
            buffer: None,
        }
    }

    pub fn in_memory(buffer: Bytes) -> Self {
        Self {
            size: buffer.len() as u64,
            buffer: Some(buffer),
            ..Self::default()
        }
    }
}

/// A place to put uploaded files.
///
/// One engine instance serves every request of a [`crate::Multer`], possibly
/// concurrently.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Consume `stream` and store it. On error nothing should be left behind.
    async fn handle_file(
        &self,
        req: &Parts,
        file: &FileMeta,
        stream: FileStream<'_>,
    ) -> Result<FileInfo, StorageError>;

    /// Undo a previous `handle_file`, used when a later part fails.
    async fn remove_file(&self, file: &UploadedFile) -> Result<(), StorageError>;
}
