//! Descriptors for uploaded file parts.

use crate::services::storage_engine::FileInfo;
use bytes::Bytes;
use serde::Serialize;
use std::path::PathBuf;

/// What is known about a file part before any of its bytes are stored.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FileMeta {
    /// Form field the file was sent under.
    pub field_name: String,

    /// Filename as sent by the client (basename unless `preserve_path` is set).
    pub original_name: String,

    /// Content-Transfer-Encoding of the part, `7bit` when absent.
    pub encoding: String,

    /// Declared MIME type of the part, `text/plain` when absent.
    pub mime_type: String,
}

/// A stored file: the part's metadata merged with what storage reported.
#[derive(Serialize, Clone, Debug)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    pub encoding: String,
    pub mime_type: String,

    /// Size in bytes.
    pub size: u64,

    /// Directory the file was written to (disk storage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,

    /// Name of the file within `destination` (disk storage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Full path of the stored file (disk storage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// File contents (memory storage).
    #[serde(skip)]
    pub buffer: Option<Bytes>,
}

impl UploadedFile {
    pub fn new(meta: FileMeta, info: FileInfo) -> Self {
        Self {
            field_name: meta.field_name,
            original_name: meta.original_name,
            encoding: meta.encoding,
            mime_type: meta.mime_type,
            size: info.size,
            destination: info.destination,
            filename: info.filename,
            path: info.path,
            buffer: info.buffer,
        }
    }
}
