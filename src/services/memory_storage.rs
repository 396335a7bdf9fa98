use crate::{
    models::file::{FileMeta, UploadedFile},
    services::storage_engine::{FileInfo, FileStream, StorageEngine, StorageError},
};
use async_trait::async_trait;
use axum::http::request::Parts;
use bytes::BytesMut;
use futures::StreamExt;

/// Keeps every accepted file in memory as `UploadedFile::buffer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStorage;

impl MemoryStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageEngine for MemoryStorage {
    async fn handle_file(
        &self,
        _req: &Parts,
        _file: &FileMeta,
        mut stream: FileStream<'_>,
    ) -> Result<FileInfo, StorageError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(FileInfo::in_memory(buffer.freeze()))
    }

    async fn remove_file(&self, _file: &UploadedFile) -> Result<(), StorageError> {
        Ok(())
    }
}
