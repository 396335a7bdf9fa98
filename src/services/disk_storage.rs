//! Disk storage: streams each accepted file to `destination/filename`.
//!
//! The destination is either a fixed directory, created when the engine is
//! built, or resolved per file by a callback (in which case it must already
//! exist). Filenames default to 32 random hex characters.

use crate::{
    models::file::{FileMeta, UploadedFile},
    services::storage_engine::{FileInfo, FileStream, StorageEngine, StorageError},
};
use async_trait::async_trait;
use axum::http::request::Parts;
use futures::StreamExt;
use std::{fmt, io, path::PathBuf, sync::Arc};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

type DestinationFn = dyn Fn(&Parts, &FileMeta) -> io::Result<PathBuf> + Send + Sync;
type FilenameFn = dyn Fn(&Parts, &FileMeta) -> io::Result<String> + Send + Sync;

#[derive(Clone)]
enum Destination {
    Fixed(PathBuf),
    Resolve(Arc<DestinationFn>),
}

#[derive(Clone)]
pub struct DiskStorage {
    destination: Destination,
    filename: Arc<FilenameFn>,
}

impl DiskStorage {
    /// Store files under `destination`, creating the directory if needed.
    pub fn new(destination: impl Into<PathBuf>) -> io::Result<Self> {
        let destination = destination.into();
        std::fs::create_dir_all(&destination)?;
        Ok(Self {
            destination: Destination::Fixed(destination),
            filename: Arc::new(|_, _| Ok(random_filename())),
        })
    }

    /// Resolve the directory for every file. The directory is not created.
    pub fn with_destination<F>(resolve: F) -> Self
    where
        F: Fn(&Parts, &FileMeta) -> io::Result<PathBuf> + Send + Sync + 'static,
    {
        Self {
            destination: Destination::Resolve(Arc::new(resolve)),
            filename: Arc::new(|_, _| Ok(random_filename())),
        }
    }

    /// Replace the default random filename.
    pub fn filename<F>(mut self, name: F) -> Self
    where
        F: Fn(&Parts, &FileMeta) -> io::Result<String> + Send + Sync + 'static,
    {
        self.filename = Arc::new(name);
        self
    }

    fn destination_for(&self, req: &Parts, file: &FileMeta) -> io::Result<PathBuf> {
        match &self.destination {
            Destination::Fixed(path) => Ok(path.clone()),
            Destination::Resolve(resolve) => resolve(req, file),
        }
    }
}

impl fmt::Debug for DiskStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let destination = match &self.destination {
            Destination::Fixed(path) => path.display().to_string(),
            Destination::Resolve(_) => "<per file>".to_string(),
        };
        f.debug_struct("DiskStorage")
            .field("destination", &destination)
            .finish_non_exhaustive()
    }
}

fn random_filename() -> String {
    Uuid::new_v4().simple().to_string()
}

#[async_trait]
impl StorageEngine for DiskStorage {
    async fn handle_file(
        &self,
        req: &Parts,
        file: &FileMeta,
        mut stream: FileStream<'_>,
    ) -> Result<FileInfo, StorageError> {
        let destination = self.destination_for(req, file)?;
        let filename = (self.filename)(req, file)?;
        let path = destination.join(&filename);

        let mut out = File::create(&path)
            .await
            .map_err(|source| StorageError::Path {
                path: path.clone(),
                source,
            })?;

        let mut written: u64 = 0;
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(source) => {
                    drop(out);
                    let _ = fs::remove_file(&path).await;
                    return Err(StorageError::Path { path, source });
                }
            };
            written += chunk.len() as u64;
            if let Err(source) = out.write_all(&chunk).await {
                drop(out);
                let _ = fs::remove_file(&path).await;
                return Err(StorageError::Path { path, source });
            }
        }
        if let Err(source) = out.flush().await {
            drop(out);
            let _ = fs::remove_file(&path).await;
            return Err(StorageError::Path { path, source });
        }

        debug!("stored {} ({} bytes) at {}", file.original_name, written, path.display());
        Ok(FileInfo::on_disk(destination, filename, written))
    }

    async fn remove_file(&self, file: &UploadedFile) -> Result<(), StorageError> {
        let Some(path) = &file.path else {
            return Ok(());
        };
        fs::remove_file(path)
            .await
            .map_err(|source| StorageError::Path {
                path: path.clone(),
                source,
            })
    }
}
