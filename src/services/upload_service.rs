//! src/services/upload_service.rs
//!
//! The extraction engine. A `Multer` holds the process-wide configuration
//! (storage engine, limits, file filter) and builds one `Extractor` per
//! selector. Each `Extractor::handle` call streams a single request's parts:
//! text fields into the form body, files through the filter into storage.
//! Wire-level parsing (boundaries, part headers) is done by the `multer`
//! crate.

use crate::{
    errors::{ErrorCode, StorageFailure, UploadError, UploadErrorKind},
    models::{
        file::{FileMeta, UploadedFile},
        form::{FormBody, Files, UploadedForm, append_field},
        selector::{FieldSpec, FileStrategy, Selector},
    },
    services::{
        disk_storage::DiskStorage,
        memory_storage::MemoryStorage,
        storage_engine::{FileStream, StorageEngine},
    },
};
use axum::{
    body::Body,
    http::{
        HeaderMap, Request,
        header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING},
        request::Parts,
    },
};
use futures::StreamExt;
use std::{
    collections::{BTreeMap, HashMap},
    io::{self, ErrorKind},
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Default longest accepted field name, in characters.
pub const DEFAULT_FIELD_NAME_SIZE: usize = 100;

/// Default largest accepted text field value (1 MiB).
pub const DEFAULT_FIELD_SIZE: u64 = 1024 * 1024;

/// Decides per file whether it is stored (`Ok(true)`), silently skipped
/// (`Ok(false)`) or whether the whole upload fails (`Err`).
pub trait FileFilter: Send + Sync {
    fn filter(&self, req: &Parts, file: &FileMeta) -> Result<bool, BoxError>;
}

impl<F> FileFilter for F
where
    F: Fn(&Parts, &FileMeta) -> Result<bool, BoxError> + Send + Sync,
{
    fn filter(&self, req: &Parts, file: &FileMeta) -> Result<bool, BoxError> {
        self(req, file)
    }
}

/// Upper bounds enforced while streaming a form. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Longest field name, in characters.
    pub field_name_size: usize,
    /// Largest text field value, in bytes.
    pub field_size: u64,
    /// Number of text fields.
    pub fields: Option<usize>,
    /// Largest file, in bytes.
    pub file_size: Option<u64>,
    /// Number of file parts.
    pub files: Option<usize>,
    /// Number of parts (fields and files together).
    pub parts: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            field_name_size: DEFAULT_FIELD_NAME_SIZE,
            field_size: DEFAULT_FIELD_SIZE,
            fields: None,
            file_size: None,
            files: None,
            parts: None,
        }
    }
}

fn exceeds(limit: Option<usize>, count: usize) -> bool {
    limit.is_some_and(|limit| count > limit)
}

struct Inner {
    storage: Arc<dyn StorageEngine>,
    limits: Limits,
    file_filter: Option<Arc<dyn FileFilter>>,
    preserve_path: bool,
}

/// Configured upload parser. Cheap to clone; clones share configuration.
#[derive(Clone)]
pub struct Multer {
    inner: Arc<Inner>,
}

#[derive(Default)]
pub struct MulterBuilder {
    storage: Option<Arc<dyn StorageEngine>>,
    limits: Limits,
    file_filter: Option<Arc<dyn FileFilter>>,
    preserve_path: bool,
}

impl MulterBuilder {
    /// Use a custom storage engine.
    pub fn storage(mut self, storage: impl StorageEngine + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Store files on disk under `dest`, creating it if needed.
    pub fn dest(self, dest: impl Into<PathBuf>) -> io::Result<Self> {
        Ok(self.storage(DiskStorage::new(dest)?))
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn file_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Parts, &FileMeta) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.file_filter = Some(Arc::new(filter));
        self
    }

    /// Keep directory components of client-supplied filenames.
    pub fn preserve_path(mut self, preserve: bool) -> Self {
        self.preserve_path = preserve;
        self
    }

    /// Without an explicit storage engine files are kept in memory.
    pub fn build(self) -> Multer {
        Multer {
            inner: Arc::new(Inner {
                storage: self
                    .storage
                    .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
                limits: self.limits,
                file_filter: self.file_filter,
                preserve_path: self.preserve_path,
            }),
        }
    }
}

impl Default for Multer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Multer {
    /// In-memory storage and default limits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MulterBuilder {
        MulterBuilder::default()
    }

    pub fn limits(&self) -> &Limits {
        &self.inner.limits
    }

    /// At most one file under `name`, exposed as `file`.
    pub fn single(&self, name: impl Into<String>) -> Extractor {
        self.extractor(Selector::Single(name.into()))
    }

    /// Files under `name` (at most `max_count` when given), exposed as a list.
    pub fn array(&self, name: impl Into<String>, max_count: Option<usize>) -> Extractor {
        self.extractor(Selector::Array(name.into(), max_count))
    }

    /// Files under each listed field, exposed keyed by field name.
    pub fn fields(&self, fields: impl IntoIterator<Item = FieldSpec>) -> Extractor {
        self.extractor(Selector::Fields(fields.into_iter().collect()))
    }

    /// Any file under any field, exposed as a list.
    pub fn any(&self) -> Extractor {
        self.extractor(Selector::Any)
    }

    /// Text fields only; any file fails with `LIMIT_UNEXPECTED_FILE`.
    pub fn none(&self) -> Extractor {
        self.extractor(Selector::None)
    }

    pub fn extractor(&self, selector: Selector) -> Extractor {
        Extractor {
            inner: self.inner.clone(),
            selector: Arc::new(selector),
        }
    }
}

/// One extraction entry point bound to a `Multer`'s configuration.
#[derive(Clone)]
pub struct Extractor {
    inner: Arc<Inner>,
    selector: Arc<Selector>,
}

impl Extractor {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Parse a multipart request.
    ///
    /// Non-multipart requests (or requests without a body) come back
    /// untouched. Otherwise the body is consumed and the request is returned
    /// with an empty body and an [`UploadedForm`] extension. On failure every
    /// file stored so far is removed again.
    pub async fn handle(&self, req: Request<Body>) -> Result<Request<Body>, UploadError> {
        if !is_multipart(req.headers()) {
            debug!(selector = self.selector.name(), "skipping non-multipart request");
            return Ok(req);
        }

        let (mut parts, body) = req.into_parts();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let boundary = multer::parse_boundary(content_type)?;
        let mut multipart = multer::Multipart::new(body.into_data_stream(), boundary);

        let mut session = Session::new(&self.inner, &self.selector, &parts);
        match session.read(&mut multipart).await {
            Ok(()) => {
                let form = session.finish();
                debug!(
                    selector = self.selector.name(),
                    fields = form.body.as_ref().map_or(0, |b| b.len()),
                    files = form.file.iter().count() + form.files.as_ref().map_or(0, Files::len),
                    "multipart form parsed"
                );
                parts.extensions.insert(form);
                Ok(Request::from_parts(parts, Body::empty()))
            }
            Err(err) => {
                let failures = session.abort().await;
                warn!(
                    selector = self.selector.name(),
                    code = err.code().unwrap_or("-"),
                    field = err.field().unwrap_or("-"),
                    "aborting upload: {}",
                    err
                );
                Err(err.with_storage_errors(failures))
            }
        }
    }
}

/// `multipart/*` with a body, as announced by the headers.
fn is_multipart(headers: &HeaderMap) -> bool {
    let has_body = headers.contains_key(TRANSFER_ENCODING)
        || headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().parse::<u64>().is_ok());
    if !has_body {
        return false;
    }

    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media| media.trim().to_ascii_lowercase().starts_with("multipart/"))
}

/// Why a file stream stopped early.
enum StreamFault {
    TooLarge,
    Parse(multer::Error),
}

/// Per-request parsing state.
struct Session<'a> {
    inner: &'a Inner,
    strategy: FileStrategy,
    allowance: Option<HashMap<String, Option<usize>>>,
    req: &'a Parts,
    body: FormBody,
    file: Option<UploadedFile>,
    files: Option<Files>,
    stored: Vec<UploadedFile>,
    parts: usize,
    fields: usize,
    file_parts: usize,
}

impl<'a> Session<'a> {
    fn new(inner: &'a Inner, selector: &Selector, req: &'a Parts) -> Self {
        let strategy = selector.strategy();
        let files = match strategy {
            FileStrategy::List => Some(Files::List(Vec::new())),
            FileStrategy::Keyed => Some(Files::Fields(BTreeMap::new())),
            FileStrategy::Value | FileStrategy::Discard => None,
        };
        Self {
            inner,
            strategy,
            allowance: selector.allowance(),
            req,
            body: FormBody::new(),
            file: None,
            files,
            stored: Vec::new(),
            parts: 0,
            fields: 0,
            file_parts: 0,
        }
    }

    async fn read(&mut self, multipart: &mut multer::Multipart<'static>) -> Result<(), UploadError> {
        while let Some(field) = multipart.next_field().await? {
            self.parts += 1;
            if exceeds(self.inner.limits.parts, self.parts) {
                return Err(UploadError::limit(ErrorCode::LimitPartCount, None));
            }

            let name = field.name().map(str::to_string);
            match field.file_name().map(str::to_string) {
                Some(original_name) if !original_name.is_empty() => {
                    self.read_file(field, name, original_name).await?
                }
                // empty file inputs and unnamed octet streams carry no file
                Some(_) => skip_part(name.as_deref()),
                None if is_octet_stream(&field) => skip_part(name.as_deref()),
                None => self.read_field(field, name).await?,
            }
        }
        Ok(())
    }

    fn check_name(&self, name: Option<String>) -> Result<String, UploadError> {
        let Some(name) = name else {
            return Err(UploadError::limit(ErrorCode::MissingFieldName, None));
        };
        if name.chars().count() > self.inner.limits.field_name_size {
            return Err(UploadError::limit(ErrorCode::LimitFieldKey, Some(&name)));
        }
        Ok(name)
    }

    async fn read_field(
        &mut self,
        mut field: multer::Field<'static>,
        name: Option<String>,
    ) -> Result<(), UploadError> {
        self.fields += 1;
        if exceeds(self.inner.limits.fields, self.fields) {
            return Err(UploadError::limit(ErrorCode::LimitFieldCount, None));
        }
        let name = self.check_name(name)?;

        let mut value = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if (value.len() + chunk.len()) as u64 > self.inner.limits.field_size {
                return Err(UploadError::limit(ErrorCode::LimitFieldValue, Some(&name)));
            }
            value.extend_from_slice(&chunk);
        }

        debug!(field = %name, bytes = value.len(), "text field");
        append_field(&mut self.body, &name, String::from_utf8_lossy(&value));
        Ok(())
    }

    async fn read_file(
        &mut self,
        field: multer::Field<'static>,
        name: Option<String>,
        original_name: String,
    ) -> Result<(), UploadError> {
        self.file_parts += 1;
        if exceeds(self.inner.limits.files, self.file_parts) {
            return Err(UploadError::limit(ErrorCode::LimitFileCount, None));
        }
        let name = self.check_name(name)?;

        let meta = FileMeta {
            field_name: name.clone(),
            original_name: if self.inner.preserve_path {
                original_name
            } else {
                basename(&original_name).to_string()
            },
            encoding: field
                .headers()
                .get("content-transfer-encoding")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("7bit")
                .to_string(),
            mime_type: field
                .content_type()
                .map(|mime| mime.to_string())
                .unwrap_or_else(|| "text/plain".to_string()),
        };

        if let Some(allowance) = self.allowance.as_mut() {
            match allowance.get_mut(&name) {
                Some(Some(left)) if *left > 0 => *left -= 1,
                Some(None) => {}
                _ => return Err(UploadError::limit(ErrorCode::LimitUnexpectedFile, Some(&name))),
            }
        }

        if let Some(filter) = &self.inner.file_filter {
            match filter.filter(self.req, &meta) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(field = %name, file = %meta.original_name, "file skipped by filter");
                    return Ok(());
                }
                Err(error) => {
                    return Err(UploadErrorKind::Filter { field: name, error }.into());
                }
            }
        }

        let mut fault = None;
        let stored = {
            let stream = limit_stream(field, self.inner.limits.file_size, &mut fault);
            self.inner.storage.handle_file(self.req, &meta, stream).await
        };

        let fault = match (stored, fault) {
            (Ok(info), None) => {
                let uploaded = UploadedFile::new(meta, info);
                debug!(field = %name, file = %uploaded.original_name, size = uploaded.size, "file stored");
                self.collect(uploaded);
                return Ok(());
            }
            (Err(error), None) => {
                return Err(UploadErrorKind::Storage { field: name, error }.into());
            }
            // storage stopped early or ignored the stream error; what it kept
            // is removed on abort
            (Ok(info), Some(fault)) => {
                self.stored.push(UploadedFile::new(meta, info));
                fault
            }
            (Err(_), Some(fault)) => fault,
        };

        match fault {
            StreamFault::TooLarge => Err(UploadError::limit(ErrorCode::LimitFileSize, Some(&name))),
            StreamFault::Parse(err) => Err(err.into()),
        }
    }

    fn collect(&mut self, file: UploadedFile) {
        self.stored.push(file.clone());
        match self.strategy {
            FileStrategy::Value => self.file = Some(file),
            FileStrategy::List | FileStrategy::Keyed => {
                if let Some(files) = self.files.as_mut() {
                    files.push(file);
                }
            }
            FileStrategy::Discard => {}
        }
    }

    fn finish(self) -> UploadedForm {
        UploadedForm {
            body: Some(self.body),
            file: self.file,
            files: self.files,
        }
    }

    /// Remove every stored file, reporting the ones storage could not remove.
    async fn abort(self) -> Vec<StorageFailure> {
        let mut failures = Vec::new();
        for file in self.stored {
            if let Err(error) = self.inner.storage.remove_file(&file).await {
                failures.push(StorageFailure {
                    field: file.field_name.clone(),
                    file,
                    error,
                });
            }
        }
        failures
    }
}

/// Log a part that carries no file. The part itself is dropped unread; the
/// parser skips its bytes on the next `next_field` call.
fn skip_part(name: Option<&str>) {
    debug!(field = name.unwrap_or("-"), "skipping part without a filename");
}

/// `application/octet-stream` parts are files even without a filename.
fn is_octet_stream(field: &multer::Field<'_>) -> bool {
    field
        .content_type()
        .is_some_and(|mime| mime.essence_str() == "application/octet-stream")
}

/// Forward a file part to storage, failing once `limit` bytes are exceeded.
/// The reason for an early stop is left in `fault`.
fn limit_stream<'f>(
    field: multer::Field<'static>,
    limit: Option<u64>,
    fault: &'f mut Option<StreamFault>,
) -> FileStream<'f> {
    let mut seen: u64 = 0;
    field
        .map(move |chunk| {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    let message = err.to_string();
                    fault.get_or_insert(StreamFault::Parse(err));
                    return Err(io::Error::other(message));
                }
            };
            seen += chunk.len() as u64;
            if limit.is_some_and(|limit| seen > limit) {
                fault.get_or_insert(StreamFault::TooLarge);
                return Err(io::Error::from(ErrorKind::FileTooLarge));
            }
            Ok(chunk)
        })
        .boxed()
}

fn basename(name: &str) -> &str {
    name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str, length: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        if let Some(length) = length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from_str(length).unwrap());
        }
        headers
    }

    #[test]
    fn detects_multipart_with_body() {
        assert!(is_multipart(&headers("multipart/form-data; boundary=x", Some("10"))));
        assert!(is_multipart(&headers("Multipart/Mixed; boundary=x", Some("0"))));
        assert!(!is_multipart(&headers("multipart/form-data; boundary=x", None)));
        assert!(!is_multipart(&headers("application/x-www-form-urlencoded", Some("11"))));
    }

    #[test]
    fn chunked_requests_count_as_having_a_body() {
        let mut headers = headers("multipart/form-data; boundary=x", None);
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        assert!(is_multipart(&headers));
    }

    #[test]
    fn basename_strips_both_separators() {
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("C:\\docs\\d.txt"), "d.txt");
        assert_eq!(basename("plain.txt"), "plain.txt");
    }

    #[test]
    fn default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.field_name_size, 100);
        assert_eq!(limits.field_size, 1024 * 1024);
        assert!(limits.file_size.is_none());
        assert!(exceeds(Some(1), 2));
        assert!(!exceeds(Some(1), 1));
        assert!(!exceeds(None, usize::MAX));
    }
}
