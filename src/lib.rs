//! Multipart/form-data uploads for async middleware chains.
//!
//! A [`Multer`] instance owns the upload configuration (storage engine,
//! limits, file filter) and hands out one [`Extractor`] per selector:
//! `single`, `array`, `fields`, `any` and `none`. An extractor consumes a raw
//! `http::Request`, streams its parts into storage and leaves an
//! [`UploadedForm`] in the request extensions.
//!
//! [`adapt`] wraps a `Multer` so that every selector instead yields an
//! [`Adapted`] middleware step taking `(context, next)`: it runs the
//! extractor, copies the results onto the context's request view and
//! continues the chain.
//!
//! ```no_run
//! use axum::{Router, middleware::from_fn_with_state, routing::post};
//! use upload_bridge::{Limits, Multer, adapt, upload_middleware};
//!
//! let multer = Multer::builder()
//!     .limits(Limits { file_size: Some(1024 * 1024), ..Limits::default() })
//!     .build();
//! let upload = adapt(multer);
//!
//! let app: Router = Router::new().route(
//!     "/profile",
//!     post(|| async { "ok" })
//!         .layer(from_fn_with_state(upload.single("avatar"), upload_middleware)),
//! );
//! ```

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use errors::{AppError, ErrorCode, StorageFailure, UploadError, UploadErrorKind};
pub use middleware::adapter::{
    Adapted, AdaptedMulter, Context, RequestView, UploadContext, adapt, upload_middleware,
};
pub use models::file::{FileMeta, UploadedFile};
pub use models::form::{FormBody, Files, UploadedForm, append_field};
pub use models::selector::{FieldSpec, Selector};
pub use services::disk_storage::DiskStorage;
pub use services::memory_storage::MemoryStorage;
pub use services::storage_engine::{FileInfo, FileStream, StorageEngine, StorageError};
pub use services::upload_service::{BoxError, Extractor, FileFilter, Limits, Multer, MulterBuilder};
