//! Defines the demo upload routes.
//!
//! ## Structure
//! - **Probes**
//!   - `GET  /healthz`: liveness
//!   - `GET  /readyz`: upload directory write check
//!
//! - **Uploads** (each echoes the parsed form as JSON)
//!   - `POST /profile`: single file under `avatar`
//!   - `POST /photos`: up to 12 files under `photos`
//!   - `POST /gallery`: `avatar` (1) and `gallery` (8)
//!   - `POST /attachments`: any files
//!   - `POST /form`: text fields only

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::describe_upload,
    },
    middleware::adapter::{AdaptedMulter, upload_middleware},
    models::selector::FieldSpec,
};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::path::PathBuf;

/// State shared by the probe handlers.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub upload_dir: Option<PathBuf>,
}

/// Build the router. Each upload route gets its own adapted extractor; all
/// of them share the configuration of `upload`.
pub fn routes(upload: &AdaptedMulter) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/profile",
            post(describe_upload).layer(from_fn_with_state(
                upload.single("avatar"),
                upload_middleware,
            )),
        )
        .route(
            "/photos",
            post(describe_upload).layer(from_fn_with_state(
                upload.array("photos", Some(12)),
                upload_middleware,
            )),
        )
        .route(
            "/gallery",
            post(describe_upload).layer(from_fn_with_state(
                upload.fields([FieldSpec::new("avatar", 1), FieldSpec::new("gallery", 8)]),
                upload_middleware,
            )),
        )
        .route(
            "/attachments",
            post(describe_upload).layer(from_fn_with_state(upload.any(), upload_middleware)),
        )
        .route(
            "/form",
            post(describe_upload).layer(from_fn_with_state(upload.none(), upload_middleware)),
        )
}
