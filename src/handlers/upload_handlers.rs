//! HTTP handlers mounted behind the upload middleware.
//! They only report what the middleware parsed; storage already happened.

use crate::models::form::UploadedForm;
use axum::{Json, extract::Request};

/// Echo the parsed form as JSON.
///
/// Requests that were not multipart carry no `UploadedForm` and produce `{}`.
pub async fn describe_upload(req: Request) -> Json<UploadedForm> {
    let form = req
        .extensions()
        .get::<UploadedForm>()
        .cloned()
        .unwrap_or_default();
    Json(form)
}
