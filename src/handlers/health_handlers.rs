//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the upload directory is writable

use crate::routes::routes::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe. Always returns 200 OK with a plain JSON body.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Performs a best-effort write/read/delete against the upload directory.
/// Memory-backed deployments have nothing to probe and are always ready.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let storage_check = match &state.upload_dir {
        None => CheckStatus {
            ok: true,
            error: None,
        },
        Some(dir) => {
            let tmp_path = dir.join(format!(".readyz-{}", Uuid::new_v4()));
            match fs::write(&tmp_path, b"readyz").await {
                Ok(_) => match fs::read(&tmp_path).await {
                    Ok(bytes) if bytes == b"readyz" => match fs::remove_file(&tmp_path).await {
                        Ok(_) => CheckStatus {
                            ok: true,
                            error: None,
                        },
                        Err(e) => CheckStatus {
                            ok: true,
                            error: Some(format!("could not remove tmp file: {}", e)),
                        },
                    },
                    Ok(_) => {
                        let _ = fs::remove_file(&tmp_path).await;
                        CheckStatus {
                            ok: false,
                            error: Some("file content mismatch".to_string()),
                        }
                    }
                    Err(e) => {
                        let _ = fs::remove_file(&tmp_path).await;
                        CheckStatus {
                            ok: false,
                            error: Some(format!("could not read tmp file: {}", e)),
                        }
                    }
                },
                Err(e) => CheckStatus {
                    ok: false,
                    error: Some(format!("could not write tmp file: {}", e)),
                },
            }
        }
    };

    let overall_ok = storage_check.ok;
    let mut checks = HashMap::new();
    checks.insert("storage", storage_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
