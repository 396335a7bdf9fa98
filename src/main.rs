use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, path::PathBuf};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use upload_bridge::{
    Multer, adapt,
    config::AppConfig,
    routes::routes::{AppState, routes},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-bridge with config: {:?}", cfg);

    // --- Build the parser ---
    let mut builder = Multer::builder().limits(cfg.limits);
    let upload_dir = cfg.upload_dir.as_ref().map(PathBuf::from);
    if let Some(dir) = &upload_dir {
        if !dir.exists() {
            tracing::info!("Creating upload directory at {}", dir.display());
        }
        builder = builder.dest(dir)?;
    } else {
        tracing::info!("No upload directory configured, keeping uploads in memory");
    }
    let upload = adapt(builder.build());

    // --- Build router ---
    let app: Router = routes(&upload).with_state(AppState { upload_dir });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
