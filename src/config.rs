use crate::services::upload_service::Limits;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory uploaded files are written to; `None` keeps them in memory.
    pub upload_dir: Option<String>,
    pub limits: Limits,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Multipart upload server")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_BRIDGE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_BRIDGE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploads are stored (overrides UPLOAD_BRIDGE_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Largest accepted file in bytes (overrides UPLOAD_BRIDGE_MAX_FILE_SIZE)
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Most files per request (overrides UPLOAD_BRIDGE_MAX_FILES)
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Most text fields per request (overrides UPLOAD_BRIDGE_MAX_FIELDS)
    #[arg(long)]
    pub max_fields: Option<usize>,

    /// Most parts per request (overrides UPLOAD_BRIDGE_MAX_PARTS)
    #[arg(long)]
    pub max_parts: Option<usize>,

    /// Largest text field value in bytes (overrides UPLOAD_BRIDGE_MAX_FIELD_SIZE)
    #[arg(long)]
    pub max_field_size: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    /// CLI values win over environment values, which win over defaults.
    pub fn merge(args: Args) -> Result<Self> {
        let env_host = env::var("UPLOAD_BRIDGE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse::<u16>("UPLOAD_BRIDGE_PORT")?.unwrap_or(3000);
        let env_dir = env::var("UPLOAD_BRIDGE_UPLOAD_DIR").ok();

        let defaults = Limits::default();
        let limits = Limits {
            file_size: args
                .max_file_size
                .or(env_parse("UPLOAD_BRIDGE_MAX_FILE_SIZE")?),
            files: args.max_files.or(env_parse("UPLOAD_BRIDGE_MAX_FILES")?),
            fields: args.max_fields.or(env_parse("UPLOAD_BRIDGE_MAX_FIELDS")?),
            parts: args.max_parts.or(env_parse("UPLOAD_BRIDGE_MAX_PARTS")?),
            field_size: args
                .max_field_size
                .or(env_parse("UPLOAD_BRIDGE_MAX_FIELD_SIZE")?)
                .unwrap_or(defaults.field_size),
            ..defaults
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.or(env_dir).filter(|dir| !dir.is_empty()),
            limits,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an optional environment variable.
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
