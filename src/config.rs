use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Where upload intake writes temporary image files.
    pub tmp_dir: PathBuf,
    /// Root of locally stored images when no remote image host is configured.
    pub media_dir: PathBuf,
    /// Externally visible base URL, used to build local media URLs.
    pub public_url: String,
    pub access_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub client_origin: Option<String>,
    pub cloudinary: Option<CloudinaryConfig>,
}

/// Credentials for unsigned uploads to Cloudinary.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
}

/// What the process should do once configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Serve,
    Migrate,
    IssueToken(String),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Posts, comments and likes API")]
pub struct Args {
    /// Host to bind to (overrides POSTBOARD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides POSTBOARD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides POSTBOARD_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for temporary uploads (overrides POSTBOARD_TMP_DIR)
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    /// Directory for locally stored images (overrides POSTBOARD_MEDIA_DIR)
    #[arg(long)]
    pub media_dir: Option<PathBuf>,

    /// Public base URL (overrides POSTBOARD_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Print an access token for the given user id and exit
    #[arg(long, value_name = "USER_ID")]
    pub issue_token: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the run mode.
    pub fn from_env_and_args() -> Result<(Self, Mode)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("POSTBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("POSTBOARD_PORT", 4000u16)?;
        let env_db = env::var("POSTBOARD_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/postboard.db".into());
        let env_tmp = env::var("POSTBOARD_TMP_DIR").unwrap_or_else(|_| "./data/tmp".into());
        let env_media = env::var("POSTBOARD_MEDIA_DIR").unwrap_or_else(|_| "./data/media".into());

        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let env_public = env::var("POSTBOARD_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let access_token_secret = env::var("POSTBOARD_ACCESS_TOKEN_SECRET")
            .context("POSTBOARD_ACCESS_TOKEN_SECRET must be set")?;
        let access_token_ttl_secs = parse_env("POSTBOARD_ACCESS_TOKEN_TTL_SECS", 3600i64)?;

        let cloudinary = match (
            env::var("POSTBOARD_CLOUDINARY_CLOUD_NAME"),
            env::var("POSTBOARD_CLOUDINARY_UPLOAD_PRESET"),
        ) {
            (Ok(cloud_name), Ok(upload_preset)) => Some(CloudinaryConfig {
                cloud_name,
                upload_preset,
            }),
            _ => None,
        };

        // --- Merge ---
        let cfg = Self {
            host,
            port,
            database_url: args.database_url.unwrap_or(env_db),
            tmp_dir: args.tmp_dir.unwrap_or_else(|| env_tmp.into()),
            media_dir: args.media_dir.unwrap_or_else(|| env_media.into()),
            public_url: args
                .public_url
                .unwrap_or(env_public)
                .trim_end_matches('/')
                .to_string(),
            access_token_secret,
            access_token_ttl_secs,
            client_origin: env::var("POSTBOARD_CLIENT_ORIGIN").ok(),
            cloudinary,
        };

        let mode = match (args.migrate, args.issue_token) {
            (true, _) => Mode::Migrate,
            (false, Some(user_id)) => Mode::IssueToken(user_id),
            (false, None) => Mode::Serve,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
