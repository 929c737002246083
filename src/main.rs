use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use config::{AppConfig, Mode};
use middleware::auth::TokenKeys;
use services::image_uploader::{CloudinaryUploader, DiskUploader, ImageUploader};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;
    let tokens = Arc::new(TokenKeys::new(
        cfg.access_token_secret.as_bytes(),
        cfg.access_token_ttl_secs,
    ));

    if let Mode::IssueToken(user_id) = &mode {
        println!("{}", tokens.issue(user_id)?);
        return Ok(());
    }

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        database_url = %cfg.database_url,
        tmp_dir = %cfg.tmp_dir.display(),
        "Starting postboard"
    );

    // --- Storage first; the listener only binds once it is usable ---
    let db = connect_db(&cfg.database_url).await?;
    services::run_migrations(&db)
        .await
        .context("applying database schema")?;

    if mode == Mode::Migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    for dir in [&cfg.tmp_dir, &cfg.media_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory {}", dir.display());
        }
    }

    let uploader: Arc<dyn ImageUploader> = match &cfg.cloudinary {
        Some(cloudinary) => {
            tracing::info!(cloud = %cloudinary.cloud_name, "Uploading images to Cloudinary");
            Arc::new(CloudinaryUploader::new(reqwest::Client::new(), cloudinary))
        }
        None => {
            tracing::info!("Storing images under {}", cfg.media_dir.display());
            Arc::new(DiskUploader::new(&cfg.media_dir, &cfg.public_url))
        }
    };

    let state = AppState::new(db, uploader, tokens, &cfg.tmp_dir, &cfg.media_dir);

    // --- Build router ---
    let mut app: Router = routes::routes::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if let Some(origin) = cfg.client_origin.as_deref() {
        app = app.layer(cors_layer(origin)?);
    }

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

/// Open the SQLite pool, creating the database file and its directory
/// when missing.
async fn connect_db(database_url: &str) -> Result<SqlitePool> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if !db_path.starts_with(":memory:") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parsing database url `{}`", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {}", database_url))
}

/// Credentialed CORS for the single configured browser origin.
fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("invalid POSTBOARD_CLIENT_ORIGIN `{}`", origin))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}
