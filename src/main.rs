//! Media gallery server binary.
//!
//! This crate wires together the public gallery routes, the token gate in
//! front of the admin surface, upload staging, and the flat-file metadata
//! store. The main entry point builds the Axum router and serves HTTP until
//! shutdown.

mod atomic;
mod auth;
mod config;
mod error;
mod frontend;
mod gallery;
mod http;
mod logging;
mod store;
mod upload;

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span, warn};

use crate::auth::AuthConfig;
use crate::config::{Args, DATABASE_FILE, DEFAULT_SECRET, UPLOADS_SUBDIR};
use crate::frontend::AssetsDir;
use crate::http::build_cors_layer;
use crate::store::MediaStore;
use crate::upload::Stager;

shadow!(build);

/// Builds the application router. Kept separate from `main` so tests can
/// exercise the full route + middleware stack.
pub(crate) fn build_router(
    store: Arc<MediaStore>,
    stager: Stager,
    auth_config: Arc<AuthConfig>,
    assets: AssetsDir,
    max_upload_size: usize,
) -> Router {
    Router::new()
        .route("/api/media", get(gallery::list_media))
        .route("/uploads/{file}", get(gallery::serve_upload))
        .route("/logo.png", get(frontend::serve_logo))
        .route("/logo.jpg", get(frontend::serve_logo))
        .route("/health", get(gallery::health))
        .route("/api/admin/login", post(auth::admin_login))
        .route(
            "/api/admin/upload",
            post(gallery::upload_media).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/api/admin/media/{id}", delete(gallery::delete_media))
        .fallback(frontend::serve_frontend)
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(Extension(store))
        .layer(Extension(stager))
        .layer(Extension(auth_config))
        .layer(Extension(assets))
}

/// Starts the gallery server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let data_dir = PathBuf::from(&args.data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let store = Arc::new(MediaStore::open(data_dir.join(DATABASE_FILE)).await?);
    let stager = Stager::new(data_dir.join(UPLOADS_SUBDIR));
    stager.ensure_dir().await?;
    let auth_config = Arc::new(AuthConfig::new(
        &args.secret,
        Duration::from_secs(args.token_ttl_secs),
    ));
    let assets = AssetsDir(PathBuf::from(&args.assets_dir));

    if args.secret == DEFAULT_SECRET {
        warn!("running with the default signing secret; set GALLERY_SECRET in production");
    }

    let mut app = build_router(
        store.clone(),
        stager,
        auth_config,
        assets,
        args.max_upload_size as usize,
    )
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let forwarded_ip = request
                    .headers()
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.split(',').next().unwrap_or("").trim().to_string());
                let connect_ip = request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string());
                let client_ip = forwarded_ip
                    .or(connect_ip)
                    .unwrap_or_else(|| "unknown".to_string());

                info_span!(
                    env!("CARGO_CRATE_NAME"),
                    client_ip,
                    method = ?request.method(),
                    path = ?request.uri().path(),
                )
            })
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    );

    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 gallery listening at http://{addr}");
    info!(
        count = store.media_count().await,
        "📚 media collection loaded"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received termination signal, shutting down");
}
