//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DATABASE_FILE: &str = "database.json";
pub const UPLOADS_SUBDIR: &str = "uploads";
pub const DEFAULT_DATA_DIR: &str = ".gallery";
pub const DEFAULT_ASSETS_DIR: &str = "public";
pub const DEFAULT_SECRET: &str = "change-this-secret-key-in-production";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 50 * 1024 * 1024;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(
    name = "media-gallery",
    version = VERSION_INFO,
    about = "Self-hosted media gallery server"
)]
pub struct Args {
    #[arg(
        short = 'd',
        long,
        env = "GALLERY_DATA_DIR",
        default_value = DEFAULT_DATA_DIR,
        help = "Data directory holding database.json and uploads/"
    )]
    pub data_dir: String,
    #[arg(
        long,
        env = "GALLERY_ASSETS_DIR",
        default_value = DEFAULT_ASSETS_DIR,
        help = "Assets directory holding logo.png / logo.jpg"
    )]
    pub assets_dir: String,
    #[arg(
        short = 'b',
        long,
        env = "GALLERY_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "GALLERY_PORT",
        default_value_t = 3000,
        help = "Listen port"
    )]
    pub port: u16,
    #[arg(
        long,
        env = "GALLERY_SECRET",
        default_value = DEFAULT_SECRET,
        help = "Token signing secret (rotate in production)"
    )]
    pub secret: String,
    #[arg(
        long,
        env = "GALLERY_TOKEN_TTL_SECS",
        default_value_t = DEFAULT_TOKEN_TTL_SECS,
        help = "Admin token expiry in seconds"
    )]
    pub token_ttl_secs: u64,
    #[arg(
        long,
        env = "GALLERY_MAX_UPLOAD_SIZE",
        default_value_t = DEFAULT_MAX_UPLOAD_SIZE,
        help = "Max upload body size in bytes"
    )]
    pub max_upload_size: u64,
    #[arg(
        long,
        env = "GALLERY_CORS_ORIGINS",
        help = "Comma separated CORS origins"
    )]
    pub cors_origins: Option<String>,
}
