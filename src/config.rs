use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Object storage holding recipe images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Prefix prepended to object keys when rendering image URLs.
    pub media_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub page_size: i64,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "foodgram".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "foodgram-users".into()),
            ttl_minutes: parsed_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parsed_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let endpoint = std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT must be set")?;
        let bucket = std::env::var("MINIO_BUCKET").context("MINIO_BUCKET must be set")?;
        let media_base_url = std::env::var("MEDIA_BASE_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: std::env::var("MINIO_ACCESS_KEY")
                .context("MINIO_ACCESS_KEY must be set")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")
                .context("MINIO_SECRET_KEY must be set")?,
            endpoint,
            bucket,
            media_base_url,
        };
        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed_or("APP_PORT", 8080),
            page_size: parsed_or("PAGE_SIZE", 6),
            jwt,
            storage,
        })
    }
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
