// src/config.rs

use std::env;

use dotenvy::dotenv;

/// Length of an exam access code.
pub const ACCESS_CODE_LENGTH: usize = 6;

/// How many random codes are tried before giving up on a collision-free one.
pub const ACCESS_CODE_MAX_ATTEMPTS: usize = 10;

/// Pass threshold used when an exam has no explicit passing marks.
pub const DEFAULT_PASS_PERCENTAGE: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Per-IP throttling of the auth endpoints.
    pub login_rate_limit: bool,
}

impl Config {
    /// Reads configuration from the environment (and `.env`, if present).
    ///
    /// Fails when `DATABASE_URL` or `JWT_SECRET` is missing, or when
    /// `CORS_ORIGINS` holds an entry that is not a URL.
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        let cors_origins = parse_origins(
            &env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string()),
        )?;

        let login_rate_limit = env::var("LOGIN_RATE_LIMIT")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "off"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            port,
            cors_origins,
            login_rate_limit,
        })
    }
}

/// Splits a comma-separated origin list into serialized origins.
/// The first entry that is not a URL is an error naming it.
pub fn parse_origins(raw: &str) -> Result<Vec<String>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            url::Url::parse(s)
                .map(|url| url.origin().ascii_serialization())
                .map_err(|e| format!("Invalid CORS origin '{}': {}", s, e))
        })
        .collect()
}
