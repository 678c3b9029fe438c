//! API server configuration.

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// HS256 signing secret; required.
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
}

impl ApiConfig {
    /// Create config from environment variables. A missing `JWT_SECRET` is
    /// fatal for the process at startup.
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            jwt_secret: std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET not set".to_string())?,
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        })
    }
}
