use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Secret<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,

    // Dashboard origin allowed to call the API from a browser
    pub cors_allow_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: Secret::new(config.get("database_url")?),
            database_max_connections: config.get("database_max_connections").unwrap_or(20),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port").unwrap_or(3000),

            cors_allow_origin: config
                .get::<String>("cors_allow_origin")
                .ok()
                .filter(|origin| !origin.trim().is_empty()),
        })
    }
}
