use serde::Deserialize;

/// Application configuration, loaded from the environment.
///
/// `DATABASE_URL` is required; everything else has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Default number of trades returned by the public transaction feed.
    #[serde(default = "default_trade_history_limit")]
    pub trade_history_limit: i64,
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    5
}

fn default_trade_history_limit() -> i64 {
    10
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }
}
