//! Application configuration: a `weblog.toml` file layered with
//! `WEBLOG_`-prefixed environment overrides (e.g. `WEBLOG_DB__PASSWORD`).

use serde::Deserialize;
use weblog_orm::DbConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        9000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub session: SessionConfig,
    #[serde(default = "AppConfig::default_templates_dir")]
    pub templates_dir: String,
    #[serde(default = "AppConfig::default_static_dir")]
    pub static_dir: String,
}

impl AppConfig {
    fn default_templates_dir() -> String {
        "templates".to_string()
    }

    fn default_static_dir() -> String {
        "static".to_string()
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("weblog").required(false))
            .add_source(config::Environment::with_prefix("WEBLOG").separator("__"))
            .build()?
            .try_deserialize()
    }
}
