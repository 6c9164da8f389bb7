use std::{collections::HashMap, net::{IpAddr, SocketAddr}};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::AppError;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` runs the service on in-memory storage.
    pub database: Option<DatabaseConfig>,
    pub cors_origins: Vec<String>,
}

/// Flat view of the settings as they arrive from `delivery.toml` and the environment.
#[derive(Debug, Deserialize)]
struct RawSettings {
    host: String,
    port: u16,
    database_url: Option<String>,
    db_max_connections: u32,
    cors_origins: String,
}

impl AppConfig {
    /// Defaults, then an optional `delivery.toml`, then environment variables.
    pub fn load() -> Result<Self, AppError> {
        Self::build(Environment::default().try_parsing(true))
    }

    /// Same layering as [`AppConfig::load`] with `vars` standing in for the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, AppError> {
        Self::build(Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn build(env: Environment) -> Result<Self, AppError> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("db_max_connections", 10)?
            .set_default("cors_origins", "http://localhost:3000,http://127.0.0.1:3000")?
            .add_source(File::with_name("delivery").required(false))
            .add_source(env)
            .build()?;
        let raw: RawSettings = settings.try_deserialize()?;

        let host = raw
            .host
            .parse::<IpAddr>()
            .map_err(|_| AppError::Config(format!("HOST must be an IP address, got {:?}", raw.host)))?;
        if raw.port == 0 {
            return Err(AppError::Config("PORT must be between 1 and 65535".into()));
        }
        if raw.db_max_connections == 0 {
            return Err(AppError::Config("DB_MAX_CONNECTIONS must be at least 1".into()));
        }
        let database = raw
            .database_url
            .filter(|url| !url.trim().is_empty())
            .map(|url| DatabaseConfig { url, max_connections: raw.db_max_connections });
        let cors_origins = raw
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        Ok(Self { server: ServerConfig { host, port: raw.port }, database, cors_origins })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.server.host, self.server.port) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_use_in_memory_storage() {
        let cfg = AppConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(cfg.socket_addr(), "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert!(cfg.database.is_none());
        assert_eq!(cfg.cors_origins, vec!["http://localhost:3000", "http://127.0.0.1:3000"]);
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = AppConfig::from_vars(vars(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://u:p@localhost:5432/delivery"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("CORS_ORIGINS", "https://ops.example.com, "),
        ]))
        .unwrap();
        assert_eq!(cfg.socket_addr(), "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        let db = cfg.database.unwrap();
        assert_eq!(db.max_connections, 4);
        assert!(db.url.starts_with("postgres://"));
        assert_eq!(cfg.cors_origins, vec!["https://ops.example.com"]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(AppConfig::from_vars(vars(&[("PORT", "0")])), Err(AppError::Config(_))));
        assert!(matches!(AppConfig::from_vars(vars(&[("PORT", "eighty")])), Err(AppError::Config(_))));
        assert!(matches!(AppConfig::from_vars(vars(&[("HOST", "localhost")])), Err(AppError::Config(_))));
        assert!(matches!(AppConfig::from_vars(vars(&[("DB_MAX_CONNECTIONS", "0")])), Err(AppError::Config(_))));
    }

    #[test]
    fn blank_database_url_means_memory() {
        let cfg = AppConfig::from_vars(vars(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(cfg.database.is_none());
    }
}
