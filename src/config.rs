use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

/// Shape of emitted log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format `{other}` (expected text or json)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "todo_api=debug,axum=info,tower_http=info".into(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

/// A login entry: username plus its Argon2 PHC hash.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub users: Vec<UserEntry>,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://todos.db?mode=rwc".into());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };
        let users = parse_users(&std::env::var("AUTH_USERS").unwrap_or_default())
            .context("parse AUTH_USERS")?;
        let port = std::env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse::<u16>()
            .context("APP_PORT must be a port number")?;

        let log = LogConfig {
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| LogConfig::default().filter),
            format: std::env::var("LOG_FORMAT")
                .unwrap_or_default()
                .parse()
                .context("parse LOG_FORMAT")?,
        };

        Ok(Self {
            database_url,
            max_connections,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            jwt,
            users,
            log,
        })
    }
}

/// Parses `user:hash;user:hash`. The first colon splits name from hash.
pub fn parse_users(raw: &str) -> anyhow::Result<Vec<UserEntry>> {
    let mut users: Vec<UserEntry> = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (username, password_hash) = entry
            .split_once(':')
            .with_context(|| format!("user entry `{entry}` is not `username:hash`"))?;
        let username = username.trim();
        anyhow::ensure!(!username.is_empty(), "user entry has an empty username");
        anyhow::ensure!(
            !users.iter().any(|u| u.username == username),
            "duplicate user `{username}`"
        );
        users.push(UserEntry {
            username: username.to_string(),
            password_hash: password_hash.trim().to_string(),
        });
    }
    Ok(users)
}
