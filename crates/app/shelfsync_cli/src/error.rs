use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("Json: {}", .0)]
    Json(#[from] serde_json::Error),

    #[error("Config: {}", .0)]
    Config(#[from] shelfsync_core::config::ConfigError),

    #[error("Database: {}", .0)]
    Db(#[from] sqlx::Error),

    #[error("Migrate: {}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Upstream: {}", .0)]
    Upstream(#[from] shelfsync_core::upstream::UpstreamError),

    #[error("Logging: {}", .0)]
    Logging(String),
}
