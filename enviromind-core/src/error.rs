use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnviroError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}
