//! CLI subcommands.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use thiserror::Error;

use atelier_storefront::config::{ConfigError, get_database_url};
use atelier_storefront::db::RepositoryError;

/// Errors from CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Seed failed: {0}")]
    Seed(#[from] RepositoryError),

    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),
}

/// Storefront database URL from the environment (`.env` honored).
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();
    Ok(get_database_url("STOREFRONT_DATABASE_URL")?)
}
