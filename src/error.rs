//! Custom error types for image-credit

use thiserror::Error;

/// Main error type for image-credit operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTML rewrite error: {0}")]
    Rewrite(String),

    #[error("Site not found: {0}")]
    SiteNotFound(u64),

    #[error("Media not found: {0} on site {1}")]
    MediaNotFound(u64, u64),

    #[error("{0}")]
    Other(String),
}

impl From<lol_html::errors::RewritingError> for Error {
    fn from(err: lol_html::errors::RewritingError) -> Self {
        Error::Rewrite(err.to_string())
    }
}

/// Result type alias for image-credit
pub type Result<T> = std::result::Result<T, Error>;
