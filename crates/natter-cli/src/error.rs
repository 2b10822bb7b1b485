//! Error handling for the natter CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("relay error: {0}")]
    Relay(#[from] natter_core::NatterError),

    #[error("codec error: {0}")]
    Codec(#[from] natter_core::CodecError),

    #[error("persistence backend error: {0}")]
    Persist(#[from] natter_core::PersistError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
