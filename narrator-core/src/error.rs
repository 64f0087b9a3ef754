use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarrationError {
    #[error("Chunks not ready: {0}")]
    ChunkingFailed(String),

    #[error("Keep-alive signal failed: {0}")]
    KeepAlive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, NarrationError>;
