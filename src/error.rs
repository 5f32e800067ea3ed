use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unrecognized raw schema ({arity} columns): {detail}")]
    UnrecognizedSchema { arity: usize, detail: String },

    #[error("nothing to rotate: '{key}' does not exist")]
    RotationMissingSource { key: String },

    #[error("object not found: {0}")]
    KeyNotFound(String),

    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("export payload unusually small: {bytes} bytes")]
    ExportTooSmall { bytes: usize },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
