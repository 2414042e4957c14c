use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid confidence: {0:?} (expected a finite number in [0, 1])")]
    InvalidConfidence(Option<f64>),
    #[error("invalid value: {0:?} (expected a finite number)")]
    InvalidValue(Option<f64>),
    #[error("kpi name is empty")]
    MissingName,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("too many companies selected: {requested} (max {max})")]
    TooManySelections { requested: usize, max: usize },
    #[error("invalid confidence threshold: {0}")]
    InvalidThreshold(f64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("unsupported input format: {0:?}")]
    UnsupportedInput(PathBuf),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<anyhow::Error> for EngineError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
