use thiserror::Error;

use dmi_core::DmiError;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Dmi(#[from] DmiError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing column {0:?} in curve file")]
    MissingColumn(String),
    #[error("row {row}: invalid {column} value {value:?}")]
    InvalidField {
        row: usize,
        column: String,
        value: String,
    },
    #[error("invalid node {node} at line {line}")]
    InvalidNode { node: u32, line: usize },
    #[error("different local ({local}) and remote ({remote}) bandwidth measurement counts")]
    MismatchedSeries { local: usize, remote: usize },
}
