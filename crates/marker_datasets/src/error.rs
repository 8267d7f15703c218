use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CsvError(#[from] csv::Error),

    #[error("Malformed record at line {line}: {source}")]
    MalformedRecord {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Missing required column '{0}' in index header")]
    MissingColumn(String),

    #[error("Referenced file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Dataset item at line {line} has an empty id")]
    EmptyId { line: usize },

    #[error("Duplicate dataset item id: {0}")]
    DuplicateId(String),

    #[error("Dataset generator failed: {0}")]
    GeneratorError(String),
}
