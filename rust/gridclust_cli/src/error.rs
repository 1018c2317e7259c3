use gridclust::GridClusterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Clustering error: {0}")]
    Clustering(#[from] GridClusterError),

    #[error("Point {index} is invalid: {source}")]
    InvalidPoint {
        index: usize,
        source: GridClusterError,
    },

    #[error("Progress bar template error: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
}
