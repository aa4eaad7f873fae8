use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document list {}: {}", .path.display(), .source)]
    DocumentList {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;
