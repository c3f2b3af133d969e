use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot walk input directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("input path not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("published index generation {0} is missing from the store")]
    MissingGeneration(u64),

    /// No record produced a single index term. The previously published index is left untouched.
    #[error("no records contained index terms; refusing to replace the published index")]
    EmptyCorpus,
}

pub type Result<T> = std::result::Result<T, Error>;
