use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read model: {0}")]
    Io(#[from] io::Error),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("unknown classifier type id {0}")]
    UnknownClassifier(i32),

    #[error("layer input dimension {found} does not match previous output dimension {expected}")]
    LayerMismatch { expected: usize, found: usize },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invalid_model<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::InvalidModel(msg.into()))
}
