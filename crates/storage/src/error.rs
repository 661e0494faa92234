use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote store error: {0}")]
    Remote(String),

    #[error("batch of {size} writes exceeds limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("calendar error: {0}")]
    Calendar(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("core error: {0}")]
    Core(#[from] todadot_core::CoreError),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
