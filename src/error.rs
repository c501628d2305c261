use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("protected: {0}")]
    Protected(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no catalog entry found in {repository}, tried: {}", tried.join(", "))]
    NoEntryFound {
        repository: String,
        tried: Vec<String>,
    },

    #[error("repository not found or inaccessible: {0}")]
    NoRepository(String),

    #[error("file not found: {path} in {repository}")]
    FileNotFound { repository: String, path: String },

    #[error("transient error: {0}")]
    Transient(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("task failed: {0}")]
    Task(String),
}

/// A descriptor that could not be parsed, or that the schema rejected.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed descriptor {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("descriptor {path} failed validation: {}", errors.join("; "))]
    Invalid { path: String, errors: Vec<String> },
}

impl Error {
    /// Catalog errors are recorded against the source and never abort a batch.
    #[must_use]
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Self::NoEntryFound { .. }
                | Self::NoRepository(_)
                | Self::FileNotFound { .. }
                | Self::Transient(_)
                | Self::Schema(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
