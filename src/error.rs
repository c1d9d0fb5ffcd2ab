use std::path::PathBuf;

/// Errors surfaced by the corpus engine.
///
/// Per-record parse failures during ingest and per-row failures in the
/// readers are logged and skipped rather than propagated; everything
/// else ends up here.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    /// A named entity (podcast title, podcast id, episode id) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller-supplied argument is out of contract (unknown search mode,
    /// overlap >= window size, mismatched podcast title, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Required on-disk files are missing or unreadable at backend construction.
    #[error("dataset access error: {0}")]
    DatasetAccess(String),

    /// A lazy operation needs an index file that has not been produced.
    /// The message names the builder phase that produces it.
    #[error("index not built: {path}: {remedy}")]
    IndexNotBuilt { path: PathBuf, remedy: String },

    /// An operation requires turns to be loaded but no turn loader is attached.
    #[error("turns not loaded and no turn loader is attached")]
    TurnsNotLoaded,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("search database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CorpusError {
    pub(crate) fn index_not_built(path: impl Into<PathBuf>, phase: u8) -> Self {
        CorpusError::IndexNotBuilt {
            path: path.into(),
            remedy: format!("run `build-indexes --data-dir <dir> --phase {phase}`"),
        }
    }
}

pub type Result<T, E = CorpusError> = std::result::Result<T, E>;
