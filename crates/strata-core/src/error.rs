use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::Language;

/// Failures at the extractor boundary. None of these abort a project:
/// the pipeline turns each into an `error`-tagged facts record.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{language} parse failure in {}: {message}", path.display())]
    Parse {
        language: Language,
        path: PathBuf,
        message: String,
    },

    #[error("{} is {size} bytes, over the {limit} byte limit", path.display())]
    TooLarge { path: PathBuf, size: usize, limit: usize },

    #[error("extraction of {} took {elapsed:?}, over the {budget:?} budget", path.display())]
    TimedOut {
        path: PathBuf,
        elapsed: Duration,
        budget: Duration,
    },

    #[error("extractor panicked on {}: {message}", path.display())]
    Panicked { path: PathBuf, message: String },

    #[error("no extractor for language '{tag}' ({})", path.display())]
    Unsupported { tag: String, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
