//! Conformance corpus for the matcher.
//!
//! Vectors live in JSON files (see `tests/vectors/`) so the same cases can be
//! run from `cargo test` and from `jsoneq conformance`.

pub mod corpus;

use thiserror::Error;

pub use corpus::{Corpus, CorpusResults, CorpusRunner, Outcome, TestResult, TestVector};

/// Result type for conformance operations.
pub type ConformanceResult<T> = Result<T, ConformanceError>;

/// Errors loading a corpus.
#[derive(Debug, Error)]
pub enum ConformanceError {
    /// Corpus file could not be read
    #[error("failed to read corpus {path}: {source}")]
    Io {
        /// Path given
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Corpus is not valid corpus JSON
    #[error("failed to parse corpus: {0}")]
    Parse(#[from] serde_json::Error),
    /// Corpus format version not understood
    #[error("unsupported corpus version {0:?}")]
    UnsupportedVersion(String),
}
