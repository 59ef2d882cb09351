//! Corpus-based conformance testing.
//!
//! A corpus is a JSON file of vectors, each pairing an expected value with
//! stored text and the outcome the matcher must produce:
//!
//! ```json
//! {
//!   "version": "1",
//!   "vectors": [
//!     {"id": "A", "expected": ["mon", "tue"], "stored": "[\"mon\",\"tue\"]", "outcome": "match"},
//!     {"id": "D", "expected": ["mon"], "stored": "not json", "outcome": "malformed", "code": 100}
//!   ]
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::Deserialize;

use super::{ConformanceError, ConformanceResult};
use crate::error::MatchError;
use crate::json::Limits;
use crate::matcher::JsonMatcher;

/// Corpus format versions this runner understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["1"];

/// A corpus containing test vectors.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Corpus {
    /// Format version of the corpus file.
    pub version: String,
    /// Limits to decode stored text with; standard if absent.
    #[serde(default)]
    pub limits: Option<Limits>,
    /// List of test vectors.
    pub vectors: Vec<TestVector>,
}

/// Outcome a vector expects from the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Logically equal.
    Match,
    /// Decodes, but differs.
    Mismatch,
    /// Stored text does not decode.
    Malformed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Match => "match",
            Outcome::Mismatch => "mismatch",
            Outcome::Malformed => "malformed",
        })
    }
}

/// A single test vector.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestVector {
    /// Unique identifier for the test.
    pub id: String,
    /// Free-form note on what the vector covers.
    #[serde(default)]
    pub description: Option<String>,
    /// Expected value, as a test would build it.
    pub expected: serde_json::Value,
    /// Raw text as it would be read back from storage.
    pub stored: String,
    /// Required outcome.
    pub outcome: Outcome,
    /// For `malformed`, the decoder error code the stored text must produce.
    #[serde(default)]
    pub code: Option<u32>,
}

/// Result of running a single test vector.
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    /// Test passed.
    Pass,
    /// Matcher produced a different outcome.
    Fail {
        /// Outcome the corpus requires.
        expected: String,
        /// Outcome the matcher produced.
        actual: String,
    },
    /// The vector itself could not be run.
    Error {
        /// Error message.
        message: String,
    },
}

impl TestResult {
    /// Returns true if this is a passing result.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Returns true if this is a failing result.
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::Pass => f.write_str("pass"),
            TestResult::Fail { expected, actual } => {
                write!(f, "expected {}, got {}", expected, actual)
            }
            TestResult::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Results from running the corpus.
#[derive(Debug, Default)]
pub struct CorpusResults {
    /// Number of tests that passed.
    pub passed: usize,
    /// Number of tests that failed.
    pub failed: usize,
    /// Number of tests that errored.
    pub errors: usize,
    /// Detailed results for each test.
    pub details: Vec<(String, TestResult)>,
}

impl CorpusResults {
    /// Create a new empty results container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a test result.
    pub fn record(&mut self, id: &str, result: TestResult) {
        match &result {
            TestResult::Pass => self.passed += 1,
            TestResult::Fail { .. } => self.failed += 1,
            TestResult::Error { .. } => self.errors += 1,
        }
        self.details.push((id.to_string(), result));
    }

    /// Total number of vectors run.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errors
    }

    /// Returns true if there were no failures or errors.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    /// One-line summary of the results.
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} errors (total: {})",
            self.passed,
            self.failed,
            self.errors,
            self.total()
        )
    }

    /// Everything that did not pass.
    pub fn problems(&self) -> impl Iterator<Item = &(String, TestResult)> {
        self.details.iter().filter(|(_, r)| !r.is_pass())
    }
}

/// Corpus runner that executes test vectors.
#[derive(Debug)]
pub struct CorpusRunner {
    corpus: Corpus,
    limits: Limits,
}

impl CorpusRunner {
    /// Load a corpus from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> ConformanceResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConformanceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse a corpus from JSON text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConformanceResult<Self> {
        let corpus: Corpus = serde_json::from_str(content)?;
        if !SUPPORTED_VERSIONS.contains(&corpus.version.as_str()) {
            return Err(ConformanceError::UnsupportedVersion(corpus.version));
        }
        let limits = corpus.limits.unwrap_or_default();
        debug!(
            "loaded corpus version {} with {} vectors",
            corpus.version,
            corpus.vectors.len()
        );
        Ok(Self { corpus, limits })
    }

    /// Override the limits stored text is decoded with.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The loaded corpus.
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Number of test vectors.
    pub fn vector_count(&self) -> usize {
        self.corpus.vectors.len()
    }

    /// Run all test vectors and return results.
    pub fn run_all(&self) -> CorpusResults {
        let mut results = CorpusResults::new();

        for vector in &self.corpus.vectors {
            let result = self.run_vector(vector);
            if !result.is_pass() {
                warn!("vector {}: {}", vector.id, result);
            }
            results.record(&vector.id, result);
        }

        info!("corpus: {}", results.summary());
        results
    }

    /// Run a single test vector.
    pub fn run_vector(&self, vector: &TestVector) -> TestResult {
        let matcher = match JsonMatcher::with_limits(&vector.expected, self.limits) {
            Ok(m) => m,
            Err(e) => {
                return TestResult::Error {
                    message: format!("expected value not usable: {}", e),
                }
            }
        };

        let (actual, code) = match matcher.check(&vector.stored) {
            Ok(()) => (Outcome::Match, None),
            Err(MatchError::ComparisonMismatch { .. }) => (Outcome::Mismatch, None),
            Err(MatchError::MalformedJson { code, .. }) => (Outcome::Malformed, Some(code)),
            Err(e @ MatchError::UnsupportedValueKind(_)) => {
                return TestResult::Error {
                    message: e.to_string(),
                }
            }
        };

        if actual != vector.outcome {
            return TestResult::Fail {
                expected: vector.outcome.to_string(),
                actual: match code {
                    Some(code) => format!("{} ({})", actual, code.name()),
                    None => actual.to_string(),
                },
            };
        }

        match (vector.code, code) {
            (Some(expected_code), Some(actual_code)) if actual_code.code() != expected_code => {
                TestResult::Fail {
                    expected: format!("E{}", expected_code),
                    actual: format!("E{}", actual_code.code()),
                }
            }
            _ => TestResult::Pass,
        }
    }
}
