//! Common error types for test bodies and harness plumbing.

use thiserror::Error;

/// Errors a test body can surface to the runner.
///
/// The failure diagnostics collector keys off the variant to decide whether
/// cluster artifacts are worth collecting (see
/// `TestError::skips_diagnostics`).
#[derive(Error, Debug)]
pub enum TestError {
    /// A required environment variable was not set
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    /// The cluster failed the storage sanity check
    #[error("Storage sanity error: {0}")]
    StorageSanity(String),

    /// The cluster rejected a resource create with a conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An external command failed
    #[error("Command error: {0}")]
    Command(String),

    /// A polled condition did not become true in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A test assertion did not hold
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// Cluster access failed
    #[error("Cluster error: {0}")]
    Cluster(String),
}

impl TestError {
    /// Expected, environmental failure kinds that never trigger diagnostic
    /// collection.
    pub fn skips_diagnostics(&self) -> bool {
        matches!(
            self,
            TestError::MissingEnvironmentVariable(_)
                | TestError::StorageSanity(_)
                | TestError::Conflict(_)
        )
    }
}

/// Result type alias using `TestError`
pub type Result<T> = std::result::Result<T, TestError>;
