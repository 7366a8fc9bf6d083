//! Test harness helpers.

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber with the given filter.
///
/// Safe to call from many tests; only the first call wins.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Scratch directories laid out the way scmd uses them.
#[derive(Debug)]
pub struct TestDirs {
    root: TempDir,
}

impl TestDirs {
    /// Create a fresh temporary root.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// The data directory (`repos.json`, `cache/`).
    #[must_use]
    pub fn data_dir(&self) -> std::path::PathBuf {
        self.root.path().join("data")
    }

    /// The install directory for command specs.
    #[must_use]
    pub fn install_dir(&self) -> std::path::PathBuf {
        self.root.path().join("commands")
    }
}

impl Default for TestDirs {
    fn default() -> Self {
        Self::new()
    }
}
