//! Test utilities for file-backed storage
//!
//! The temporary data directory lives as long as the environment, so test
//! data is removed even if a test panics.

use anyhow::Result;
use tempfile::TempDir;

use super::connection::CsvConnection;
use super::CsvGateway;

pub const TEST_APP_ID: &str = "kb-gold-test";

pub struct TestEnvironment {
    pub connection: CsvConnection,
    /// Base directory path for manual inspection if needed
    pub base_path: std::path::PathBuf,
    _temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path(), TEST_APP_ID)?;
        Ok(Self {
            connection,
            base_path: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        })
    }

    /// A gateway over this environment's data directory
    pub fn gateway(&self) -> CsvGateway {
        CsvGateway::new(self.connection.clone())
    }
}
