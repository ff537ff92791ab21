//! Device-local halt flag stored as a marker file.
//!
//! The file exists exactly while the terminal is halted. Its contents are
//! informational only (the time the halt was recorded).

use anyhow::Result;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use super::connection::CsvConnection;
use crate::storage::traits::HaltFlagStorage;

pub struct HaltFlagRepository {
    path: PathBuf,
}

impl HaltFlagRepository {
    pub fn new(connection: &CsvConnection) -> Self {
        Self {
            path: connection.halt_flag_path(),
        }
    }
}

impl HaltFlagStorage for HaltFlagRepository {
    fn is_halted(&self) -> Result<bool> {
        Ok(self.path.try_exists()?)
    }

    fn set_halted(&self, halted: bool) -> Result<()> {
        if halted {
            CsvConnection::write_atomic(&self.path, Utc::now().to_rfc3339().as_bytes())?;
            info!("Halt flag written to {}", self.path.display());
        } else if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("Halt flag cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csv::test_utils::TestEnvironment;

    #[test]
    fn test_flag_survives_a_new_repository() {
        let env = TestEnvironment::new().unwrap();
        let flag = HaltFlagRepository::new(&env.connection);
        assert!(!flag.is_halted().unwrap());

        flag.set_halted(true).unwrap();
        assert!(HaltFlagRepository::new(&env.connection).is_halted().unwrap());

        flag.set_halted(false).unwrap();
        assert!(!env.connection.halt_flag_path().exists());
        // Clearing twice is fine
        flag.set_halted(false).unwrap();
    }
}
