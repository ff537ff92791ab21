//! # KB Gold Buy-Back Backend
//!
//! Point-of-sale core for a jewelry buy-back counter: PIN access control,
//! the live purchase repository, the settings store, analytics and printable
//! receipts and reports.
//!
//! ## Layers
//!
//! - **storage**: gateway traits plus in-memory and file-backed stores
//! - **domain**: services and business rules
//! - **io**: receipt and report formatting
//! - **config**: process configuration

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

pub use config::AppConfig;
pub use domain::Session;

use io::LogReceiptPrinter;
use storage::csv::{CsvConnection, CsvGateway, HaltFlagRepository};
use storage::AnonymousIdentityProvider;

/// Everything the terminal needs at runtime
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub session: Session,
}

/// Build the file-backed session described by `config`. The session is not
/// started yet.
pub fn initialize_backend(config: AppConfig) -> Result<AppState> {
    let data_directory = config.resolve_data_directory()?;
    info!("Setting up data directory {}", data_directory.display());
    let connection = CsvConnection::new(&data_directory, &config.app_id)?;

    info!("Setting up domain services for app {}", config.app_id);
    let session = Session::new(
        Arc::new(CsvGateway::new(connection.clone())),
        Arc::new(AnonymousIdentityProvider::new()),
        Arc::new(HaltFlagRepository::new(&connection)),
        Arc::new(LogReceiptPrinter),
        config.owner_contact.clone(),
    );

    Ok(AppState { config, session })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_initialize_backend_in_temp_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig {
            data_directory: Some(temp_dir.path().to_path_buf()),
            app_id: "unit".to_string(),
            ..AppConfig::default()
        };

        let state = initialize_backend(config).unwrap();
        let status = state.session.start().await;
        assert!(status.auth);
        assert!(status.data_loaded);

        state.session.end().await;
    }
}
