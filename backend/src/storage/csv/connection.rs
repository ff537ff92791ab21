use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Name of the folder created under the user's Documents directory
pub const DEFAULT_DATA_FOLDER: &str = "KB Gold Buyback";

/// File in the default data folder that points at a relocated data directory
const REDIRECT_FILE: &str = ".buyback_redirect";

/// CsvConnection resolves every path of the file-backed document store.
///
/// ```text
/// {base}/
/// ├── .gb_system_halted            ← halt marker (present = halted)
/// └── apps/{app_id}/
///     ├── purchases.csv
///     └── settings/main.yaml
/// ```
#[derive(Clone, Debug)]
pub struct CsvConnection {
    base_directory: PathBuf,
    app_id: String,
}

impl CsvConnection {
    /// Create a new CSV connection rooted at `base_directory`
    pub fn new<P: AsRef<Path>>(base_directory: P, app_id: &str) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
            info!("Created data directory: {}", base_path.display());
        }

        Ok(Self {
            base_directory: base_path,
            app_id: app_id.to_string(),
        })
    }

    /// Resolve the default data directory, `~/Documents/KB Gold Buyback`,
    /// following a redirect file if the data was moved elsewhere
    pub fn default_data_directory() -> Result<PathBuf> {
        let documents_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        let default_data_dir = documents_dir.join(DEFAULT_DATA_FOLDER);

        let redirect_file = default_data_dir.join(REDIRECT_FILE);
        if !redirect_file.exists() {
            return Ok(default_data_dir);
        }

        match fs::read_to_string(&redirect_file) {
            Ok(redirected_path) => {
                let path = PathBuf::from(redirected_path.trim());
                if path.exists() {
                    info!("Found redirect file, using data directory: {}", path.display());
                    Ok(path)
                } else {
                    warn!(
                        "Redirect file points to non-existent directory: {}. Using default.",
                        path.display()
                    );
                    Ok(default_data_dir)
                }
            }
            Err(e) => {
                error!("Failed to read redirect file: {}. Using default directory.", e);
                Ok(default_data_dir)
            }
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// `{base}/apps/{app_id}`
    pub fn app_directory(&self) -> PathBuf {
        self.base_directory.join("apps").join(&self.app_id)
    }

    pub fn purchases_file_path(&self) -> PathBuf {
        self.app_directory().join("purchases.csv")
    }

    pub fn settings_file_path(&self) -> PathBuf {
        self.app_directory().join("settings").join("main.yaml")
    }

    /// Device-local marker, kept outside the app directory so that it is
    /// never mistaken for shop data
    pub fn halt_flag_path(&self) -> PathBuf {
        self.base_directory.join(".gb_system_halted")
    }

    /// Create the parent directory of `path` if needed
    pub fn ensure_parent_exists(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Write `contents` to `path` through a temp file and rename
    pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        Self::ensure_parent_exists(path)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
