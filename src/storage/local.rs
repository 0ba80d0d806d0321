use crate::config::{DATA_DIR_NAME, FIRED_SET_FILE};
use crate::error::{AppError, AppResult};
use crate::reminder::FiredSet;
use crate::storage::FiredSetStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Fired-set persisted as a JSON file, so alerts stay suppressed across restarts.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store under the platform's local data directory.
    pub fn new() -> AppResult<Self> {
        let dir = dirs::data_local_dir()
            .ok_or_else(|| AppError::storage("Failed to get local data dir"))?
            .join(DATA_DIR_NAME);
        Self::in_dir(&dir)
    }

    /// Store in an explicit directory, creating it if needed.
    pub fn in_dir(dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(dir).map_err(|e| AppError::storage(e.to_string()))?;
        Ok(Self {
            path: dir.join(FIRED_SET_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FiredSetStore for JsonFileStore {
    fn load(&self) -> AppResult<FiredSet> {
        if !self.path.exists() {
            return Ok(FiredSet::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| AppError::storage(e.to_string()))?;

        match serde_json::from_str::<FiredSet>(&content) {
            Ok(fired) => Ok(fired),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable fired-set, starting empty");
                Ok(FiredSet::default())
            }
        }
    }

    fn save(&mut self, fired: &FiredSet) -> AppResult<()> {
        let content = serde_json::to_string_pretty(fired).map_err(|e| AppError::storage(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| AppError::storage(e.to_string()))?;
        Ok(())
    }
}
