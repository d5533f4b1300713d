use crate::config::GrabConfig;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    /// One sub-directory per saved identifier lives here.
    pub storage_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl AppPaths {
    pub fn new(storage_dir: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            storage_dir,
            state_dir,
        }
    }

    pub fn from_config(config: &GrabConfig) -> Self {
        Self::new(config.storage_dir.clone(), config.state_dir.clone())
    }

    pub fn item_dir(&self, pin: u64) -> PathBuf {
        self.storage_dir.join(pin.to_string())
    }

    pub fn db_dir(&self) -> PathBuf {
        self.state_dir.join("db")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.db_dir().join("pins.sqlite")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn run_log_path(&self, run_id: &str) -> PathBuf {
        self.logs_dir().join(format!("run-{run_id}.jsonl"))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.storage_dir)?;
        std::fs::create_dir_all(self.db_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_dirs_are_keyed_by_identifier() {
        let paths = AppPaths::new(PathBuf::from("/data/upload"), PathBuf::from("/data/state"));
        assert_eq!(paths.item_dir(123456), PathBuf::from("/data/upload/123456"));
        assert_eq!(
            paths.ledger_path(),
            PathBuf::from("/data/state/db/pins.sqlite")
        );
    }

    #[test]
    fn ensure_dirs_creates_storage_and_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().join("upload"), dir.path().join("state"));
        paths.ensure_dirs().expect("ensure dirs");
        assert!(paths.storage_dir.is_dir());
        assert!(paths.db_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }
}
