use std::{ffi::OsString, fs, io, path::PathBuf};

use gacha_sim_core::StateSnapshot;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or saving persisted state.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    /// The state file exists but could not be read.
    #[error("failed to read state file at {path}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The state file could not be written.
    #[error("failed to write state file at {path}")]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The state file does not contain a valid snapshot.
    #[error("state file at {path} is not a valid snapshot")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The snapshot could not be encoded.
    #[error("failed to encode state snapshot")]
    Encode(#[source] serde_json::Error),
}

/// Persistence boundary for the whole simulator state.
pub(crate) trait StateStore {
    /// Loads the last saved snapshot, or the empty state when nothing was saved.
    fn load(&self) -> Result<StateSnapshot, StoreError>;

    /// Replaces the saved snapshot.
    fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError>;
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn load(&self) -> Result<StateSnapshot, StoreError> {
        (**self).load()
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }
}

/// Stores the snapshot as pretty-printed JSON in a single file.
#[derive(Clone, Debug)]
pub(crate) struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = OsString::from(self.path.as_os_str());
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<StateSnapshot, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved state; starting empty");
                return Ok(StateSnapshot::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot).map_err(StoreError::Encode)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
        }
        let staging = self.staging_path();
        fs::write(&staging, json).map_err(|source| self.write_error(source))?;
        fs::rename(&staging, &self.path).map_err(|source| self.write_error(source))?;
        debug!(
            path = %self.path.display(),
            gachas = snapshot.gacha_list.len(),
            "state saved"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::cell::RefCell;

    use super::{StateStore, StoreError};
    use gacha_sim_core::StateSnapshot;

    /// In-memory store used to exercise sessions without touching the disk.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryStore {
        pub(crate) saved: RefCell<Option<StateSnapshot>>,
    }

    impl StateStore for MemoryStore {
        fn load(&self) -> Result<StateSnapshot, StoreError> {
            Ok(self.saved.borrow().clone().unwrap_or_default())
        }

        fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
            *self.saved.borrow_mut() = Some(snapshot.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gacha_sim_core::{Gacha, GachaId};

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("gacha-sim-{}", uuid::Uuid::new_v4()))
            .join("state.json")
    }

    #[test]
    fn missing_file_loads_empty_state() {
        let store = JsonFileStore::new(scratch_path());
        assert_eq!(store.load().expect("load"), StateSnapshot::default());
    }

    #[test]
    fn saved_state_loads_back() {
        let path = scratch_path();
        let store = JsonFileStore::new(&path);
        let snapshot = StateSnapshot {
            gacha_list: vec![Gacha::new(GachaId::new("g"), "Stream")],
            current_gacha_id: Some(GachaId::new("g")),
        };

        store.save(&snapshot).expect("save");
        assert!(!store.staging_path().exists(), "staging file must be renamed away");
        assert_eq!(store.load().expect("load"), snapshot);

        let raw = fs::read_to_string(&path).expect("read raw file");
        assert!(raw.contains("\"gachaList\""));
        assert!(raw.contains("\"currentGachaId\": \"g\""));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn corrupt_file_reports_parse_error() {
        let path = scratch_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).expect("create dir");
        }
        fs::write(&path, "{ not json").expect("write");

        let error = JsonFileStore::new(&path).load().expect_err("corrupt state");
        assert!(matches!(error, StoreError::Parse { .. }));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}
