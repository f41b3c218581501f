use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use light_common::{PersistedState, StateUpdate};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::PersistenceError;

/// JSON file holding the last light state and the schedule.
///
/// Reads never fail: a missing or corrupt file degrades to an empty state.
/// Merges run load, apply and write under one lock, and writes land through
/// a rename so readers never see a half-written file.
#[derive(Clone)]
pub struct StateStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_ref()
    }

    pub async fn load(&self) -> PersistedState {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    pub async fn save(&self, update: StateUpdate) -> Result<(), PersistenceError> {
        if update.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let mut state = self.read().await;
        state.apply(update)?;
        self.write(&state).await
    }

    async fn read(&self) -> PersistedState {
        let raw = match tokio::fs::read(self.path()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path().display(), "no state file yet");
                return PersistedState::default();
            }
            Err(err) => {
                warn!(path = %self.path().display(), "failed to read state file: {err}");
                return PersistedState::default();
            }
        };

        let mut state = match PersistedState::from_slice(&raw) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = %self.path().display(), "ignoring unparsable state file: {err}");
                return PersistedState::default();
            }
        };

        if let Some(err) = state.schedule_error() {
            warn!("ignoring malformed stored schedule: {err}");
            state.drop_schedule();
        }
        state
    }

    async fn write(&self, state: &PersistedState) -> Result<(), PersistenceError> {
        let path = self.path();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let payload = state.to_vec_pretty()?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, payload).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}
