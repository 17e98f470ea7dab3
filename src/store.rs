use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capabilities::Capabilities;
use crate::protocol::Session;
use crate::types::RawState;
use crate::{Error, Result};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to resume without logging in again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub session: Session,
    pub capabilities: Vec<Capabilities>,
    pub state: Vec<Option<RawState>>,
    #[serde(default)]
    pub offsets: Vec<f64>,
}

impl Snapshot {
    /// Reject snapshots this version of the client cannot resume from.
    pub fn check(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::StaleSession(format!(
                "snapshot version {} != {SNAPSHOT_VERSION}",
                self.version
            )));
        }
        if self.capabilities.is_empty() {
            return Err(Error::StaleSession("snapshot has no units".into()));
        }
        Ok(())
    }
}

/// Persistence for [`Snapshot`]s.
///
/// `load` returns [`Error::StaleSession`] for anything that cannot be resumed
/// from: a missing blob, a parse failure or a schema version mismatch.
pub trait StateStore: Send + Sync {
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
    fn load(&self) -> Result<Snapshot>;
    fn clear(&self) -> Result<()>;
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for FileStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_string(snapshot)?;
        fs::write(&self.path, body)?;
        debug!(path = %self.path.display(), "saved session snapshot");
        Ok(())
    }

    fn load(&self) -> Result<Snapshot> {
        let body = match fs::read_to_string(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::StaleSession("no saved session".into()));
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_str(&body)
            .map_err(|e| Error::StaleSession(format!("unreadable snapshot: {e}")))?;
        snapshot.check()?;
        Ok(snapshot)
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn snapshot() -> Snapshot {
        let mut session = Session::default();
        session.absorb_set_cookie("auth=abc; path=/");
        Snapshot {
            version: SNAPSHOT_VERSION,
            session,
            capabilities: vec![Capabilities {
                id: "1001".into(),
                unitname: "Bedroom".into(),
                fanstage: Some(3),
                ..Default::default()
            }],
            state: vec![Some(RawState::from_response(json!({"power": 1})))],
            offsets: vec![0.5],
        }
    }

    #[test]
    fn save_then_load() {
        let tmp = NamedTempFile::new().unwrap();
        let store = FileStore::new(tmp.path());
        let snap = snapshot();
        store.save(&snap).unwrap();
        assert_eq!(store.load().unwrap(), snap);
    }

    #[test]
    fn version_mismatch_is_stale() {
        let tmp = NamedTempFile::new().unwrap();
        let store = FileStore::new(tmp.path());
        let mut snap = snapshot();
        snap.version = SNAPSHOT_VERSION + 1;
        store.save(&snap).unwrap();
        assert!(matches!(store.load(), Err(Error::StaleSession(_))));
    }

    #[test]
    fn check_rejects_old_versions_and_empty_snapshots() {
        assert!(snapshot().check().is_ok());

        let mut snap = snapshot();
        snap.version = SNAPSHOT_VERSION + 41;
        assert!(matches!(snap.check(), Err(Error::StaleSession(_))));

        let mut snap = snapshot();
        snap.capabilities.clear();
        assert!(matches!(snap.check(), Err(Error::StaleSession(_))));
    }

    #[test]
    fn garbage_is_stale() {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(tmp.path(), "{not json").unwrap();
        let store = FileStore::new(tmp.path());
        assert!(matches!(store.load(), Err(Error::StaleSession(_))));
    }

    #[test]
    fn missing_file_is_stale_and_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        assert!(matches!(store.load(), Err(Error::StaleSession(_))));
        store.clear().unwrap();
        store.save(&snapshot()).unwrap();
        store.clear().unwrap();
        assert!(matches!(store.load(), Err(Error::StaleSession(_))));
    }
}
