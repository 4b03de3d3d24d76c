use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::RelayCache;
use crate::model::CachedRelays;

/// Relay cache backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileRelayCache {
    path: PathBuf,
}

impl FileRelayCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the cached list.
    pub fn write(&self, relays: &CachedRelays) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(relays).map_err(io::Error::other)?;
        std::fs::write(&self.path, json)
    }
}

impl RelayCache for FileRelayCache {
    fn read(&self) -> Option<CachedRelays> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "relay cache file not found");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read relay cache");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(relays) => Some(relays),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to decode relay cache");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::RelayList;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileRelayCache::new(dir.path().join("relays.json"));
        assert!(cache.read().is_none());
    }

    #[test]
    fn garbage_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relays.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(FileRelayCache::new(path).read().is_none());
    }

    #[test]
    fn written_list_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileRelayCache::new(dir.path().join("nested").join("relays.json"));
        let cached = CachedRelays {
            relays: RelayList::default(),
            updated_at: Utc::now(),
        };

        cache.write(&cached).unwrap();

        assert_eq!(cache.read(), Some(cached));
    }
}
