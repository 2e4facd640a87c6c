//! Local cache file: the last successfully persisted canonical map.
//!
//! Writes go to a uniquely named sibling temp file first and are renamed
//! into place, so a crash mid-write leaves the previous cache intact and
//! concurrent writers never share a temp file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use usy_schemas::PlayerMap;

use crate::error::CacheError;

#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<PlayerMap>, CacheError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let map = serde_json::from_str::<PlayerMap>(&raw).map_err(|source| CacheError::Decode {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(map))
    }

    /// Write the full map as pretty JSON.
    pub fn store(&self, map: &PlayerMap) -> Result<(), CacheError> {
        let json = map.to_pretty_json()?;
        self.store_raw(&json)
    }

    /// Write already-serialized content (used to mirror remote content verbatim).
    pub fn store_raw(&self, content: &str) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(io_err)?;
                parent
            }
            None => Path::new("."),
        };

        let prefix = match self.path.file_name() {
            Some(name) => format!(".{}.", name.to_string_lossy()),
            None => ".cache.".to_string(),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usy_schemas::PlayerRecord;

    #[test]
    fn missing_file_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("players.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn store_then_load_returns_same_map() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("nested").join("players.json"));
        let map = PlayerMap::from_records(vec![
            PlayerRecord::new("atemmax", 660),
            PlayerRecord::new("b", -3).with_trophies(vec!["cup".into()]),
        ]);
        cache.store(&map).unwrap();
        assert_eq!(cache.load().unwrap(), Some(map));
        assert_eq!(entries(&dir.path().join("nested")), vec!["players.json"]);
    }

    #[test]
    fn concurrent_writers_never_collide_on_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("players.json"));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let map = PlayerMap::from_records(vec![PlayerRecord::new("p", i)]);
                    (0..20).map(|_| cache.store(&map).is_ok()).all(|ok| ok)
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap(), "a cache write failed");
        }

        let map = cache.load().unwrap().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(entries(dir.path()), vec!["players.json"]);
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.json");
        fs::write(&path, "{\"username\": \"single object\"}").unwrap();
        let err = LocalCache::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }
}
