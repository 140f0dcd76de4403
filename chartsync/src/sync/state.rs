use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadState {
    keys: BTreeSet<String>,
}

impl UploadState {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl FromIterator<String> for UploadState {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[derive(Serialize)]
struct StateFile<'a> {
    uploaded: Vec<&'a str>,
}

#[derive(Debug, Clone)]
pub struct UploadStateStore {
    path: PathBuf,
}

impl UploadStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> UploadState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return UploadState::default(),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "upload state unreadable, starting empty"
                );
                return UploadState::default();
            }
        };
        match parse_state(&raw) {
            Some(state) => state,
            None => {
                tracing::warn!(
                    path = %self.path.display(),
                    "upload state malformed, starting empty"
                );
                UploadState::default()
            }
        }
    }

    pub fn save(&self, state: &UploadState) {
        match self.try_save(state) {
            Ok(()) => tracing::debug!(
                path = %self.path.display(),
                keys = state.len(),
                "saved upload state"
            ),
            Err(err) => tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to save upload state"
            ),
        }
    }

    pub fn try_save(&self, state: &UploadState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = StateFile {
            uploaded: state.iter().collect(),
        };
        let mut body = serde_json::to_string_pretty(&file)?;
        body.push('\n');

        let partial = partial_path(&self.path);
        fs::write(&partial, body)?;
        fs::rename(&partial, &self.path)?;
        Ok(())
    }
}

fn parse_state(raw: &str) -> Option<UploadState> {
    let doc: Value = serde_json::from_str(raw).ok()?;
    let items = doc.get("uploaded")?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

/// Holds the in-memory state for one upload run and writes it back exactly
/// once when dropped, whether the run finished, bailed out early, or was
/// cancelled.
pub struct FlushOnDrop<'a> {
    store: &'a UploadStateStore,
    state: UploadState,
}

impl<'a> FlushOnDrop<'a> {
    pub fn load(store: &'a UploadStateStore) -> Self {
        let state = store.load();
        Self { store, state }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut UploadState {
        &mut self.state
    }
}

impl Drop for FlushOnDrop<'_> {
    fn drop(&mut self) {
        self.store.save(&self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = UploadStateStore::new(dir.path().join("uploaded.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn invalid_json_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uploaded.json");
        fs::write(&path, "{\"uploaded\": [\"01 Pop/X\",").unwrap();
        assert!(UploadStateStore::new(&path).load().is_empty());
    }

    #[test]
    fn wrong_shape_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uploaded.json");
        fs::write(&path, r#"{"uploaded": "01 Pop/X"}"#).unwrap();
        assert!(UploadStateStore::new(&path).load().is_empty());
        fs::write(&path, r#"["01 Pop/X"]"#).unwrap();
        assert!(UploadStateStore::new(&path).load().is_empty());
    }

    #[test]
    fn save_writes_sorted_pretty_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/uploaded.json");
        let store = UploadStateStore::new(&path);
        let state: UploadState = ["02 Anime/Y", "01 Pop/夜", "01 Pop/X"]
            .into_iter()
            .map(str::to_string)
            .collect();

        store.try_save(&state).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(
            raw,
            "{\n  \"uploaded\": [\n    \"01 Pop/X\",\n    \"01 Pop/夜\",\n    \"02 Anime/Y\"\n  ]\n}\n"
        );
        assert_eq!(store.load(), state);
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let store = UploadStateStore::new(dir.path().join("uploaded.json"));
        let first: UploadState = ["a".to_string(), "b".to_string()].into_iter().collect();
        let second: UploadState = ["c".to_string()].into_iter().collect();

        store.save(&first);
        store.save(&second);

        assert_eq!(store.load(), second);
    }

    #[test]
    fn save_failure_does_not_panic() {
        let dir = tempdir().unwrap();
        // The parent "directory" is a regular file, so the write must fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let store = UploadStateStore::new(blocker.join("uploaded.json"));
        let state: UploadState = ["a".to_string()].into_iter().collect();

        assert!(store.try_save(&state).is_err());
        store.save(&state);
    }

    #[test]
    fn guard_flushes_on_early_return() {
        let dir = tempdir().unwrap();
        let store = UploadStateStore::new(dir.path().join("uploaded.json"));

        fn partial_run(store: &UploadStateStore) -> Result<(), &'static str> {
            let mut guard = FlushOnDrop::load(store);
            guard.state_mut().insert("01 Pop/X");
            Err::<(), _>("interrupted")?;
            guard.state_mut().insert("01 Pop/never");
            Ok(())
        }

        assert!(partial_run(&store).is_err());
        let keys: Vec<_> = store.load().iter().map(str::to_string).collect();
        assert_eq!(keys, vec!["01 Pop/X"]);
    }

    #[test]
    fn guard_keeps_previous_keys() {
        let dir = tempdir().unwrap();
        let store = UploadStateStore::new(dir.path().join("uploaded.json"));
        store.save(&["01 Pop/old".to_string()].into_iter().collect());

        {
            let mut guard = FlushOnDrop::load(&store);
            assert!(guard.state().contains("01 Pop/old"));
            guard.state_mut().insert("02 Anime/new");
        }

        assert_eq!(store.load().len(), 2);
    }
}
