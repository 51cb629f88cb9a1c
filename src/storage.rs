use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::AppResult;

/// Persistent key/value items for one user profile, kept as a JSON object on disk.
#[derive(Debug, Default)]
pub struct LocalStorage {
    path: Option<PathBuf>,
    items: BTreeMap<String, String>,
}

impl LocalStorage {
    /// Opens the storage file, starting empty when it is missing or unreadable.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(items) => items,
                Err(err) => {
                    tracing::warn!("Ignoring corrupt local storage {}: {}", path.display(), err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path: Some(path),
            items,
        })
    }

    /// Storage that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) -> AppResult<()> {
        self.items.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn flush(&self) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.items)?)?;
        Ok(())
    }
}
